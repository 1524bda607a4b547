// src/editor.rs

//! Editor and host abstractions the scheduler talks to.
//!
//! The scheduler never renders anything itself. Everything it needs from the
//! surrounding editor platform goes through two traits:
//! - [`FileEditor`]: an open editor (tab or split view).
//! - [`PassHost`]: platform services (selection, repaint, file status map).
//!
//! [`crate::sim`] provides in-memory implementations for the driver and
//! tests.

use std::fmt::Debug;
use std::sync::Arc;

use crate::pass::HighlightingPass;
use crate::types::{DocumentId, EditorId, PassId};

/// An open file editor.
pub trait FileEditor: Send + Sync + Debug {
    fn id(&self) -> EditorId;

    /// Backing document, if the editor shows one.
    fn document(&self) -> Option<DocumentId>;

    /// Whether this is a text editor (the only kind that gets an intentions
    /// pass).
    fn is_text_editor(&self) -> bool {
        true
    }

    /// `false` once the editor has been closed or disposed.
    fn is_valid(&self) -> bool;

    fn is_displayable(&self) -> bool {
        self.is_valid()
    }

    /// File type name for diagnostics.
    fn file_type(&self) -> Option<String> {
        None
    }
}

/// Shared handle to an editor. Cheap to clone.
pub type EditorHandle = Arc<dyn FileEditor>;

/// Platform services used while building and running a round.
///
/// `mark_up_to_date` and `repaint` are only ever called on the UI thread.
pub trait PassHost: Send + Sync + Debug {
    /// The editor currently selected for `document`, if any.
    fn selected_editor(&self, document: DocumentId) -> Option<EditorId>;

    /// All editors currently showing `document`.
    fn editors_for_document(&self, document: DocumentId) -> Vec<EditorHandle>;

    /// Analysis backend is indexing; passes that are not dumb-aware no-op.
    fn is_dumb(&self) -> bool {
        false
    }

    /// The owning project is going away; collect phases are skipped.
    fn is_disposed(&self) -> bool {
        false
    }

    /// Record that `pass` produced up-to-date results for `document`.
    fn mark_up_to_date(&self, document: DocumentId, pass: PassId);

    /// Refresh error stripe / status icon of `editor`.
    fn repaint(&self, editor: &dyn FileEditor);

    /// Work for the "show intentions" follow-up pass of `editor`.
    fn intentions_pass(&self, editor: &EditorHandle) -> Option<Box<dyn HighlightingPass>>;
}
