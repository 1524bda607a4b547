// src/types.rs

//! Identifier newtypes shared across the scheduler.

use std::fmt;

use serde::Deserialize;

/// Identity of a highlighting pass.
///
/// Declared passes carry small positive IDs; IDs handed out by the scheduler
/// for wrapped and editor-bound passes come from [`crate::dag::PassIdGenerator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct PassId(pub u32);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a file editor (one tab / split view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditorId(pub u64);

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "editor-{}", self.0)
    }
}

/// Identity of a document. Several editors may show the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// Opaque marker carried by a progress token that tells the UI dispatcher
/// which queue apply callbacks belong to.
///
/// The scheduler never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModalityState {
    /// Apply as soon as the UI thread is free.
    #[default]
    NonModal,
    /// Apply only once the given modal context has been left.
    Modal(u32),
}
