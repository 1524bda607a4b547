// src/pass.rs

//! The pass contract consumed by the scheduler.
//!
//! A pass is split in two:
//! - [`HighlightingPass`]: the opaque work (collect + apply).
//! - [`PassMeta`]: identity and predecessor wiring, which is all the
//!   scheduler reads.
//!
//! [`SubmittedPass`] tags each pass with its binding kind once, at submission.

use std::fmt;

use thiserror::Error;

use crate::progress::ProgressToken;
use crate::types::{DocumentId, PassId};

/// Outcome of a collect phase that did not finish normally.
#[derive(Debug, Error)]
pub enum PassError {
    /// The pass observed cancellation and stopped. Expected; never reported.
    #[error("pass canceled")]
    Canceled,
    /// Anything else. Cancels the round and is recorded on the token.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Opaque unit of analysis work.
///
/// `collect_information` runs on a worker thread and must poll
/// [`ProgressToken::is_canceled`] at reasonable intervals, returning
/// [`PassError::Canceled`] when it fires. `apply_information_to_editor` runs
/// on the UI thread, strictly after a successful collect.
pub trait HighlightingPass: Send {
    fn name(&self) -> &str;

    fn collect_information(&mut self, progress: &ProgressToken) -> Result<(), PassError>;

    fn apply_information_to_editor(&mut self) -> anyhow::Result<()>;

    /// Checked on the UI thread right before apply.
    fn can_apply_information_to_editor(&self) -> bool {
        true
    }

    /// Whether collect may run while the analysis backend is indexing.
    fn is_dumb_aware(&self) -> bool {
        false
    }
}

/// Identity and ordering constraints of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassMeta {
    pub id: PassId,
    /// Passes whose *apply* must have finished before this pass collects.
    pub completion_predecessors: Vec<PassId>,
    /// Passes whose *collect* must have started before this pass collects.
    pub starting_predecessors: Vec<PassId>,
    pub document: Option<DocumentId>,
    /// Schedule an intentions pass right after this one has applied.
    pub run_intention_pass_after: bool,
}

impl PassMeta {
    pub fn new(id: u32) -> Self {
        Self {
            id: PassId(id),
            ..Self::default()
        }
    }

    pub fn after(mut self, id: u32) -> Self {
        self.completion_predecessors.push(PassId(id));
        self
    }

    pub fn starting_after(mut self, id: u32) -> Self {
        self.starting_predecessors.push(PassId(id));
        self
    }

    pub fn document(mut self, document: DocumentId) -> Self {
        self.document = Some(document);
        self
    }

    pub fn run_intention_pass_after(mut self, value: bool) -> Self {
        self.run_intention_pass_after = value;
        self
    }
}

/// Where a scheduled pass came from; decides post-apply behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOrigin {
    /// Submitted by the caller with explicit metadata.
    Declared,
    /// Untyped pass wrapped by the graph builder. Its apply repaints every
    /// editor showing the document.
    Legacy,
    /// Follow-up intentions pass synthesized by the graph builder.
    Intentions,
}

/// A pass with metadata, ready to be wired into the graph.
pub struct TextPass {
    pub meta: PassMeta,
    pub(crate) origin: PassOrigin,
    pub(crate) work: Box<dyn HighlightingPass>,
}

impl fmt::Debug for TextPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextPass")
            .field("name", &self.work.name())
            .field("meta", &self.meta)
            .field("origin", &self.origin)
            .finish()
    }
}

impl TextPass {
    pub fn new(meta: PassMeta, work: Box<dyn HighlightingPass>) -> Self {
        Self {
            meta,
            origin: PassOrigin::Declared,
            work,
        }
    }

    pub(crate) fn with_origin(mut self, origin: PassOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn id(&self) -> PassId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        self.work.name()
    }
}

/// A pass as handed to [`crate::exec::PassExecutor::submit_passes`].
#[derive(Debug)]
pub enum SubmittedPass {
    /// Works on the document; scheduled once per document, for the preferred
    /// editor only.
    DocumentBound(TextPass),
    /// Works on one editor; receives a fresh ID on every submission.
    EditorBound(TextPass),
    /// No metadata. Wrapped into a document-bound pass chained after the
    /// previous pass of the same editor.
    Legacy(LegacyPass),
}

/// Newtype so [`SubmittedPass`] can derive `Debug`.
pub struct LegacyPass(pub Box<dyn HighlightingPass>);

impl fmt::Debug for LegacyPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LegacyPass").field(&self.0.name()).finish()
    }
}

impl SubmittedPass {
    /// A pass bound to `meta.document`, or to its editor's document when
    /// `meta` names none.
    pub fn document(meta: PassMeta, work: Box<dyn HighlightingPass>) -> Self {
        SubmittedPass::DocumentBound(TextPass::new(meta, work))
    }

    pub fn editor(meta: PassMeta, work: Box<dyn HighlightingPass>) -> Self {
        SubmittedPass::EditorBound(TextPass::new(meta, work))
    }

    pub fn legacy(work: Box<dyn HighlightingPass>) -> Self {
        SubmittedPass::Legacy(LegacyPass(work))
    }

    pub fn name(&self) -> &str {
        match self {
            SubmittedPass::DocumentBound(p) | SubmittedPass::EditorBound(p) => p.name(),
            SubmittedPass::Legacy(p) => p.0.name(),
        }
    }
}
