// src/dag/node.rs

//! Scheduled node: one pass plus its runtime scheduling state.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use crate::editor::EditorHandle;
use crate::pass::{HighlightingPass, PassMeta, PassOrigin, TextPass};
use crate::types::{DocumentId, PassId};

/// Index of a node inside its round's graph.
pub type NodeIdx = usize;

/// Per-node state machine.
///
/// `Pending → Collecting → AwaitingApply → Applying → Done`, with `Canceled`
/// reachable from every state but `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodePhase {
    Pending = 0,
    Collecting = 1,
    AwaitingApply = 2,
    Applying = 3,
    Done = 4,
    Canceled = 5,
}

impl NodePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => NodePhase::Pending,
            1 => NodePhase::Collecting,
            2 => NodePhase::AwaitingApply,
            3 => NodePhase::Applying,
            4 => NodePhase::Done,
            _ => NodePhase::Canceled,
        }
    }
}

/// A pass wired into a round's dependency graph.
///
/// Successor lists are frozen when the graph is built; only the predecessor
/// counter and the phase change afterwards.
pub struct ScheduledNode {
    editor: EditorHandle,
    meta: PassMeta,
    origin: PassOrigin,
    name: String,
    pub(crate) pass: Mutex<Box<dyn HighlightingPass>>,
    running_predecessors: AtomicUsize,
    successors_on_completion: Vec<NodeIdx>,
    successors_on_submit: Vec<NodeIdx>,
    phase: AtomicU8,
    /// 1-based rank among the round's collect starts; 0 until started.
    collect_order: AtomicU64,
}

impl fmt::Debug for ScheduledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledNode")
            .field("editor", &self.editor.id())
            .field("pass", &self.name)
            .field("id", &self.meta.id)
            .field("running_predecessors", &self.predecessor_count())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ScheduledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.editor.id(), self.meta.id, self.name)
    }
}

impl ScheduledNode {
    pub(crate) fn new(
        editor: EditorHandle,
        pass: TextPass,
        predecessors: usize,
        successors_on_completion: Vec<NodeIdx>,
        successors_on_submit: Vec<NodeIdx>,
    ) -> Self {
        let name = pass.work.name().to_string();
        Self {
            editor,
            meta: pass.meta,
            origin: pass.origin,
            name,
            pass: Mutex::new(pass.work),
            running_predecessors: AtomicUsize::new(predecessors),
            successors_on_completion,
            successors_on_submit,
            phase: AtomicU8::new(NodePhase::Pending as u8),
            collect_order: AtomicU64::new(0),
        }
    }

    pub fn editor(&self) -> &EditorHandle {
        &self.editor
    }

    pub fn pass_id(&self) -> PassId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &PassMeta {
        &self.meta
    }

    pub fn origin(&self) -> PassOrigin {
        self.origin
    }

    pub fn document(&self) -> Option<DocumentId> {
        self.meta.document
    }

    /// Predecessors that have not released this node yet.
    pub fn predecessor_count(&self) -> usize {
        self.running_predecessors.load(Ordering::Acquire)
    }

    pub fn successors_on_completion(&self) -> &[NodeIdx] {
        &self.successors_on_completion
    }

    pub fn successors_on_submit(&self) -> &[NodeIdx] {
        &self.successors_on_submit
    }

    pub fn phase(&self) -> NodePhase {
        NodePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: NodePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// When this node entered `Collecting`, relative to the other nodes of
    /// its round. `None` if it never did.
    pub fn collect_order(&self) -> Option<u64> {
        match self.collect_order.load(Ordering::Acquire) {
            0 => None,
            order => Some(order),
        }
    }

    pub(crate) fn start_collecting(&self, order: u64) {
        self.collect_order.store(order, Ordering::Release);
        self.set_phase(NodePhase::Collecting);
    }

    /// Move to `Canceled` unless the node already reached `Done`.
    pub(crate) fn mark_canceled(&self) {
        let _ = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != NodePhase::Done as u8).then_some(NodePhase::Canceled as u8)
            });
    }

    /// Release one predecessor.
    ///
    /// Returns `true` for exactly one caller: the one whose decrement brings
    /// the counter to zero. That caller owns the submission.
    pub(crate) fn release_predecessor(&self) -> bool {
        let previous = self.running_predecessors.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "predecessor counter underflow for {self}");
        previous == 1
    }
}
