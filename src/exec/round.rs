// src/exec/round.rs

//! Per-round execution context.
//!
//! A [`Round`] owns everything one scheduling invocation needs: the wired
//! graph, the progress token, the apply countdown and its own job map. Nodes
//! reach each other by index through `Arc<Round>`, so successors are
//! submitted from whichever thread releases their last predecessor: a worker
//! (submit edges) or the UI thread (completion edges).

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::dag::{NodeIdx, NodePhase, PassGraph, ScheduledNode};
use crate::editor::PassHost;
use crate::exec::ui::{UiDispatch, panic_message};
use crate::pass::{PassError, PassOrigin};
use crate::progress::{ProgressToken, RoundState};
use crate::types::{EditorId, PassId};

/// State shared by the executor and all of its rounds.
#[derive(Debug)]
pub(crate) struct ExecutorShared {
    pub(crate) host: Arc<dyn PassHost>,
    pub(crate) ui: Arc<dyn UiDispatch>,
    pub(crate) runtime: Handle,
    pub(crate) disposed: AtomicBool,
    /// Collect jobs spawned and not yet finished (or dropped unstarted).
    pub(crate) active_jobs: AtomicUsize,
}

impl ExecutorShared {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.host.is_disposed()
    }
}

/// Tracking entry for one node.
#[derive(Debug)]
enum JobSlot {
    /// Dependent node not submitted yet.
    Waiting,
    Submitted(JoinHandle<()>),
}

/// Public description of a tracked pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPassInfo {
    pub editor: EditorId,
    pub pass: PassId,
    pub name: String,
    pub phase: NodePhase,
}

/// Keeps `active_jobs` accurate even when a job is aborted before it runs.
struct ActiveJobGuard(Arc<Round>);

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.0.shared.active_jobs.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
pub struct Round {
    shared: Arc<ExecutorShared>,
    graph: PassGraph,
    progress: ProgressToken,
    /// Nodes whose apply step has not finished yet.
    countdown: AtomicUsize,
    collect_starts: AtomicU64,
    jobs: Mutex<HashMap<NodeIdx, JobSlot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Round {
    pub(crate) fn new(shared: Arc<ExecutorShared>, graph: PassGraph, progress: ProgressToken) -> Arc<Self> {
        let jobs = graph
            .dependent_nodes()
            .iter()
            .map(|&idx| (idx, JobSlot::Waiting))
            .collect();
        Arc::new(Self {
            shared,
            countdown: AtomicUsize::new(graph.len()),
            collect_starts: AtomicU64::new(0),
            graph,
            progress,
            jobs: Mutex::new(jobs),
        })
    }

    pub fn graph(&self) -> &PassGraph {
        &self.graph
    }

    pub fn progress(&self) -> &ProgressToken {
        &self.progress
    }

    /// Nodes whose apply step is still outstanding.
    pub fn remaining(&self) -> usize {
        self.countdown.load(Ordering::Acquire)
    }

    pub(crate) fn start(self: &Arc<Self>) {
        if self.graph.is_empty() {
            self.progress.stop_if_running();
            return;
        }
        for &idx in self.graph.free_nodes() {
            self.submit(idx);
        }
    }

    /// Hand `idx` to the worker pool unless the round is over.
    fn submit(self: &Arc<Self>, idx: NodeIdx) {
        let node = self.graph.node(idx);
        // Checked under the lock: `cancel_jobs` cancels before it drains.
        let mut jobs = lock(&self.jobs);
        if self.progress.is_canceled() || self.shared.disposed.load(Ordering::Acquire) {
            node.mark_canceled();
            return;
        }

        self.shared.active_jobs.fetch_add(1, Ordering::AcqRel);
        let guard = ActiveJobGuard(Arc::clone(self));
        let handle = self.shared.runtime.spawn_blocking(move || {
            let round = &guard.0;
            if let Err(err) = round.run(idx) {
                error!(
                    progress = round.progress.id(),
                    error = ?err,
                    "highlighting pass job failed"
                );
            }
        });

        jobs.insert(idx, JobSlot::Submitted(handle));
    }

    /// Worker-side body of a node: release submit-successors, then collect.
    fn run(self: &Arc<Self>, idx: NodeIdx) -> anyhow::Result<()> {
        let node = self.graph.node(idx);
        if self.progress.is_canceled() {
            node.mark_canceled();
            return Ok(());
        }

        self.log(node, "started");
        node.start_collecting(self.collect_starts.fetch_add(1, Ordering::AcqRel) + 1);

        for &succ in node.successors_on_submit() {
            if self.graph.node(succ).release_predecessor() {
                self.submit(succ);
            }
        }

        match self.collect(node) {
            Ok(()) => {}
            Err(PassError::Canceled) => {
                self.log(node, "canceled");
                if !self.progress.is_canceled() {
                    self.progress.cancel();
                }
            }
            Err(PassError::Failed(err)) => {
                error!(
                    pass = node.name(),
                    pass_id = %node.pass_id(),
                    editor = %node.editor().id(),
                    progress = self.progress.id(),
                    error = ?err,
                    "collect phase failed"
                );
                let message = format!("{err:#}");
                self.progress.cancel_with(err);
                node.mark_canceled();
                return Err(anyhow!("collect phase of {node} failed: {message}"));
            }
        }

        self.log(node, "finished");

        if self.progress.is_canceled() {
            node.mark_canceled();
            return Ok(());
        }

        node.set_phase(NodePhase::AwaitingApply);
        self.apply_later(idx);
        Ok(())
    }

    fn collect(&self, node: &ScheduledNode) -> Result<(), PassError> {
        let host = &self.shared.host;
        let mut pass = lock(&node.pass);

        if host.is_dumb() && !pass.is_dumb_aware() {
            self.log(node, "skipped collect: analysis backend is dumb");
            return Ok(());
        }
        if host.is_disposed() {
            self.progress.cancel();
            return Ok(());
        }
        if self.progress.is_canceled() {
            return Ok(());
        }

        catch_unwind(AssertUnwindSafe(|| pass.collect_information(&self.progress))).unwrap_or_else(
            |panic| {
                Err(PassError::Failed(anyhow!(
                    "collect panicked: {}",
                    panic_message(&panic)
                )))
            },
        )
    }

    /// Post the apply step of `idx` to the UI dispatcher.
    fn apply_later(self: &Arc<Self>, idx: NodeIdx) {
        let node = self.graph.node(idx);
        if self.shared.is_disposed() {
            self.progress.cancel();
        }
        if self.progress.is_canceled() {
            self.log(node, "is canceled during apply, sorry");
            node.mark_canceled();
            return;
        }

        let round = Arc::clone(self);
        let posted = self
            .shared
            .ui
            .dispatch(self.progress.modality(), Box::new(move || round.apply_on_ui(idx)));
        if !posted {
            warn!(
                pass = node.name(),
                pass_id = %node.pass_id(),
                editor = %node.editor().id(),
                progress = self.progress.id(),
                "ui dispatcher rejected apply; canceling round"
            );
            self.progress
                .cancel_with(anyhow!("ui dispatcher is gone; apply of {node} was dropped"));
            node.mark_canceled();
        }
    }

    /// UI-thread body of a node.
    fn apply_on_ui(self: &Arc<Self>, idx: NodeIdx) -> anyhow::Result<()> {
        let node = self.graph.node(idx);
        if self.progress.is_canceled() {
            self.log(node, "is canceled during apply, sorry");
            node.mark_canceled();
            return Ok(());
        }

        let failure = self.apply(node).err().map(|err| {
            let editor = node.editor();
            let file_type = editor.file_type().unwrap_or_else(|| "unknown".to_string());
            error!(
                pass = node.name(),
                pass_id = %node.pass_id(),
                editor = %editor.id(),
                file_type = %file_type,
                progress = self.progress.id(),
                error = ?err,
                "exception while applying information to editor"
            );
            let wrapped = err.context(format!(
                "exception while applying information to {} ({file_type})",
                editor.id()
            ));
            self.progress.cancel_with(anyhow!("{wrapped:#}"));
            wrapped
        });

        if failure.is_some() {
            node.mark_canceled();
        } else {
            node.set_phase(NodePhase::Done);
        }

        self.finish_apply(node);

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Apply results unless the editor went away or the pass declines.
    fn apply(&self, node: &ScheduledNode) -> anyhow::Result<()> {
        let editor = node.editor();
        if !editor.is_valid() || !editor.is_displayable() {
            self.log(node, "editor is no longer displayable; skipping apply");
            return Ok(());
        }

        let mut pass = lock(&node.pass);
        if !pass.can_apply_information_to_editor() {
            self.log(node, "cannot apply information to editor; skipping apply");
            return Ok(());
        }

        node.set_phase(NodePhase::Applying);
        catch_unwind(AssertUnwindSafe(|| pass.apply_information_to_editor()))
            .unwrap_or_else(|panic| Err(anyhow!("apply panicked: {}", panic_message(&panic))))?;
        drop(pass);

        let host = &self.shared.host;
        match (node.origin(), node.document()) {
            (PassOrigin::Legacy, Some(document)) => {
                for other in host.editors_for_document(document) {
                    host.repaint(other.as_ref());
                }
            }
            _ => host.repaint(editor.as_ref()),
        }
        if let Some(document) = node.document() {
            host.mark_up_to_date(document, node.pass_id());
        }

        self.log(node, "applied");
        Ok(())
    }

    /// Count the node down and release its completion successors.
    fn finish_apply(self: &Arc<Self>, node: &ScheduledNode) {
        let previous = self.countdown.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            self.log(node, "stopping");
            self.progress.stop_if_running();
        } else {
            debug!(
                pass = node.name(),
                pass_id = %node.pass_id(),
                progress = self.progress.id(),
                remaining = previous - 1,
                "finished but there are passes in the queue"
            );
        }

        for &succ in node.successors_on_completion() {
            if self.graph.node(succ).release_predecessor() {
                self.submit(succ);
            }
        }
    }

    /// Cancel the round and hand back the job handles so the caller can
    /// wait on them. Jobs that have not started yet are aborted.
    pub(crate) fn cancel_jobs(&self) -> Vec<JoinHandle<()>> {
        self.progress.cancel();
        for node in self.graph.nodes() {
            node.mark_canceled();
        }
        lock(&self.jobs)
            .drain()
            .filter_map(|(_, slot)| match slot {
                JobSlot::Submitted(handle) => {
                    handle.abort();
                    Some(handle)
                }
                JobSlot::Waiting => None,
            })
            .collect()
    }

    /// Round is over and none of its jobs is still running.
    pub(crate) fn is_settled(&self) -> bool {
        self.progress.state() != RoundState::Running
            && lock(&self.jobs).values().all(|slot| match slot {
                JobSlot::Submitted(handle) => handle.is_finished(),
                JobSlot::Waiting => true,
            })
    }

    pub(crate) fn submitted_passes(&self) -> Vec<SubmittedPassInfo> {
        if self.progress.is_canceled() {
            return Vec::new();
        }
        let mut passes: Vec<SubmittedPassInfo> = lock(&self.jobs)
            .keys()
            .map(|&idx| self.graph.node(idx))
            .filter(|node| !matches!(node.phase(), NodePhase::Done | NodePhase::Canceled))
            .map(|node| {
                SubmittedPassInfo {
                    editor: node.editor().id(),
                    pass: node.pass_id(),
                    name: node.name().to_string(),
                    phase: node.phase(),
                }
            })
            .collect();
        passes.sort_by_key(|info| (info.editor, info.pass));
        passes
    }

    fn log(&self, node: &ScheduledNode, what: &str) {
        debug!(
            pass = node.name(),
            pass_id = %node.pass_id(),
            editor = %node.editor().id(),
            progress = self.progress.id(),
            canceled = self.progress.is_canceled(),
            "{what}"
        );
    }
}
