// src/exec/executor.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dag::{GraphBuilder, PassGraph, PassIdGenerator};
use crate::editor::{EditorHandle, PassHost};
use crate::errors::{PassdagError, Result};
use crate::exec::round::{ExecutorShared, Round, SubmittedPassInfo};
use crate::exec::ui::UiDispatch;
use crate::pass::SubmittedPass;
use crate::progress::{ProgressToken, RoundState};

/// Tunables for [`PassExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Run the shadow walk over every graph before it is submitted.
    pub check_consistency: bool,
    pub cancel_poll_interval: Duration,
    /// Give up waiting in `cancel_all(true)` after this long.
    pub cancel_wait_limit: Option<Duration>,
    pub dispose_quiescence: Duration,
    /// Generated pass IDs start right after this value.
    pub generated_pass_id_base: u32,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            check_consistency: cfg!(debug_assertions),
            cancel_poll_interval: Duration::from_millis(50),
            cancel_wait_limit: None,
            dispose_quiescence: Duration::from_secs(1),
            generated_pass_id_base: 100,
        }
    }
}

/// Handle to a submitted round.
#[derive(Debug, Clone)]
pub struct RoundHandle {
    round: Arc<Round>,
}

impl RoundHandle {
    pub fn progress(&self) -> &ProgressToken {
        self.round.progress()
    }

    pub fn graph(&self) -> &PassGraph {
        self.round.graph()
    }

    /// Nodes whose apply step has not run yet.
    pub fn remaining(&self) -> usize {
        self.round.remaining()
    }

    /// Resolves once the round completed or was canceled.
    pub async fn finished(&self) -> RoundState {
        self.round.progress().finished().await
    }
}

/// Runs highlighting passes in dependency order.
///
/// Collect phases run on the tokio blocking pool; apply phases are posted to
/// the [`UiDispatch`] given at construction.
#[derive(Debug)]
pub struct PassExecutor {
    shared: Arc<ExecutorShared>,
    options: ExecutorOptions,
    ids: PassIdGenerator,
    rounds: Mutex<Vec<Arc<Round>>>,
}

impl PassExecutor {
    pub fn new(
        host: Arc<dyn PassHost>,
        ui: Arc<dyn UiDispatch>,
        runtime: Handle,
        options: ExecutorOptions,
    ) -> Self {
        let ids = PassIdGenerator::starting_after(options.generated_pass_id_base);
        Self {
            shared: Arc::new(ExecutorShared {
                host,
                ui,
                runtime,
                disposed: AtomicBool::new(false),
                active_jobs: AtomicUsize::new(0),
            }),
            options,
            ids,
            rounds: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Build the graph for `batch` without running anything.
    ///
    /// Consumes generated IDs exactly like a real submission would.
    pub fn build_graph(&self, batch: Vec<(EditorHandle, Vec<SubmittedPass>)>) -> PassGraph {
        GraphBuilder::new(self.shared.host.as_ref(), &self.ids).build(batch)
    }

    /// Wire `batch` into a graph and start its free nodes.
    ///
    /// Fails without submitting anything if the executor is disposed or the
    /// graph does not pass the consistency check.
    pub fn submit_passes(
        &self,
        batch: Vec<(EditorHandle, Vec<SubmittedPass>)>,
        progress: ProgressToken,
    ) -> Result<RoundHandle> {
        if self.is_disposed() {
            return Err(PassdagError::Disposed);
        }

        let graph = self.build_graph(batch);
        if self.options.check_consistency {
            if let Err(err) = graph.check_consistency() {
                error!(progress = progress.id(), error = %err, "refusing to submit pass graph");
                progress.cancel();
                return Err(err);
            }
        }

        info!(
            progress = progress.id(),
            passes = graph.len(),
            free = graph.free_nodes().len(),
            dependent = graph.dependent_nodes().len(),
            "submitting highlighting passes"
        );

        let round = Round::new(Arc::clone(&self.shared), graph, progress);
        {
            let mut rounds = self.lock_rounds();
            rounds.retain(|existing| !existing.is_settled());
            rounds.push(Arc::clone(&round));
        }
        round.start();

        Ok(RoundHandle { round })
    }

    /// Cancel every tracked round and, if asked, wait for the running collect
    /// phases to notice.
    pub async fn cancel_all(&self, wait_for_termination: bool) {
        let rounds = std::mem::take(&mut *self.lock_rounds());
        let mut handles = Vec::new();
        for round in &rounds {
            handles.extend(round.cancel_jobs());
        }
        debug!(
            rounds = rounds.len(),
            jobs = handles.len(),
            wait_for_termination,
            "cancel all passes"
        );

        if wait_for_termination {
            self.await_termination(handles).await;
        }
    }

    async fn await_termination(&self, handles: Vec<JoinHandle<()>>) {
        let started = Instant::now();
        for mut handle in handles {
            loop {
                match tokio::time::timeout(self.options.cancel_poll_interval, &mut handle).await {
                    Ok(Ok(())) => break,
                    Ok(Err(join_err)) => {
                        if join_err.is_panic() {
                            error!(error = %join_err, "pass job panicked");
                        }
                        break;
                    }
                    Err(_) => {
                        if let Some(limit) = self.options.cancel_wait_limit {
                            if started.elapsed() >= limit {
                                warn!(
                                    waited_ms = limit.as_millis() as u64,
                                    "gave up waiting for canceled passes to terminate"
                                );
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    /// `true` once every collect job terminated within `timeout`.
    pub async fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let step = self.options.cancel_poll_interval.min(Duration::from_millis(5));
        loop {
            if self.active_jobs() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(step).await;
        }
    }

    /// Cancel everything, drain what is still running and refuse further
    /// submissions.
    pub async fn dispose(&self) {
        self.cancel_all(true).await;
        if !self.wait_for(self.options.dispose_quiescence).await {
            warn!(
                active = self.active_jobs(),
                "pass jobs still running after dispose quiescence"
            );
        }
        self.shared.disposed.store(true, Ordering::Release);
        info!("pass executor disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Collect jobs spawned and not finished yet.
    pub fn active_jobs(&self) -> usize {
        self.shared.active_jobs.load(Ordering::Acquire)
    }

    /// Every tracked pass of every live round, started or not.
    pub fn all_submitted_passes(&self) -> Vec<SubmittedPassInfo> {
        self.lock_rounds()
            .iter()
            .flat_map(|round| round.submitted_passes())
            .collect()
    }

    fn lock_rounds(&self) -> MutexGuard<'_, Vec<Arc<Round>>> {
        self.rounds.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
