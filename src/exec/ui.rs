// src/exec/ui.rs

//! Single-threaded UI executor.
//!
//! Apply phases must never run concurrently and must all run on one thread.
//! The dispatcher posts closures through the [`UiDispatch`] seam; the default
//! implementation, [`UiExecutor`], drains them in FIFO order on a dedicated
//! named OS thread.
//!
//! A task that returns an error (or panics) is reported as an uncaught UI
//! error: logged, counted, and the thread keeps going.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::types::ModalityState;

/// Closure executed on the UI thread.
pub type UiTask = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Where apply phases are posted.
pub trait UiDispatch: Send + Sync + Debug {
    /// Queue `task` for the UI thread.
    ///
    /// Returns `false` if the UI side is gone and `task` was dropped unrun.
    #[must_use]
    fn dispatch(&self, modality: ModalityState, task: UiTask) -> bool;

    /// Whether the calling thread is the UI thread.
    fn is_ui_thread(&self) -> bool;
}

enum UiMessage {
    Run(ModalityState, UiTask),
    Shutdown,
}

/// Cloneable handle that posts tasks to a running [`UiExecutor`].
#[derive(Debug, Clone)]
pub struct UiQueue {
    tx: mpsc::UnboundedSender<UiMessage>,
    thread_id: ThreadId,
    uncaught: Arc<AtomicUsize>,
}

impl std::fmt::Debug for UiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiMessage::Run(modality, _) => f.debug_tuple("Run").field(modality).finish(),
            UiMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl UiQueue {
    /// Number of UI tasks that failed or panicked so far.
    pub fn uncaught_errors(&self) -> usize {
        self.uncaught.load(Ordering::Acquire)
    }
}

impl UiDispatch for UiQueue {
    fn dispatch(&self, modality: ModalityState, task: UiTask) -> bool {
        let accepted = self.tx.send(UiMessage::Run(modality, task)).is_ok();
        if !accepted {
            debug!(?modality, "ui executor stopped; dropping task");
        }
        accepted
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

/// Owns the UI thread. Dropping it without [`UiExecutor::shutdown`] leaves
/// the thread running until every [`UiQueue`] clone is gone.
#[derive(Debug)]
pub struct UiExecutor {
    queue: UiQueue,
    thread: Option<JoinHandle<()>>,
}

impl UiExecutor {
    /// Spawn the UI thread under `name`.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<UiMessage>();
        let uncaught = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&uncaught);

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || ui_loop(rx, counter))?;

        let queue = UiQueue {
            tx,
            thread_id: thread.thread().id(),
            uncaught,
        };

        Ok(Self {
            queue,
            thread: Some(thread),
        })
    }

    pub fn queue(&self) -> UiQueue {
        self.queue.clone()
    }

    /// Run every task posted so far, then stop the thread and join it.
    ///
    /// Blocks the caller until the queue drained.
    pub fn shutdown(mut self) {
        let _ = self.queue.tx.send(UiMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("ui thread panicked outside of a task");
            }
        }
    }
}

fn ui_loop(mut rx: mpsc::UnboundedReceiver<UiMessage>, uncaught: Arc<AtomicUsize>) {
    info!("ui executor started");

    while let Some(message) = rx.blocking_recv() {
        match message {
            UiMessage::Run(_modality, task) => {
                let result = catch_unwind(AssertUnwindSafe(task))
                    .unwrap_or_else(|panic| Err(anyhow!("ui task panicked: {}", panic_message(&panic))));
                if let Err(err) = result {
                    uncaught.fetch_add(1, Ordering::AcqRel);
                    error!(error = ?err, "uncaught error on ui thread");
                }
            }
            UiMessage::Shutdown => break,
        }
    }

    info!("ui executor finished");
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
