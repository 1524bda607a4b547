// src/progress.rs

//! Per-round cancellation and liveness handle.
//!
//! One [`ProgressToken`] bounds one scheduling round. Clones share state, so
//! the caller, every worker running a collect phase and the UI thread all see
//! the same flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::debug;

use crate::types::ModalityState;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Coarse lifecycle of a round as seen through its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Passes are still collecting or waiting to apply.
    Running,
    /// Every node applied (or was skipped) and the round stopped normally.
    Completed,
    /// The round was canceled before it completed.
    Canceled,
}

impl RoundState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RoundState::Running)
    }
}

struct TokenInner {
    id: u64,
    canceled: AtomicBool,
    failure: OnceLock<anyhow::Error>,
    modality: ModalityState,
    state: watch::Sender<RoundState>,
}

/// Shared cancellation flag for one scheduling round.
///
/// - `canceled` is set once and never cleared.
/// - At most one failure is kept; later ones are dropped.
/// - The modality marker is only forwarded to the UI dispatcher.
#[derive(Clone)]
pub struct ProgressToken {
    inner: Arc<TokenInner>,
}

impl fmt::Debug for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressToken")
            .field("id", &self.inner.id)
            .field("canceled", &self.is_canceled())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for ProgressToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressToken {
    pub fn new() -> Self {
        Self::with_modality(ModalityState::NonModal)
    }

    pub fn with_modality(modality: ModalityState) -> Self {
        let (state, _) = watch::channel(RoundState::Running);
        Self {
            inner: Arc::new(TokenInner {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                canceled: AtomicBool::new(false),
                failure: OnceLock::new(),
                modality,
                state,
            }),
        }
    }

    /// Process-unique identifier, used to correlate log lines of one round.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn modality(&self) -> ModalityState {
        self.inner.modality
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Cancel the round. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::AcqRel) {
            debug!(progress = self.inner.id, "progress canceled");
        }
        self.inner.state.send_if_modified(|state| {
            if *state == RoundState::Running {
                *state = RoundState::Canceled;
                true
            } else {
                false
            }
        });
    }

    /// Record `error` (if nothing was recorded yet) and cancel the round.
    pub fn cancel_with(&self, error: anyhow::Error) {
        self.save_error(error);
        self.cancel();
    }

    /// Keep the first failure seen in this round; later ones are dropped.
    pub fn save_error(&self, error: anyhow::Error) {
        let _ = self.inner.failure.set(error);
    }

    /// The failure captured during this round, if any.
    pub fn saved_error(&self) -> Option<&anyhow::Error> {
        self.inner.failure.get()
    }

    pub fn state(&self) -> RoundState {
        *self.inner.state.borrow()
    }

    /// `true` while the round has neither completed nor been canceled.
    pub fn is_running(&self) -> bool {
        self.state() == RoundState::Running
    }

    /// Signal that every apply phase in the round has run.
    ///
    /// Returns `true` if this call moved the round to `Completed`.
    pub fn stop_if_running(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == RoundState::Running {
                *state = RoundState::Completed;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the round either completes or is canceled.
    pub async fn finished(&self) -> RoundState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives in `inner`, which we hold.
            Err(_) => self.state(),
        }
    }
}
