// src/sim/journal.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::types::EditorId;

/// What a simulated pass just did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CollectStarted,
    CollectFinished,
    CollectCanceled,
    CollectFailed,
    ApplyStarted,
    ApplyFinished,
    ApplyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimEvent {
    pub editor: EditorId,
    pub pass: String,
    pub kind: EventKind,
    /// Name of the thread the event happened on.
    pub thread: Option<String>,
}

/// Append-only, totally ordered log of pass lifecycle events.
///
/// Every append takes the same lock, so the position of two events in the
/// log reflects the order in which they happened.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, editor: EditorId, pass: &str, kind: EventKind) {
        let thread = thread::current().name().map(str::to_string);
        self.lock().push(SimEvent {
            editor,
            pass: pass.to_string(),
            kind,
            thread,
        });
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Position of the first `kind` event of `pass` on `editor`.
    pub fn position(&self, editor: EditorId, pass: &str, kind: EventKind) -> Option<usize> {
        self.lock()
            .iter()
            .position(|event| event.editor == editor && event.pass == pass && event.kind == kind)
    }

    /// Number of `kind` events of `pass` on `editor`.
    pub fn count(&self, editor: EditorId, pass: &str, kind: EventKind) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.editor == editor && event.pass == pass && event.kind == kind)
            .count()
    }

    /// `(editor, pass)` of every finished apply, in order.
    pub fn applied(&self) -> Vec<(EditorId, String)> {
        self.lock()
            .iter()
            .filter(|event| event.kind == EventKind::ApplyFinished)
            .map(|event| (event.editor, event.pass.clone()))
            .collect()
    }

    /// Largest number of apply phases that were in progress at once.
    pub fn max_concurrent_applies(&self) -> usize {
        let mut current = 0usize;
        let mut max = 0usize;
        for event in self.lock().iter() {
            match event.kind {
                EventKind::ApplyStarted => {
                    current += 1;
                    max = max.max(current);
                }
                EventKind::ApplyFinished | EventKind::ApplyFailed => {
                    current = current.saturating_sub(1);
                }
                _ => {}
            }
        }
        max
    }
}
