// src/sim/pass.rs

use std::thread;
use std::time::Duration;

use anyhow::anyhow;

use crate::pass::{HighlightingPass, PassError};
use crate::progress::ProgressToken;
use crate::sim::journal::{EventKind, Journal};
use crate::types::EditorId;

/// Collect sleeps in slices of this length and checks the token in between.
const COLLECT_SLICE: Duration = Duration::from_millis(5);

/// How a simulated pass misbehaves, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    CollectError,
    CollectPanic,
    ApplyError,
}

/// Pass that pretends to work for a while and journals what it does.
#[derive(Debug, Clone)]
pub struct SimPass {
    name: String,
    editor: EditorId,
    journal: Journal,
    collect_time: Duration,
    fault: Fault,
    dumb_aware: bool,
    can_apply: bool,
    ignore_cancel: bool,
}

impl SimPass {
    pub fn new(name: impl Into<String>, editor: EditorId, journal: Journal) -> Self {
        Self {
            name: name.into(),
            editor,
            journal,
            collect_time: Duration::ZERO,
            fault: Fault::None,
            dumb_aware: false,
            can_apply: true,
            ignore_cancel: false,
        }
    }

    pub fn collect_for(mut self, time: Duration) -> Self {
        self.collect_time = time;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn dumb_aware(mut self, value: bool) -> Self {
        self.dumb_aware = value;
        self
    }

    /// Make `can_apply_information_to_editor` report `value`.
    pub fn can_apply(mut self, value: bool) -> Self {
        self.can_apply = value;
        self
    }

    /// Keep collecting for the full time even after the round is canceled.
    pub fn ignore_cancel(mut self, value: bool) -> Self {
        self.ignore_cancel = value;
        self
    }

    pub fn boxed(self) -> Box<dyn HighlightingPass> {
        Box::new(self)
    }

    fn record(&self, kind: EventKind) {
        self.journal.record(self.editor, &self.name, kind);
    }
}

impl HighlightingPass for SimPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect_information(&mut self, progress: &ProgressToken) -> Result<(), PassError> {
        self.record(EventKind::CollectStarted);

        let mut left = self.collect_time;
        loop {
            if !self.ignore_cancel && progress.is_canceled() {
                self.record(EventKind::CollectCanceled);
                return Err(PassError::Canceled);
            }
            if left.is_zero() {
                break;
            }
            let slice = left.min(COLLECT_SLICE);
            thread::sleep(slice);
            left -= slice;
        }

        match self.fault {
            Fault::CollectError => {
                self.record(EventKind::CollectFailed);
                Err(PassError::Failed(anyhow!("simulated collect failure in '{}'", self.name)))
            }
            Fault::CollectPanic => {
                self.record(EventKind::CollectFailed);
                panic!("simulated collect panic in '{}'", self.name);
            }
            _ => {
                self.record(EventKind::CollectFinished);
                Ok(())
            }
        }
    }

    fn apply_information_to_editor(&mut self) -> anyhow::Result<()> {
        self.record(EventKind::ApplyStarted);
        if self.fault == Fault::ApplyError {
            self.record(EventKind::ApplyFailed);
            return Err(anyhow!("simulated apply failure in '{}'", self.name));
        }
        self.record(EventKind::ApplyFinished);
        Ok(())
    }

    fn can_apply_information_to_editor(&self) -> bool {
        self.can_apply
    }

    fn is_dumb_aware(&self) -> bool {
        self.dumb_aware
    }
}
