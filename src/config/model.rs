// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::ExecutorOptions;
use crate::types::DocumentId;

/// Configuration as read from `Passdag.toml`, before validation.
///
/// ```toml
/// [scheduler]
/// worker_threads = 4
///
/// [host]
/// dumb = false
///
/// [[editor]]
/// name = "main.rs"
/// document = 1
///
/// [[editor.pass]]
/// id = 1
/// name = "general"
///
/// [[editor.pass]]
/// id = 2
/// name = "annotate"
/// after = [1]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub host: HostSection,

    #[serde(default)]
    pub editor: Vec<EditorConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub host: HostSection,
    pub editor: Vec<EditorConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        host: HostSection,
        editor: Vec<EditorConfig>,
    ) -> Self {
        Self {
            scheduler,
            host,
            editor,
        }
    }

    /// Total number of declared passes across all editors.
    pub fn pass_count(&self) -> usize {
        self.editor.iter().map(|editor| editor.pass.len()).sum()
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Size of the blocking pool the driver builds its runtime with.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// `None` keeps the build default (on in debug builds).
    #[serde(default)]
    pub check_consistency: Option<bool>,

    #[serde(default = "default_cancel_poll_interval_ms")]
    pub cancel_poll_interval_ms: u64,

    /// Absent means `cancel_all(true)` waits as long as it takes.
    #[serde(default)]
    pub cancel_wait_limit_ms: Option<u64>,

    #[serde(default = "default_dispose_quiescence_ms")]
    pub dispose_quiescence_ms: u64,

    #[serde(default = "default_generated_pass_id_base")]
    pub generated_pass_id_base: u32,

    #[serde(default = "default_ui_thread_name")]
    pub ui_thread_name: String,
}

fn default_worker_threads() -> usize {
    4
}

fn default_cancel_poll_interval_ms() -> u64 {
    50
}

fn default_dispose_quiescence_ms() -> u64 {
    1000
}

fn default_generated_pass_id_base() -> u32 {
    100
}

fn default_ui_thread_name() -> String {
    "passdag-ui".to_string()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            check_consistency: None,
            cancel_poll_interval_ms: default_cancel_poll_interval_ms(),
            cancel_wait_limit_ms: None,
            dispose_quiescence_ms: default_dispose_quiescence_ms(),
            generated_pass_id_base: default_generated_pass_id_base(),
            ui_thread_name: default_ui_thread_name(),
        }
    }
}

impl From<&SchedulerSection> for ExecutorOptions {
    fn from(section: &SchedulerSection) -> Self {
        let defaults = ExecutorOptions::default();
        Self {
            check_consistency: section
                .check_consistency
                .unwrap_or(defaults.check_consistency),
            cancel_poll_interval: Duration::from_millis(section.cancel_poll_interval_ms),
            cancel_wait_limit: section.cancel_wait_limit_ms.map(Duration::from_millis),
            dispose_quiescence: Duration::from_millis(section.dispose_quiescence_ms),
            generated_pass_id_base: section.generated_pass_id_base,
        }
    }
}

/// `[host]` section: how the simulated host behaves.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSection {
    /// Background analysis unavailable; only dumb-aware passes collect.
    #[serde(default)]
    pub dumb: bool,

    /// Whether the host supplies an intentions pass on request.
    #[serde(default = "default_true")]
    pub intentions: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            dumb: false,
            intentions: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[[editor]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    /// Display name; its extension doubles as the file type.
    pub name: String,

    #[serde(default)]
    pub document: Option<DocumentId>,

    /// Selected editor of its document.
    #[serde(default)]
    pub selected: bool,

    #[serde(default = "default_true")]
    pub valid: bool,

    #[serde(default = "default_true")]
    pub displayable: bool,

    #[serde(default = "default_true")]
    pub text: bool,

    #[serde(default)]
    pub pass: Vec<PassConfig>,
}

/// How a configured pass is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    #[default]
    Document,
    Editor,
    Legacy,
}

/// `[[editor.pass]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PassConfig {
    pub id: u32,

    #[serde(default)]
    pub kind: PassKind,

    pub name: String,

    /// Completion predecessors.
    #[serde(default)]
    pub after: Vec<u32>,

    /// Starting predecessors.
    #[serde(default)]
    pub starting_after: Vec<u32>,

    /// Simulated collect time.
    #[serde(default)]
    pub collect_ms: u64,

    #[serde(default)]
    pub fail: bool,

    #[serde(default)]
    pub fail_apply: bool,

    #[serde(default)]
    pub dumb_aware: bool,

    #[serde(default)]
    pub run_intentions_after: bool,
}
