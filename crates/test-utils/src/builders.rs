#![allow(dead_code)]

use passdag::config::{
    ConfigFile, EditorConfig, HostSection, PassConfig, PassKind, RawConfigFile, SchedulerSection,
};
use passdag::types::DocumentId;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                host: HostSection::default(),
                editor: vec![],
            },
        }
    }

    pub fn with_editor(mut self, editor: EditorConfig) -> Self {
        self.config.editor.push(editor);
        self
    }

    pub fn dumb(mut self, val: bool) -> Self {
        self.config.host.dumb = val;
        self
    }

    pub fn worker_threads(mut self, val: usize) -> Self {
        self.config.scheduler.worker_threads = val;
        self
    }

    pub fn generated_pass_id_base(mut self, val: u32) -> Self {
        self.config.scheduler.generated_pass_id_base = val;
        self
    }

    /// The unvalidated file, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `EditorConfig`.
pub struct EditorConfigBuilder {
    editor: EditorConfig,
}

impl EditorConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            editor: EditorConfig {
                name: name.to_string(),
                document: None,
                selected: false,
                valid: true,
                displayable: true,
                text: true,
                pass: vec![],
            },
        }
    }

    pub fn document(mut self, id: u64) -> Self {
        self.editor.document = Some(DocumentId(id));
        self
    }

    pub fn selected(mut self, val: bool) -> Self {
        self.editor.selected = val;
        self
    }

    pub fn valid(mut self, val: bool) -> Self {
        self.editor.valid = val;
        self
    }

    pub fn pass(mut self, pass: PassConfig) -> Self {
        self.editor.pass.push(pass);
        self
    }

    pub fn build(self) -> EditorConfig {
        self.editor
    }
}

/// Builder for `PassConfig`.
pub struct PassConfigBuilder {
    pass: PassConfig,
}

impl PassConfigBuilder {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            pass: PassConfig {
                id,
                kind: PassKind::Document,
                name: name.to_string(),
                after: vec![],
                starting_after: vec![],
                collect_ms: 0,
                fail: false,
                fail_apply: false,
                dumb_aware: false,
                run_intentions_after: false,
            },
        }
    }

    pub fn kind(mut self, kind: PassKind) -> Self {
        self.pass.kind = kind;
        self
    }

    pub fn after(mut self, id: u32) -> Self {
        self.pass.after.push(id);
        self
    }

    pub fn starting_after(mut self, id: u32) -> Self {
        self.pass.starting_after.push(id);
        self
    }

    pub fn collect_ms(mut self, ms: u64) -> Self {
        self.pass.collect_ms = ms;
        self
    }

    pub fn fail(mut self, val: bool) -> Self {
        self.pass.fail = val;
        self
    }

    pub fn fail_apply(mut self, val: bool) -> Self {
        self.pass.fail_apply = val;
        self
    }

    pub fn dumb_aware(mut self, val: bool) -> Self {
        self.pass.dumb_aware = val;
        self
    }

    pub fn run_intentions_after(mut self, val: bool) -> Self {
        self.pass.run_intentions_after = val;
        self
    }

    pub fn build(self) -> PassConfig {
        self.pass
    }
}
