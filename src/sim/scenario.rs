// src/sim/scenario.rs

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigFile, EditorConfig, PassConfig, PassKind};
use crate::editor::EditorHandle;
use crate::pass::{PassMeta, SubmittedPass};
use crate::sim::host::{SimEditor, SimHost};
use crate::sim::journal::Journal;
use crate::sim::pass::{Fault, SimPass};
use crate::types::EditorId;

/// Simulated host, editors and passes described by a config file.
#[derive(Debug)]
pub struct Scenario {
    pub host: Arc<SimHost>,
    pub journal: Journal,
    editors: Vec<(EditorHandle, EditorConfig)>,
}

impl Scenario {
    /// Editors get IDs `1..` in declaration order.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let journal = Journal::new();
        let host = Arc::new(SimHost::new(journal.clone()));
        host.set_dumb(cfg.host.dumb);
        host.set_intentions(cfg.host.intentions);

        let editors = cfg
            .editor
            .iter()
            .enumerate()
            .map(|(idx, editor_cfg)| {
                let editor = SimEditor::new(idx as u64 + 1, &editor_cfg.name, editor_cfg.document)
                    .text(editor_cfg.text);
                editor.set_valid(editor_cfg.valid);
                editor.set_displayable(editor_cfg.displayable);
                let handle = editor.into_handle();

                host.add_editor(handle.clone());
                if let (true, Some(document)) = (editor_cfg.selected, editor_cfg.document) {
                    host.select(document, handle.id());
                }
                (handle, editor_cfg.clone())
            })
            .collect();

        Self {
            host,
            journal,
            editors,
        }
    }

    pub fn editors(&self) -> impl Iterator<Item = &EditorHandle> {
        self.editors.iter().map(|(handle, _)| handle)
    }

    /// Editor by its configured name.
    pub fn editor(&self, name: &str) -> Option<&EditorHandle> {
        self.editors
            .iter()
            .find(|(_, cfg)| cfg.name == name)
            .map(|(handle, _)| handle)
    }

    /// Display name of `editor`.
    pub fn editor_name(&self, editor: EditorId) -> Option<&str> {
        self.editors
            .iter()
            .find(|(handle, _)| handle.id() == editor)
            .map(|(_, cfg)| cfg.name.as_str())
    }

    /// A fresh batch of passes. Passes are consumed by a round, so every
    /// submission needs its own batch.
    pub fn batch(&self) -> Vec<(EditorHandle, Vec<SubmittedPass>)> {
        self.editors
            .iter()
            .map(|(handle, cfg)| {
                let passes = cfg
                    .pass
                    .iter()
                    .map(|pass| self.submitted_pass(handle, cfg, pass))
                    .collect();
                (handle.clone(), passes)
            })
            .collect()
    }

    fn submitted_pass(
        &self,
        handle: &EditorHandle,
        editor: &EditorConfig,
        pass: &PassConfig,
    ) -> SubmittedPass {
        let fault = if pass.fail {
            Fault::CollectError
        } else if pass.fail_apply {
            Fault::ApplyError
        } else {
            Fault::None
        };
        let work = SimPass::new(&pass.name, handle.id(), self.journal.clone())
            .collect_for(Duration::from_millis(pass.collect_ms))
            .with_fault(fault)
            .dumb_aware(pass.dumb_aware)
            .boxed();

        let mut meta = PassMeta::new(pass.id).run_intention_pass_after(pass.run_intentions_after);
        for &id in &pass.after {
            meta = meta.after(id);
        }
        for &id in &pass.starting_after {
            meta = meta.starting_after(id);
        }
        if let Some(document) = editor.document {
            meta = meta.document(document);
        }

        match pass.kind {
            PassKind::Document => SubmittedPass::document(meta, work),
            PassKind::Editor => SubmittedPass::editor(meta, work),
            PassKind::Legacy => SubmittedPass::legacy(work),
        }
    }
}
