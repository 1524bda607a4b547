// src/config/validate.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, EditorConfig, PassKind, RawConfigFile};
use crate::errors::{PassdagError, Result};
use crate::types::DocumentId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PassdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.host, raw.editor))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_editors(cfg)?;
    validate_scheduler(cfg)?;
    validate_editor_names(cfg)?;
    validate_selection(cfg)?;
    for editor in &cfg.editor {
        validate_pass_ids(editor, cfg.scheduler.generated_pass_id_base)?;
        validate_predecessors(editor)?;
        validate_dag(editor)?;
    }
    Ok(())
}

fn ensure_has_editors(cfg: &RawConfigFile) -> Result<()> {
    if cfg.editor.is_empty() {
        return Err(PassdagError::ConfigError(
            "config must contain at least one [[editor]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.worker_threads == 0 {
        return Err(PassdagError::ConfigError(
            "[scheduler].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.cancel_poll_interval_ms == 0 {
        return Err(PassdagError::ConfigError(
            "[scheduler].cancel_poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_editor_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for editor in &cfg.editor {
        if !seen.insert(editor.name.as_str()) {
            return Err(PassdagError::ConfigError(format!(
                "editor '{}' is declared more than once",
                editor.name
            )));
        }
    }
    Ok(())
}

fn validate_selection(cfg: &RawConfigFile) -> Result<()> {
    let mut selected: HashMap<DocumentId, &str> = HashMap::new();
    for editor in cfg.editor.iter().filter(|editor| editor.selected) {
        let Some(document) = editor.document else {
            return Err(PassdagError::ConfigError(format!(
                "editor '{}' is selected but shows no document",
                editor.name
            )));
        };
        if let Some(other) = selected.insert(document, editor.name.as_str()) {
            return Err(PassdagError::ConfigError(format!(
                "editors '{other}' and '{}' are both selected for {document}",
                editor.name
            )));
        }
    }
    Ok(())
}

fn validate_pass_ids(editor: &EditorConfig, generated_base: u32) -> Result<()> {
    let mut seen = HashSet::new();
    for pass in &editor.pass {
        if pass.id == 0 {
            return Err(PassdagError::ConfigError(format!(
                "pass '{}' of editor '{}' must have a positive id",
                pass.name, editor.name
            )));
        }
        if pass.id > generated_base {
            return Err(PassdagError::ConfigError(format!(
                "pass '{}' of editor '{}' has id {} above generated_pass_id_base ({generated_base})",
                pass.name, editor.name, pass.id
            )));
        }
        if !seen.insert(pass.id) {
            return Err(PassdagError::ConfigError(format!(
                "editor '{}' declares pass id {} more than once",
                editor.name, pass.id
            )));
        }
    }
    Ok(())
}

fn validate_predecessors(editor: &EditorConfig) -> Result<()> {
    let kinds: HashMap<u32, PassKind> = editor.pass.iter().map(|pass| (pass.id, pass.kind)).collect();

    for pass in &editor.pass {
        if pass.kind == PassKind::Legacy
            && !(pass.after.is_empty() && pass.starting_after.is_empty())
        {
            return Err(PassdagError::ConfigError(format!(
                "legacy pass '{}' of editor '{}' cannot declare predecessors",
                pass.name, editor.name
            )));
        }

        for &dep in pass.after.iter().chain(&pass.starting_after) {
            if dep == pass.id {
                return Err(PassdagError::ConfigError(format!(
                    "pass '{}' of editor '{}' cannot depend on itself",
                    pass.name, editor.name
                )));
            }
            match kinds.get(&dep) {
                None => {
                    return Err(PassdagError::ConfigError(format!(
                        "pass '{}' of editor '{}' has unknown predecessor id {dep}",
                        pass.name, editor.name
                    )));
                }
                // Both kinds get a generated id at submission.
                Some(kind @ (PassKind::Legacy | PassKind::Editor)) => {
                    return Err(PassdagError::ConfigError(format!(
                        "pass '{}' of editor '{}' cannot depend on {kind:?} pass {dep}",
                        pass.name, editor.name
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

fn validate_dag(editor: &EditorConfig) -> Result<()> {
    // Edge direction: predecessor -> dependent.
    let mut graph: DiGraphMap<u32, ()> = DiGraphMap::new();

    for pass in &editor.pass {
        graph.add_node(pass.id);
    }
    for pass in &editor.pass {
        for &dep in pass.after.iter().chain(&pass.starting_after) {
            graph.add_edge(dep, pass.id, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PassdagError::DagCycle(format!(
            "cycle detected in passes of editor '{}' involving pass id {}",
            editor.name,
            cycle.node_id()
        ))),
    }
}
