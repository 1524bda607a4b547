// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

pub const DEFAULT_CONFIG_FILE: &str = "Passdag.toml";

/// Read and deserialize a config file. No semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading config");
    let raw: RawConfigFile = toml::from_str(&fs::read_to_string(path)?)?;
    Ok(raw)
}

/// Read, deserialize and validate a config file.
///
/// Validation covers pass IDs, predecessor references, per-editor cycles and
/// scheduler sanity; see [`crate::config::validate`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let cfg = ConfigFile::try_from(load_from_path(path)?)?;
    debug!(
        editors = cfg.editor.len(),
        passes = cfg.pass_count(),
        "config validated"
    );
    Ok(cfg)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
