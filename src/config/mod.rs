// src/config/mod.rs

//! Configuration for the `passdag` driver.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a file from disk.
//! - [`validate`] turns a raw file into a [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, EditorConfig, HostSection, PassConfig, PassKind, RawConfigFile, SchedulerSection,
};
pub use validate::validate_config;
