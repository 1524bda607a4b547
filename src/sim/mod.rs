// src/sim/mod.rs

//! In-memory editor platform.
//!
//! The driver runs rounds against these types, and the integration tests use
//! them to observe ordering: every pass writes its lifecycle into a shared
//! [`Journal`].

pub mod host;
pub mod journal;
pub mod pass;
pub mod scenario;

pub use host::{SimEditor, SimHost, intentions_pass_name};
pub use journal::{EventKind, Journal, SimEvent};
pub use pass::{Fault, SimPass};
pub use scenario::Scenario;
