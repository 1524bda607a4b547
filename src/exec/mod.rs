// src/exec/mod.rs

//! Execution layer.
//!
//! - [`executor`] owns the public [`PassExecutor`]: submission, cancellation,
//!   dispose and introspection.
//! - [`round`] is the per-invocation context that runs collect phases on the
//!   blocking pool and hands apply phases to the UI side.
//! - [`ui`] provides the `UiDispatch` seam and the default single-threaded
//!   `UiExecutor`. Tests may swap in their own dispatcher.

pub mod executor;
pub mod round;
pub mod ui;

pub use executor::{ExecutorOptions, PassExecutor, RoundHandle};
pub use round::{Round, SubmittedPassInfo};
pub use ui::{UiDispatch, UiExecutor, UiQueue, UiTask};
