// src/dag/mod.rs

//! Pass dependency graph.
//!
//! - [`builder`] turns a batch of `(editor, passes)` into a wired graph.
//! - [`node`] holds the per-pass scheduling state.
//! - [`graph`] owns the nodes plus the free/dependent split, and renders
//!   diagnostics.
//! - [`consistency`] is the shadow-run check applied before a round starts.

pub mod builder;
pub mod consistency;
pub mod graph;
pub mod node;

pub use builder::{GraphBuilder, PassIdGenerator};
pub use graph::{EdgeKind, PassGraph};
pub use node::{NodeIdx, NodePhase, ScheduledNode};
