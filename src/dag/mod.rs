// src/dag/mod.rs

//! Task nodes, handles, results and the static plan graph.
//!
//! - [`node`] holds the runtime task node: state machine, prerequisite
//!   counters, successor lists and the cycle check for graph edits.
//! - [`handle`] provides the caller-facing [`TaskHandle`].
//! - [`result`] is the once-written typed result slot.
//! - [`graph`] is the static graph of a config file, used to launch its
//!   tasks in dependency order.

pub mod graph;
pub mod handle;
pub mod node;
pub mod result;

pub use graph::DagGraph;
pub use handle::{HandleKind, TaskHandle};
pub use node::{TaskId, TaskState};
pub use result::TaskResult;
