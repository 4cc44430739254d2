// src/engine/nested.rs

//! Nested tasks.
//!
//! Work running inside a task may launch further tasks and attach them as
//! children of the running task. The parent then stays `Running` after its
//! own work returned and only completes once every attached child has
//! completed, so dependents of the parent also wait for the children.

use tracing::warn;

use crate::dag::handle::TaskHandle;
use crate::dag::node;
use crate::errors::{Result, TaskGraphError};

/// Delay completion of the currently running task until `child` completed.
///
/// Must be called from inside a task's work. Attaching an already completed
/// child is accepted and has no effect.
pub fn add_nested(child: &TaskHandle) -> Result<()> {
    let Some(parent) = node::current() else {
        warn!(child = child.name().unwrap_or("<invalid>"), "add_nested called outside of a task");
        return Err(TaskGraphError::NotInTask("add_nested"));
    };

    let Some(child) = child.node() else {
        warn!(task = %parent.name(), "add_nested: child handle is invalid");
        return Err(TaskGraphError::InvalidHandle("add_nested"));
    };

    parent.attach_nested(child)
}

/// Handle to the innermost task running on this thread.
pub fn current_task() -> Option<TaskHandle> {
    node::current().map(TaskHandle::from_node)
}
