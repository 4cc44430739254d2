// src/engine/mod.rs

//! Execution engine.
//!
//! This module ties together:
//! - the [`Scheduler`] and its worker pool, which run ready nodes;
//! - ordered execution [`Pipe`]s;
//! - the pause/resume [`Gate`];
//! - caller-owned delivery contexts that completion callbacks (or any task)
//!   can be routed to;
//! - nested tasks and task objects layered on top of plain launches.
//!
//! Dependency bookkeeping itself lives in [`crate::dag`].

use crate::types::{Priority, ThreadingPolicy};

/// Where a node runs once it is ready.
#[derive(Debug, Clone, Default)]
pub enum DispatchMode {
    /// Queued on the scheduler's worker pool.
    #[default]
    Worker,
    /// Run synchronously on the thread that released the node.
    Inline,
    /// Sent to a caller-owned context and run when that context drains its
    /// queue.
    Context(DeliveryContext),
}

impl From<ThreadingPolicy> for DispatchMode {
    fn from(policy: ThreadingPolicy) -> Self {
        match policy {
            ThreadingPolicy::Worker => DispatchMode::Worker,
            ThreadingPolicy::Inline => DispatchMode::Inline,
        }
    }
}

/// Per-launch settings.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub priority: Priority,
    pub dispatch: DispatchMode,
    pub pipe: Option<Pipe>,
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Shorthand for `dispatch(DispatchMode::Inline)`.
    pub fn inline(self) -> Self {
        self.dispatch(DispatchMode::Inline)
    }

    pub fn on_context(self, ctx: &DeliveryContext) -> Self {
        self.dispatch(DispatchMode::Context(ctx.clone()))
    }

    /// Bind the task to the tail of `pipe`.
    pub fn in_pipe(mut self, pipe: &Pipe) -> Self {
        self.pipe = Some(pipe.clone());
        self
    }
}

pub mod context;
pub mod gate;
pub mod nested;
pub mod object;
pub mod pipe;
pub(crate) mod ready_queue;
pub mod scheduler;
pub(crate) mod workers;

pub use context::{ContextQueue, DeliveryContext, delivery_context};
pub use gate::Gate;
pub use nested::{add_nested, current_task};
pub use object::TaskObject;
pub use pipe::Pipe;
pub use scheduler::{Scheduler, SchedulerStats};
