// src/exec/mod.rs

//! Running configured shell commands on the scheduler.
//!
//! - [`command`] runs a single command through the platform shell.
//! - [`backend`] provides the `CommandRunner` trait and the production
//!   `ShellRunner`; tests substitute their own runner.
//! - [`plan`] launches every task of a [`crate::config::ConfigFile`] on a
//!   [`crate::engine::Scheduler`] in dependency order.

/// Outcome of a configured task, stored as its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
    /// Not run because an upstream task did not succeed.
    Skipped,
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        self == TaskOutcome::Success
    }
}

pub mod backend;
pub mod command;
pub mod plan;

pub use backend::{CommandRunner, ShellRunner};
pub use plan::{LaunchedPlan, PlanSummary, launch_plan};
