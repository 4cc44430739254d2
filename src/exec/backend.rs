// src/exec/backend.rs

//! Pluggable command runner.
//!
//! The plan launcher talks to a `CommandRunner` instead of spawning
//! processes itself, so tests can record what ran without touching a shell.

use tokio::runtime::Handle;

use crate::exec::TaskOutcome;
use crate::exec::command::run_command;

/// Runs the command of one configured task to completion.
///
/// Called on a scheduler worker (or inline, per the task's threading
/// policy); blocking is expected.
pub trait CommandRunner: Send + Sync + 'static {
    fn run(&self, task: &str, cmd: &str) -> TaskOutcome;
}

/// Production runner: `sh -c <cmd>` (or `cmd /C` on Windows), driven on a
/// tokio runtime.
///
/// Workers are plain threads, so each run blocks the calling thread on
/// `runtime` until the process exits.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    runtime: Handle,
}

impl ShellRunner {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, task: &str, cmd: &str) -> TaskOutcome {
        let command = run_command(task, cmd);
        if Handle::try_current().is_ok() {
            // Inline tasks may be released on a runtime thread (multi-thread
            // runtime only).
            tokio::task::block_in_place(|| self.runtime.block_on(command))
        } else {
            self.runtime.block_on(command)
        }
    }
}
