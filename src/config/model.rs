// src/config/model.rs

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::types::{Priority, ThreadingPolicy};

/// Top-level configuration exactly as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// worker_threads = 4
///
/// [task.fetch]
/// cmd = "echo fetch"
///
/// [task.build]
/// cmd = "echo build"
/// after = ["fetch"]
/// pipe = "io"
/// ```
///
/// Not validated; convert with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration: at least one task, known and acyclic
/// dependencies, a usable scheduler section.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerConfig,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Build without validation. Callers are responsible for the invariants
    /// `TryFrom<RawConfigFile>` would check.
    pub fn new_unchecked(scheduler: SchedulerConfig, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { scheduler, task }
    }
}

/// `[scheduler]` section, also used directly by [`crate::engine::Scheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Size of the worker pool. Defaults to the available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Worker threads are named `<prefix>-<index>`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_thread_name_prefix() -> String {
    "taskgraph-worker".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            ..Self::default()
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Tasks that must complete before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Tasks sharing a pipe name run one at a time, in launch order.
    #[serde(default)]
    pub pipe: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub threading: ThreadingPolicy,
}
