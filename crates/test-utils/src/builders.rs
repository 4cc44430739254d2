#![allow(dead_code)]

use std::collections::BTreeMap;

use taskgraph::config::{ConfigFile, RawConfigFile, SchedulerConfig, TaskConfig};
use taskgraph::types::{Priority, ThreadingPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerConfig::with_workers(2),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.scheduler.worker_threads = workers;
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                pipe: None,
                priority: Priority::Normal,
                threading: ThreadingPolicy::Worker,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn pipe(mut self, pipe: &str) -> Self {
        self.task.pipe = Some(pipe.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn inline(mut self) -> Self {
        self.task.threading = ThreadingPolicy::Inline;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
