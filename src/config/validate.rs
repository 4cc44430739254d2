// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::graph;
use crate::errors::{Result, TaskGraphError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskGraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_scheduler(cfg)?;
    validate_pipes(cfg)?;
    validate_task_dependencies(cfg)?;
    // A topological sort fails if there is a cycle.
    graph::launch_order(&cfg.task)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskGraphError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.worker_threads == 0 {
        return Err(TaskGraphError::ConfigError(
            "[scheduler].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.thread_name_prefix.trim().is_empty() {
        return Err(TaskGraphError::ConfigError(
            "[scheduler].thread_name_prefix must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_pipes(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if let Some(pipe) = &task.pipe {
            if pipe.trim().is_empty() {
                return Err(TaskGraphError::ConfigError(format!(
                    "task '{}' has an empty `pipe` name",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(TaskGraphError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(TaskGraphError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}
