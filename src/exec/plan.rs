// src/exec/plan.rs

//! Launch a configured task graph onto a scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, TaskConfig};
use crate::dag::graph::DagGraph;
use crate::dag::handle::TaskHandle;
use crate::engine::{DispatchMode, LaunchOptions, Pipe, Scheduler};
use crate::errors::{Result, TaskGraphError};
use crate::exec::TaskOutcome;
use crate::exec::backend::CommandRunner;

/// Handles of every launched task, plus the pipes created for them.
#[derive(Debug, Default)]
pub struct LaunchedPlan {
    /// Task names in launch order.
    pub order: Vec<String>,
    pub handles: BTreeMap<String, TaskHandle>,
    pub pipes: BTreeMap<String, Pipe>,
}

impl LaunchedPlan {
    pub fn handle(&self, task: &str) -> Option<&TaskHandle> {
        self.handles.get(task)
    }

    /// Outcome of `task`, once it completed.
    pub fn outcome(&self, task: &str) -> Result<TaskOutcome> {
        let handle = self
            .handles
            .get(task)
            .ok_or_else(|| TaskGraphError::ConfigError(format!("unknown task '{task}'")))?;
        handle.result_as::<TaskOutcome>()
    }

    /// Sort every task by outcome. Tasks that have not completed yet are
    /// reported as pending.
    pub fn summarize(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for name in &self.order {
            match self.outcome(name) {
                Ok(TaskOutcome::Success) => summary.succeeded.push(name.clone()),
                Ok(TaskOutcome::Failed(code)) => summary.failed.push((name.clone(), code)),
                Ok(TaskOutcome::Skipped) => summary.skipped.push(name.clone()),
                Err(_) => summary.pending.push(name.clone()),
            }
        }
        summary
    }
}

/// Per-outcome task lists of a plan, in launch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, i32)>,
    pub skipped: Vec<String>,
    pub pending: Vec<String>,
}

impl PlanSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.pending.is_empty()
    }
}

/// Launch every task of `cfg` on `scheduler`.
///
/// Tasks are launched in topological order so that each task's `after`
/// handles already exist. Each task runs its command through `runner` and
/// stores a [`TaskOutcome`]; a task whose upstream did not succeed is
/// `Skipped` without running. Tasks naming the same `pipe` share one
/// [`Pipe`].
pub fn launch_plan(
    scheduler: &Scheduler,
    cfg: &ConfigFile,
    runner: Arc<dyn CommandRunner>,
) -> Result<LaunchedPlan> {
    let graph = DagGraph::from_config(cfg)?;
    let mut plan = LaunchedPlan {
        order: graph.launch_order().to_vec(),
        ..LaunchedPlan::default()
    };

    for name in graph.launch_order() {
        let Some(task) = cfg.task.get(name) else {
            warn!(task = %name, "task in launch order missing from config; skipping");
            continue;
        };

        let upstream: Vec<TaskHandle> = graph
            .dependencies_of(name)
            .iter()
            .filter_map(|dep| plan.handles.get(dep).cloned())
            .collect();

        let options = launch_options(scheduler, &mut plan.pipes, task);
        let work = task_work(name.clone(), task.cmd.clone(), upstream.clone(), Arc::clone(&runner));

        let handle = scheduler.launch_with_result(name.clone(), &upstream, options, work)?;

        debug!(task = %name, upstream = upstream.len(), "configured task launched");
        plan.handles.insert(name.clone(), handle);
    }

    info!(
        tasks = plan.handles.len(),
        pipes = plan.pipes.len(),
        "task plan launched"
    );
    Ok(plan)
}

fn launch_options(
    scheduler: &Scheduler,
    pipes: &mut BTreeMap<String, Pipe>,
    task: &TaskConfig,
) -> LaunchOptions {
    let options = LaunchOptions::new()
        .priority(task.priority)
        .dispatch(DispatchMode::from(task.threading));

    match &task.pipe {
        Some(pipe_name) => {
            let pipe = pipes
                .entry(pipe_name.clone())
                .or_insert_with(|| scheduler.make_pipe(pipe_name.clone()));
            options.in_pipe(pipe)
        }
        None => options,
    }
}

fn task_work(
    name: String,
    cmd: String,
    upstream: Vec<TaskHandle>,
    runner: Arc<dyn CommandRunner>,
) -> impl FnOnce() -> TaskOutcome + Send + 'static {
    move || {
        let blocked: Vec<&str> = upstream
            .iter()
            .filter(|h| !matches!(h.result_as::<TaskOutcome>(), Ok(TaskOutcome::Success)))
            .filter_map(|h| h.name())
            .collect();

        if !blocked.is_empty() {
            info!(task = %name, ?blocked, "upstream did not succeed; skipping task");
            return TaskOutcome::Skipped;
        }

        runner.run(&name, &cmd)
    }
}
