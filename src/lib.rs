// src/lib.rs

//! Dependency-aware task-graph engine.
//!
//! The library side is [`engine::Scheduler`] and friends: launch closures
//! with prerequisites, order them through pipes, gate them with events or a
//! pause/resume [`engine::Gate`], and poll their typed results through
//! [`dag::TaskHandle`]. The `taskgraph` binary drives the same engine from a
//! TOML file of shell commands (see [`run`]).

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::DagGraph;
use crate::engine::{Scheduler, delivery_context};
use crate::exec::{PlanSummary, ShellRunner, launch_plan};

pub use crate::dag::{TaskHandle, TaskResult};
pub use crate::engine::{LaunchOptions, Pipe};
pub use crate::errors::TaskGraphError;
pub use crate::types::Priority;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ `--workers` override)
/// - the scheduler and its worker pool
/// - launching every configured task
/// - a "main" delivery context on which the final completion is received
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)?;

    if let Some(workers) = args.workers {
        if workers == 0 {
            bail!("--workers must be >= 1");
        }
        cfg.scheduler.worker_threads = workers;
    }

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let scheduler = Scheduler::new(cfg.scheduler.clone())?;
    let plan = launch_plan(
        &scheduler,
        &cfg,
        Arc::new(ShellRunner::new(tokio::runtime::Handle::current())),
    )?;

    // One event that completes once every configured task has.
    let all = scheduler.make_event("all");
    for handle in plan.handles.values() {
        all.add_prerequisite(handle)?;
    }
    all.trigger();

    let (main_ctx, mut main_queue) = delivery_context("main");
    let done = Arc::new(AtomicBool::new(false));
    {
        let done = Arc::clone(&done);
        scheduler.bind_completion(&all, Some(&main_ctx), move |_| {
            done.store(true, Ordering::SeqCst);
        })?;
    }
    drop(main_ctx);

    while !done.load(Ordering::SeqCst) {
        tokio::select! {
            more = main_queue.run_next() => {
                if !more {
                    warn!("main delivery context closed before the plan finished");
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                warn!("interrupted; waiting for running tasks before exit");
                bail!("interrupted");
            }
        }
    }

    let summary = plan.summarize();
    print_summary(&summary);
    info!(stats = ?scheduler.stats(), "run finished");

    if !summary.all_succeeded() {
        bail!(
            "{} task(s) failed, {} skipped",
            summary.failed.len(),
            summary.skipped.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &PlanSummary) {
    println!();
    println!("summary:");
    for name in &summary.succeeded {
        println!("  ok       {name}");
    }
    for (name, code) in &summary.failed {
        println!("  failed   {name} (exit code {code})");
    }
    for name in &summary.skipped {
        println!("  skipped  {name}");
    }
    for name in &summary.pending {
        println!("  pending  {name}");
    }
}

/// Print the scheduler settings and every task in launch order.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let graph = DagGraph::from_config(cfg)?;

    println!("taskgraph dry-run");
    println!("  scheduler.worker_threads = {}", cfg.scheduler.worker_threads);
    println!(
        "  scheduler.thread_name_prefix = {}",
        cfg.scheduler.thread_name_prefix
    );
    println!();

    println!("tasks ({}), in launch order:", cfg.task.len());
    for name in graph.tasks() {
        let Some(task) = cfg.task.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(ref pipe) = task.pipe {
            println!("      pipe: {pipe}");
        }
        println!("      priority: {}", task.priority);
        println!("      threading: {:?}", task.threading);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
