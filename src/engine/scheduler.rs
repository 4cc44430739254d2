// src/engine/scheduler.rs

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::config::model::SchedulerConfig;
use crate::dag::handle::{HandleKind, TaskHandle};
use crate::dag::node::{NodeSpec, TaskNode, Work};
use crate::dag::result::TaskResult;
use crate::engine::context::DeliveryContext;
use crate::engine::gate::Gate;
use crate::engine::pipe::Pipe;
use crate::engine::ready_queue::ReadyQueue;
use crate::engine::workers::{join_workers, spawn_workers};
use crate::engine::{DispatchMode, LaunchOptions};
use crate::errors::{Result, TaskGraphError};

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks launched through this scheduler (including internal
    /// continuations such as completion callbacks).
    pub launched: u64,
    /// Of those, how many have completed.
    pub completed: u64,
    /// Ready tasks waiting for a worker.
    pub queued: usize,
    pub workers: usize,
}

/// State shared by the scheduler handle, its workers, its pipes and every
/// node it launched (nodes only hold a weak reference).
pub(crate) struct Shared {
    gate: Arc<Gate>,
    ready: ReadyQueue,
    accepting: AtomicBool,
    launched: AtomicU64,
    completed: AtomicU64,
}

impl Shared {
    fn new(gate: Arc<Gate>) -> Self {
        Self {
            gate,
            ready: ReadyQueue::new(),
            accepting: AtomicBool::new(true),
            launched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Build, wire and release a node.
    ///
    /// The node holds its launch guard until every prerequisite edge is
    /// registered, so it can never be released half-wired. With `gated`, the
    /// gate's resume token is added while paused.
    fn launch_node(
        self: &Arc<Self>,
        name: String,
        kind: HandleKind,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
        work: Work,
        gated: bool,
    ) -> Result<TaskHandle> {
        if !self.accepting.load(Ordering::Acquire) {
            warn!(task = %name, "launch on a scheduler that is shutting down");
            return Err(TaskGraphError::SchedulerShutdown);
        }

        let prerequisites = if gated {
            self.gate.gated_prerequisites(prerequisites)
        } else {
            prerequisites.to_vec()
        };

        let LaunchOptions {
            priority,
            dispatch,
            pipe,
        } = options;

        let node = TaskNode::new(NodeSpec {
            name,
            kind,
            priority,
            dispatch,
            pipe: pipe.as_ref().map(|p| Arc::clone(p.shared())),
            scheduler: Arc::downgrade(self),
            work: Some(work),
        });
        self.launched.fetch_add(1, Ordering::Relaxed);

        if let Some(pipe) = &pipe {
            pipe.shared().enqueue(&node);
        }

        let mut wired = 0usize;
        for prerequisite in &prerequisites {
            match prerequisite.node() {
                Some(prereq) => {
                    node.add_prerequisite_edge(prereq);
                    wired += 1;
                }
                None => warn!(task = %node.name(), "skipping invalid prerequisite handle"),
            }
        }

        debug!(
            task = %node.name(),
            id = %node.id(),
            kind = kind.as_str(),
            %priority,
            prerequisites = wired,
            pipe = pipe.as_ref().map(|p| p.name()),
            "task launched"
        );

        node.release_guard();
        Ok(TaskHandle::from_node(node))
    }

    pub(crate) fn launch<F>(
        self: &Arc<Self>,
        name: String,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
        work: F,
    ) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let work: Work = Box::new(move || {
            work();
            None
        });
        self.launch_node(name, HandleKind::Task, prerequisites, options, work, true)
    }

    pub(crate) fn launch_with_result<T, F>(
        self: &Arc<Self>,
        name: String,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
        work: F,
    ) -> Result<TaskHandle>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T + Send + 'static,
    {
        let work: Work = Box::new(move || Some(TaskResult::new(work())));
        self.launch_node(name, HandleKind::ResultTask, prerequisites, options, work, true)
    }

    /// Launch a continuation that bypasses the gate.
    pub(crate) fn launch_continuation(
        self: &Arc<Self>,
        name: String,
        kind: HandleKind,
        prerequisite: &TaskHandle,
        dispatch: DispatchMode,
        work: Work,
    ) -> Result<TaskHandle> {
        let options = LaunchOptions::new().dispatch(dispatch);
        self.launch_node(
            name,
            kind,
            std::slice::from_ref(prerequisite),
            options,
            work,
            false,
        )
    }

    /// Queue a ready node for the workers. Hands it back once the pool has
    /// stopped.
    pub(crate) fn enqueue(&self, node: Arc<TaskNode>) -> std::result::Result<(), Arc<TaskNode>> {
        self.ready.push(node)
    }

    /// Block until there is ready work, or return `None` once the queue is
    /// closed and drained.
    pub(crate) fn next_ready(&self) -> Option<Arc<TaskNode>> {
        self.ready.next_blocking()
    }

    pub(crate) fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        self.ready.close();
    }

    fn stats(&self, workers: usize) -> SchedulerStats {
        SchedulerStats {
            launched: self.launched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            queued: self.ready.len(),
            workers,
        }
    }
}

/// Dependency-aware task scheduler backed by a fixed pool of worker threads.
///
/// Dropping the scheduler stops accepting launches, lets the workers finish
/// everything already queued, and joins them.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Start a scheduler that uses the process-wide [`Gate::global`].
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_gate(config, Gate::global())
    }

    /// Start a scheduler with an explicit gate.
    pub fn with_gate(config: SchedulerConfig, gate: Arc<Gate>) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(TaskGraphError::ConfigError(
                "worker_threads must be >= 1 (got 0)".to_string(),
            ));
        }

        let shared = Arc::new(Shared::new(gate));
        let workers = spawn_workers(&shared, config.worker_threads, &config.thread_name_prefix)?;

        Ok(Self {
            shared,
            workers,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.shared.gate
    }

    pub fn is_paused(&self) -> bool {
        self.shared.gate.is_paused()
    }

    /// See [`Gate::wait_for_resume_token`].
    pub fn wait_for_resume_token(&self) -> TaskHandle {
        self.shared.gate.wait_for_resume_token()
    }

    /// Launch fire-and-forget `work` once every prerequisite has completed.
    ///
    /// Invalid prerequisite handles are skipped with a warning. While the
    /// gate is paused the task additionally waits for it to resume.
    pub fn launch<F>(
        &self,
        name: impl Into<String>,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
        work: F,
    ) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.launch(name.into(), prerequisites, options, work)
    }

    /// Launch `work` and store its return value as the task's result.
    pub fn launch_with_result<T, F>(
        &self,
        name: impl Into<String>,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
        work: F,
    ) -> Result<TaskHandle>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T + Send + 'static,
    {
        self.shared
            .launch_with_result(name.into(), prerequisites, options, work)
    }

    /// Create an untriggered event.
    pub fn make_event(&self, name: impl Into<String>) -> TaskHandle {
        TaskHandle::new_event(name)
    }

    /// Create an ordered execution pipe whose tasks run on this scheduler.
    pub fn make_pipe(&self, name: impl Into<String>) -> Pipe {
        let name = name.into();
        debug!(pipe = %name, "pipe created");
        Pipe::new(name, Arc::downgrade(&self.shared))
    }

    /// Run `callback(handle)` once `handle` has completed.
    ///
    /// Without a delivery context the callback runs on a worker; with one it
    /// is sent to that context's queue and runs when the queue is drained.
    /// Callbacks are never held back by the gate.
    pub fn bind_completion<F>(
        &self,
        handle: &TaskHandle,
        delivery: Option<&DeliveryContext>,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(&TaskHandle) + Send + 'static,
    {
        let Some(node) = handle.node() else {
            warn!("bind_completion: task handle is invalid");
            return Err(TaskGraphError::InvalidHandle("bind_completion"));
        };

        let dispatch = match delivery {
            Some(ctx) => DispatchMode::Context(ctx.clone()),
            None => DispatchMode::Worker,
        };

        let target = handle.clone();
        let work: Work = Box::new(move || {
            callback(&target);
            None
        });

        self.shared.launch_continuation(
            format!("{}.on_completed", node.name()),
            HandleKind::Task,
            handle,
            dispatch,
            work,
        )?;
        Ok(())
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats(self.workers.len())
    }

    /// Whether every task launched so far has completed.
    pub fn is_idle(&self) -> bool {
        let stats = self.stats();
        stats.launched == stats.completed
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the worker pool after it drained the queued work.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        let stats = self.stats();
        info!(
            launched = stats.launched,
            completed = stats.completed,
            queued = stats.queued,
            "scheduler shutting down"
        );
        self.shared.shutdown();
        join_workers(&mut self.workers);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
