// src/engine/pipe.rs

//! Ordered execution pipes.
//!
//! A pipe runs its tasks one at a time, in launch order. This is layered on
//! top of dependency readiness: a pipe task starts only when its own
//! prerequisites have completed *and* every task launched on the pipe before
//! it has completed. A ready task behind a not-yet-ready one waits.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use crate::dag::handle::TaskHandle;
use crate::dag::node::{TaskId, TaskNode};
use crate::engine::LaunchOptions;
use crate::engine::scheduler::Shared;
use crate::errors::{Result, TaskGraphError};

#[derive(Debug)]
struct PipeEntry {
    node: Arc<TaskNode>,
    ready: bool,
}

#[derive(Debug, Default)]
struct PipeState {
    /// Not-yet-completed tasks in launch order. The head is the only one
    /// allowed to run.
    queue: VecDeque<PipeEntry>,
    /// Whether the head has been dispatched.
    active: bool,
}

/// State shared between a [`Pipe`] handle and the nodes bound to it.
pub(crate) struct PipeShared {
    name: String,
    state: Mutex<PipeState>,
}

impl PipeShared {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a freshly launched node. Must run before the node's launch
    /// guard is released.
    pub(crate) fn enqueue(&self, node: &Arc<TaskNode>) {
        let predecessor = {
            let mut state = self.lock();
            let predecessor = state.queue.back().map(|e| Arc::downgrade(&e.node));
            state.queue.push_back(PipeEntry {
                node: Arc::clone(node),
                ready: false,
            });
            predecessor
        };
        node.set_pipe_predecessor(predecessor);
        debug!(pipe = %self.name, task = %node.name(), "task bound to pipe");
    }

    /// Called when a bound node's prerequisites are satisfied.
    pub(crate) fn node_ready(&self, node: &Arc<TaskNode>) {
        let next = {
            let mut state = self.lock();
            match state.queue.iter_mut().find(|e| e.node.id() == node.id()) {
                Some(entry) => entry.ready = true,
                None => {
                    warn!(pipe = %self.name, task = %node.name(), "ready task is not bound to this pipe");
                    return;
                }
            }
            Self::take_next(&mut state)
        };

        if let Some(next) = next {
            self.start(next);
        }
    }

    /// Called when a bound node completed.
    pub(crate) fn node_completed(&self, node: &Arc<TaskNode>) {
        let next = {
            let mut state = self.lock();
            match state.queue.front() {
                Some(head) if head.node.id() == node.id() => {
                    state.queue.pop_front();
                    state.active = false;
                }
                _ => {
                    warn!(pipe = %self.name, task = %node.name(), "completed task is not the pipe head");
                    remove_entry(&mut state.queue, node.id());
                }
            }
            Self::take_next(&mut state)
        };

        if let Some(next) = next {
            self.start(next);
        }
    }

    fn take_next(state: &mut PipeState) -> Option<Arc<TaskNode>> {
        if state.active {
            return None;
        }
        match state.queue.front() {
            Some(head) if head.ready => {
                state.active = true;
                Some(Arc::clone(&head.node))
            }
            _ => None,
        }
    }

    fn start(&self, node: Arc<TaskNode>) {
        debug!(pipe = %self.name, task = %node.name(), "pipe head dispatched");
        node.schedule_dispatch();
    }

    fn len(&self) -> usize {
        self.lock().queue.len()
    }
}

fn remove_entry(queue: &mut VecDeque<PipeEntry>, id: TaskId) {
    if let Some(pos) = queue.iter().position(|e| e.node.id() == id) {
        queue.remove(pos);
    }
}

/// Handle to an ordered execution pipe. Cheap to clone.
#[derive(Clone)]
pub struct Pipe {
    shared: Arc<PipeShared>,
    scheduler: Weak<Shared>,
}

impl Pipe {
    pub(crate) fn new(name: String, scheduler: Weak<Shared>) -> Self {
        Self {
            shared: Arc::new(PipeShared {
                name,
                state: Mutex::new(PipeState::default()),
            }),
            scheduler,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<PipeShared> {
        &self.shared
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Tasks launched on this pipe that have not completed yet.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scheduler(&self) -> Result<Arc<Shared>> {
        self.scheduler
            .upgrade()
            .ok_or(TaskGraphError::SchedulerShutdown)
    }

    /// Launch `work` at the tail of this pipe. Same contract as
    /// [`super::Scheduler::launch`].
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
        let shared = self.scheduler()?;
        shared.launch(name.into(), prerequisites, options.in_pipe(self), work)
    }

    /// Launch result-producing `work` at the tail of this pipe.
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
        let shared = self.scheduler()?;
        shared.launch_with_result(name.into(), prerequisites, options.in_pipe(self), work)
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("name", &self.shared.name)
            .field("pending", &self.len())
            .finish()
    }
}
