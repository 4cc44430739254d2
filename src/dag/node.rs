// src/dag/node.rs

//! Task nodes and the dependency bookkeeping between them.
//!
//! Readiness is counter based: every node carries the number of prerequisites
//! that have not completed yet, plus one "guard" that is held while the node
//! is being wired up (for launched tasks) or until it is triggered (for
//! events). Completing a node decrements the counter of each successor; the
//! successor that reaches zero is released. Nothing ever rescans the graph.
//!
//! Releasing is iterative: a node that becomes ready, a pipe head that is
//! handed on, or a nested parent whose last child finished is pushed onto a
//! per-thread worklist, and only the outermost frame on that thread drains
//! it. Long inline chains therefore run on the releasing thread without
//! growing its stack.
//!
//! Locking rules:
//! - a node's `inner` mutex is held only for short bookkeeping and never
//!   while another node's `inner` is held;
//! - work closures always run with no lock held;
//! - the process-wide edit lock is taken only by edits that need a cycle
//!   check (event prerequisites, nested children), never on the completion
//!   path, and nothing is released while it is held.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use tracing::{debug, error, trace, warn};

use crate::dag::handle::HandleKind;
use crate::dag::result::TaskResult;
use crate::engine::pipe::PipeShared;
use crate::engine::scheduler::Shared;
use crate::engine::DispatchMode;
use crate::errors::{Result, TaskGraphError};
use crate::types::Priority;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Serializes graph edits that must be checked for cycles.
static GRAPH_EDIT: Mutex<()> = Mutex::new(());

thread_local! {
    /// Stack of tasks executing on this thread (inline dispatch nests).
    static CURRENT: RefCell<Vec<Arc<TaskNode>>> = const { RefCell::new(Vec::new()) };

    /// Release steps waiting to be run on this thread.
    static STEPS: RefCell<VecDeque<Step>> = const { RefCell::new(VecDeque::new()) };

    /// Set while some frame on this thread is draining `STEPS`.
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

enum Step {
    /// All prerequisites resolved.
    Ready(Arc<TaskNode>),
    /// Hand to the dispatch target (used by pipes).
    Dispatch(Arc<TaskNode>),
    /// One outstanding unit (own work or a nested child) finished.
    Finish(Arc<TaskNode>),
}

/// Queue `step` and, unless an outer frame already does, drain the worklist.
fn drive(step: Step) {
    STEPS.with(|steps| steps.borrow_mut().push_back(step));
    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    let _reset = DrainGuard;

    while let Some(step) = STEPS.with(|steps| steps.borrow_mut().pop_front()) {
        match step {
            Step::Ready(node) => node.on_ready(),
            Step::Dispatch(node) => node.dispatch(),
            Step::Finish(node) => node.finish_execution(),
        }
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
    }
}

/// Process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on prerequisites (or, for events, on `trigger`).
    Pending,
    /// All prerequisites completed; waiting for a worker, a context or its
    /// turn on a pipe.
    Ready,
    /// Work is executing, or has executed and nested children are still
    /// outstanding.
    Running,
    Completed,
}

pub(crate) type Work = Box<dyn FnOnce() -> Option<TaskResult> + Send + 'static>;

enum Successor {
    /// A node that lists this one as a prerequisite.
    Dependent(Arc<TaskNode>),
    /// A node that attached this one as a nested child.
    NestedParent(Arc<TaskNode>),
}

struct NodeInner {
    state: TaskState,
    work: Option<Work>,
    successors: Vec<Successor>,
    /// Back-links used by the cycle check. Cleared on completion.
    prerequisites: Vec<Weak<TaskNode>>,
    nested_children: Vec<Weak<TaskNode>>,
    /// Previous node on the same pipe.
    pipe_predecessor: Option<Weak<TaskNode>>,
    triggered: bool,
}

/// Everything needed to build a node.
pub(crate) struct NodeSpec {
    pub name: String,
    pub kind: HandleKind,
    pub priority: Priority,
    pub dispatch: DispatchMode,
    pub pipe: Option<Arc<PipeShared>>,
    pub scheduler: Weak<Shared>,
    pub work: Option<Work>,
}

/// A unit of deferred, dependency-gated work.
pub struct TaskNode {
    id: TaskId,
    name: String,
    kind: HandleKind,
    priority: Priority,
    dispatch: DispatchMode,
    pipe: Option<Arc<PipeShared>>,
    scheduler: Weak<Shared>,
    /// Unresolved prerequisites plus the guard.
    unresolved: AtomicUsize,
    /// Own execution plus attached nested children.
    outstanding: AtomicUsize,
    inner: Mutex<NodeInner>,
    result: OnceLock<TaskResult>,
}

impl TaskNode {
    pub(crate) fn new(spec: NodeSpec) -> Arc<Self> {
        let node = Arc::new(Self {
            id: TaskId::next(),
            name: spec.name,
            kind: spec.kind,
            priority: spec.priority,
            dispatch: spec.dispatch,
            pipe: spec.pipe,
            scheduler: spec.scheduler,
            unresolved: AtomicUsize::new(1),
            outstanding: AtomicUsize::new(1),
            inner: Mutex::new(NodeInner {
                state: TaskState::Pending,
                work: spec.work,
                successors: Vec::new(),
                prerequisites: Vec::new(),
                nested_children: Vec::new(),
                pipe_predecessor: None,
                triggered: false,
            }),
            result: OnceLock::new(),
        });
        trace!(task = %node.name, id = %node.id, kind = ?node.kind, "task node created");
        node
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Stored result. Empty until the work returned a value.
    pub(crate) fn result(&self) -> TaskResult {
        self.result.get().cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, NodeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wire `prereq -> self` while `self` still holds its guard.
    pub(crate) fn add_prerequisite_edge(self: &Arc<Self>, prereq: &Arc<TaskNode>) {
        self.unresolved.fetch_add(1, Ordering::AcqRel);
        self.link_prerequisite(prereq);
    }

    /// Register on `prereq`'s successor list. The counter must already
    /// account for the edge.
    fn link_prerequisite(self: &Arc<Self>, prereq: &Arc<TaskNode>) {
        if !self.register_on(prereq) {
            self.resolve_prerequisite();
        }
    }

    /// Returns `false` if `prereq` already completed, in which case the
    /// caller must resolve the edge itself.
    fn register_on(self: &Arc<Self>, prereq: &Arc<TaskNode>) -> bool {
        {
            let mut inner = prereq.lock();
            if inner.state == TaskState::Completed {
                return false;
            }
            inner.successors.push(Successor::Dependent(Arc::clone(self)));
        }

        self.lock().prerequisites.push(Arc::downgrade(prereq));
        trace!(task = %self.name, prerequisite = %prereq.name, "prerequisite edge added");
        true
    }

    pub(crate) fn set_pipe_predecessor(&self, predecessor: Option<Weak<TaskNode>>) {
        self.lock().pipe_predecessor = predecessor;
    }

    /// Drop the launch guard. The node is released right away if nothing
    /// else holds it back.
    pub(crate) fn release_guard(self: &Arc<Self>) {
        self.resolve_prerequisite();
    }

    fn resolve_prerequisite(self: &Arc<Self>) {
        if self.unresolved.fetch_sub(1, Ordering::AcqRel) == 1 {
            drive(Step::Ready(Arc::clone(self)));
        }
    }

    fn on_ready(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            inner.state = TaskState::Ready;
            inner.prerequisites.clear();
        }
        debug!(task = %self.name, id = %self.id, "prerequisites satisfied; task ready");

        if self.kind == HandleKind::Event {
            // Events carry no work.
            self.lock().state = TaskState::Running;
            self.finish_execution();
            return;
        }

        match &self.pipe {
            Some(pipe) => pipe.node_ready(self),
            None => self.dispatch(),
        }
    }

    /// Dispatch from outside the release path, e.g. when a pipe moves on to
    /// its next head.
    pub(crate) fn schedule_dispatch(self: &Arc<Self>) {
        drive(Step::Dispatch(Arc::clone(self)));
    }

    /// Hand a ready node to whatever runs it.
    fn dispatch(self: &Arc<Self>) {
        match &self.dispatch {
            DispatchMode::Inline => self.execute(),
            DispatchMode::Worker => match self.scheduler.upgrade() {
                Some(shared) => {
                    if let Err(node) = shared.enqueue(Arc::clone(self)) {
                        warn!(
                            task = %node.name,
                            "worker pool has stopped; running task inline"
                        );
                        node.execute();
                    }
                }
                None => {
                    warn!(task = %self.name, "scheduler dropped; running task inline");
                    self.execute();
                }
            },
            DispatchMode::Context(ctx) => {
                if let Err(node) = ctx.deliver(Arc::clone(self)) {
                    warn!(
                        task = %node.name,
                        context = %ctx.name(),
                        "delivery context queue closed; running task inline"
                    );
                    node.execute();
                }
            }
        }
    }

    /// Run the work on the calling thread.
    pub(crate) fn execute(self: &Arc<Self>) {
        let work = {
            let mut inner = self.lock();
            if inner.state != TaskState::Ready {
                warn!(
                    task = %self.name,
                    state = ?inner.state,
                    "execute called on a task that is not ready; ignoring"
                );
                return;
            }
            inner.state = TaskState::Running;
            inner.work.take()
        };

        debug!(task = %self.name, id = %self.id, "task started");

        if let Some(work) = work {
            CURRENT.with(|stack| stack.borrow_mut().push(Arc::clone(self)));
            let outcome = panic::catch_unwind(AssertUnwindSafe(work));
            CURRENT.with(|stack| stack.borrow_mut().pop());

            match outcome {
                Ok(Some(result)) => {
                    if self.result.set(result).is_err() {
                        warn!(task = %self.name, "result already stored; keeping the first one");
                    }
                }
                Ok(None) => {}
                Err(payload) => {
                    error!(
                        task = %self.name,
                        id = %self.id,
                        panic = %panic_message(payload.as_ref()),
                        "task work panicked; completing without a result"
                    );
                }
            }
        }

        self.finish_execution();
    }

    fn finish_execution(self: &Arc<Self>) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(self: &Arc<Self>) {
        let successors = {
            let mut inner = self.lock();
            inner.state = TaskState::Completed;
            inner.prerequisites.clear();
            inner.nested_children.clear();
            inner.pipe_predecessor = None;
            std::mem::take(&mut inner.successors)
        };

        debug!(
            task = %self.name,
            id = %self.id,
            successors = successors.len(),
            "task completed"
        );

        if let Some(shared) = self.scheduler.upgrade() {
            shared.record_completion();
        }

        if let Some(pipe) = &self.pipe {
            pipe.node_completed(self);
        }

        for successor in successors {
            match successor {
                Successor::Dependent(node) => node.resolve_prerequisite(),
                Successor::NestedParent(parent) => drive(Step::Finish(parent)),
            }
        }
    }

    /// Keep `self` from completing until `child` has completed.
    pub(crate) fn attach_nested(self: &Arc<Self>, child: &Arc<TaskNode>) -> Result<()> {
        let _edit = GRAPH_EDIT.lock().unwrap_or_else(PoisonError::into_inner);

        if Arc::ptr_eq(self, child) || child.waits_on(self) {
            return Err(TaskGraphError::DagCycle(format!(
                "nesting '{}' under '{}' would close a cycle",
                child.name, self.name
            )));
        }

        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let registered = {
            let mut inner = child.lock();
            if inner.state == TaskState::Completed {
                false
            } else {
                inner
                    .successors
                    .push(Successor::NestedParent(Arc::clone(self)));
                true
            }
        };

        if registered {
            self.lock().nested_children.push(Arc::downgrade(child));
            debug!(task = %self.name, child = %child.name, "nested task attached");
        } else {
            self.finish_execution();
        }
        Ok(())
    }

    /// Release the artificial gate of an event. Returns `false` if it was
    /// already released.
    pub(crate) fn trigger(self: &Arc<Self>) -> bool {
        {
            let mut inner = self.lock();
            if inner.triggered {
                return false;
            }
            inner.triggered = true;
        }
        debug!(task = %self.name, id = %self.id, "event triggered");
        self.resolve_prerequisite();
        true
    }

    /// Add `prereq` as an extra prerequisite of this (untriggered) event.
    pub(crate) fn add_event_prerequisite(self: &Arc<Self>, prereq: &Arc<TaskNode>) -> Result<()> {
        let registered = {
            let _edit = GRAPH_EDIT.lock().unwrap_or_else(PoisonError::into_inner);

            // Only a node that something already waits on can be upstream of
            // `prereq`; events are never pipe members.
            let has_dependents = !self.lock().successors.is_empty();
            if Arc::ptr_eq(self, prereq) || (has_dependents && prereq.waits_on(self)) {
                return Err(TaskGraphError::DagCycle(format!(
                    "making '{}' a prerequisite of '{}' would close a cycle",
                    prereq.name, self.name
                )));
            }

            {
                let inner = self.lock();
                if inner.triggered {
                    return Err(TaskGraphError::AlreadyTriggered(self.name.clone()));
                }
                // Counted while the trigger guard is still held.
                self.unresolved.fetch_add(1, Ordering::AcqRel);
            }

            self.register_on(prereq)
        };

        // Resolving may release the event and its successors; never do that
        // under the edit lock.
        if !registered {
            self.resolve_prerequisite();
        }
        Ok(())
    }

    /// Whether `self` cannot complete before `target` has completed.
    ///
    /// Walks every incomplete node upstream of `self`, so the cost grows with
    /// the size of that subgraph.
    fn waits_on(&self, target: &Arc<TaskNode>) -> bool {
        let mut visited: HashSet<TaskId> = HashSet::new();
        visited.insert(self.id);
        let mut stack = self.upstream();

        while let Some(node) = stack.pop() {
            if node.id == target.id {
                return true;
            }
            if !visited.insert(node.id) {
                continue;
            }
            stack.extend(node.upstream());
        }

        false
    }

    /// Incomplete nodes that must complete before this one can.
    fn upstream(&self) -> Vec<Arc<TaskNode>> {
        let inner = self.lock();
        if inner.state == TaskState::Completed {
            return Vec::new();
        }

        inner
            .prerequisites
            .iter()
            .chain(inner.nested_children.iter())
            .chain(inner.pipe_predecessor.iter())
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Innermost task executing on this thread.
pub(crate) fn current() -> Option<Arc<TaskNode>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
