// src/dag/handle.rs

//! Caller-facing references to task nodes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::dag::node::{NodeSpec, TaskId, TaskNode, TaskState};
use crate::dag::result::TaskResult;
use crate::engine::DispatchMode;
use crate::errors::{Result, TaskGraphError};
use crate::types::Priority;

/// What a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleKind {
    /// Fire-and-forget work.
    #[default]
    Task,
    /// Externally triggered gate.
    Event,
    /// Work that stores a typed payload on completion.
    ResultTask,
}

impl HandleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HandleKind::Task => "task",
            HandleKind::Event => "event",
            HandleKind::ResultTask => "result task",
        }
    }
}

/// Shared reference to a task node.
///
/// Cloning a handle never duplicates the node. `TaskHandle::default()` is the
/// invalid handle: every operation on it is a logged no-op.
#[derive(Clone, Default)]
pub struct TaskHandle {
    kind: HandleKind,
    node: Option<Arc<TaskNode>>,
}

impl TaskHandle {
    pub(crate) fn from_node(node: Arc<TaskNode>) -> Self {
        Self {
            kind: node.kind(),
            node: Some(node),
        }
    }

    /// Create a standalone event. It stays pending until [`trigger`] is called
    /// and every prerequisite added with [`add_prerequisite`] has completed.
    ///
    /// [`trigger`]: TaskHandle::trigger
    /// [`add_prerequisite`]: TaskHandle::add_prerequisite
    pub fn new_event(name: impl Into<String>) -> Self {
        let node = TaskNode::new(NodeSpec {
            name: name.into(),
            kind: HandleKind::Event,
            priority: Priority::Normal,
            dispatch: DispatchMode::Inline,
            pipe: None,
            scheduler: Default::default(),
            work: None,
        });
        Self::from_node(node)
    }

    pub(crate) fn node(&self) -> Option<&Arc<TaskNode>> {
        self.node.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.node.is_some()
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn id(&self) -> Option<TaskId> {
        self.node.as_ref().map(|n| n.id())
    }

    pub fn name(&self) -> Option<&str> {
        self.node.as_ref().map(|n| n.name())
    }

    pub fn state(&self) -> Option<TaskState> {
        self.node.as_ref().map(|n| n.state())
    }

    /// `false` for the invalid handle.
    pub fn is_completed(&self) -> bool {
        self.node.as_ref().is_some_and(|n| n.is_completed())
    }

    fn event_node(&self, op: &'static str) -> Result<&Arc<TaskNode>> {
        let Some(node) = self.node.as_ref() else {
            warn!(op, "task handle is invalid");
            return Err(TaskGraphError::InvalidHandle(op));
        };

        if self.kind != HandleKind::Event {
            warn!(op, task = %node.name(), kind = self.kind.as_str(), "handle is not an event");
            return Err(TaskGraphError::WrongVariant {
                op,
                expected: HandleKind::Event.as_str(),
                actual: self.kind.as_str(),
            });
        }

        Ok(node)
    }

    /// Release the event's own gate.
    ///
    /// Returns `true` if this call triggered the event. Triggering again is a
    /// no-op that returns `false`, as is triggering an invalid or non-event
    /// handle; all of those are logged at warning level.
    pub fn trigger(&self) -> bool {
        let Ok(node) = self.event_node("trigger") else {
            return false;
        };

        if node.trigger() {
            true
        } else {
            warn!(task = %node.name(), "event already triggered; ignoring");
            false
        }
    }

    /// Make `prerequisite` an extra gate of this event.
    ///
    /// Only allowed before [`trigger`](TaskHandle::trigger). A prerequisite
    /// that has already completed is accepted and has no effect. Edges that
    /// would make the graph cyclic are rejected.
    ///
    /// The cycle check is skipped while nothing depends on this event yet,
    /// so building a chain front to back is linear. Once the event has
    /// dependents, every call walks the incomplete graph upstream of
    /// `prerequisite`, which makes extending a long, already-wired chain
    /// from the back quadratic overall.
    pub fn add_prerequisite(&self, prerequisite: &TaskHandle) -> Result<()> {
        let node = self.event_node("add_prerequisite")?;

        let Some(prereq) = prerequisite.node.as_ref() else {
            warn!(task = %node.name(), "prerequisite handle is invalid");
            return Err(TaskGraphError::InvalidHandle("add_prerequisite"));
        };

        node.add_event_prerequisite(prereq)
    }

    /// Poll the stored result. Never blocks.
    ///
    /// Fails for invalid handles and non-result handles (logged), and with
    /// [`TaskGraphError::NotYetCompleted`] while the task is still in flight
    /// (not logged, polling is expected).
    pub fn result(&self) -> Result<TaskResult> {
        let Some(node) = self.node.as_ref() else {
            warn!("result requested from an invalid task handle");
            return Err(TaskGraphError::InvalidHandle("result"));
        };

        if self.kind != HandleKind::ResultTask {
            warn!(task = %node.name(), kind = self.kind.as_str(), "task does not carry a result");
            return Err(TaskGraphError::WrongVariant {
                op: "result",
                expected: HandleKind::ResultTask.as_str(),
                actual: self.kind.as_str(),
            });
        }

        if !node.is_completed() {
            trace!(task = %node.name(), "result polled before completion");
            return Err(TaskGraphError::NotYetCompleted(node.name().to_string()));
        }

        Ok(node.result())
    }

    /// Poll the stored result and clone it out as a `T`.
    pub fn result_as<T: Any + Clone>(&self) -> Result<T> {
        let result = self.result()?;
        let name = self.name().unwrap_or_default();
        result.get::<T>(name).cloned()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => f
                .debug_struct("TaskHandle")
                .field("kind", &self.kind)
                .field("id", &node.id())
                .field("name", &node.name())
                .field("state", &node.state())
                .finish(),
            None => f.write_str("TaskHandle(<invalid>)"),
        }
    }
}
