// src/dag/result.rs

//! Once-written, many-read result slot of a task.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::errors::{Result, TaskGraphError};

/// Type-erased outcome of a task's work.
///
/// The payload is stored behind an `Arc`, so cloning a `TaskResult` is cheap
/// and every clone observes the same immutable value. Typed reads compare the
/// stored `TypeId` against the requested one and fail instead of
/// reinterpreting the value.
#[derive(Clone, Default)]
pub struct TaskResult {
    value: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl TaskResult {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            type_name: type_name::<T>(),
        }
    }

    /// A result that carries no value (`is_valid() == false`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validity flag: `true` when a value is present.
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// Name of the stored type, or `"<empty>"`.
    pub fn type_name(&self) -> &'static str {
        if self.value.is_some() {
            self.type_name
        } else {
            "<empty>"
        }
    }

    /// Whether the stored value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Borrow the stored value as a `T`.
    ///
    /// `task` is only used for error messages.
    pub fn get<T: Any>(&self, task: &str) -> Result<&T> {
        let value = self
            .value
            .as_ref()
            .ok_or_else(|| TaskGraphError::EmptyResult(task.to_string()))?;

        value.downcast_ref::<T>().ok_or_else(|| {
            warn!(
                task = %task,
                stored = self.type_name,
                requested = type_name::<T>(),
                "typed result requested at a different type than stored"
            );
            TaskGraphError::ResultTypeMismatch {
                stored: self.type_name,
                requested: type_name::<T>(),
            }
        })
    }
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("valid", &self.is_valid())
            .field("type", &self.type_name())
            .finish()
    }
}
