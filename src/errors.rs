// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The handle does not reference a task node (default-constructed handle).
    #[error("Invalid task handle passed to {0}")]
    InvalidHandle(&'static str),

    /// The operation does not apply to this kind of handle.
    #[error("{op} requires a {expected} handle, got {actual}")]
    WrongVariant {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Task '{0}' has not completed yet")]
    NotYetCompleted(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Event '{0}' was already triggered")]
    AlreadyTriggered(String),

    #[error("Task '{0}' completed without a result value")]
    EmptyResult(String),

    #[error("Result type mismatch: stored {stored}, requested {requested}")]
    ResultTypeMismatch {
        stored: &'static str,
        requested: &'static str,
    },

    #[error("{0} must be called from inside a running task")]
    NotInTask(&'static str),

    #[error("Scheduler is shutting down")]
    SchedulerShutdown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskGraphError>;
