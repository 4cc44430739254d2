// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Scheduling class of a task.
///
/// Priority only orders work that is already *ready*; it never changes
/// dependency semantics. Within a class, ready work is taken FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// All classes, highest first. This is the order workers drain them in.
    pub const DESCENDING: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub(crate) fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "invalid priority: {other} (expected \"low\", \"normal\" or \"high\")"
            )),
        }
    }
}

/// Where a task runs once it is ready, as it can be written in a config file.
///
/// - `Worker`: queued on the scheduler's worker pool (default).
/// - `Inline`: run synchronously on the thread that released it. Meant for
///   lightweight continuations.
///
/// Delivery to a caller-owned context cannot be expressed in config; use
/// [`crate::engine::DispatchMode::Context`] from code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingPolicy {
    #[default]
    Worker,
    Inline,
}

impl FromStr for ThreadingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worker" => Ok(ThreadingPolicy::Worker),
            "inline" => Ok(ThreadingPolicy::Inline),
            other => Err(format!(
                "invalid threading policy: {other} (expected \"worker\" or \"inline\")"
            )),
        }
    }
}
