use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use taskgraph::exec::{CommandRunner, TaskOutcome};

/// One observed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub task: String,
    pub thread: Option<String>,
}

/// Thread-safe record of which tasks ran, in which order, and how many ran
/// at the same time.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    started: Mutex<Vec<Execution>>,
    finished: Mutex<Vec<String>>,
    /// `start:<task>` / `end:<task>` in one combined order.
    events: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ExecutionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start(&self, task: &str) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("start:{task}"));
        self.started.lock().unwrap().push(Execution {
            task: task.to_string(),
            thread: thread::current().name().map(str::to_string),
        });
    }

    pub fn finish(&self, task: &str) {
        self.events.lock().unwrap().push(format!("end:{task}"));
        self.finished.lock().unwrap().push(task.to_string());
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    /// Record a whole execution of `task` around `f`.
    pub fn record<T>(&self, task: &str, f: impl FnOnce() -> T) -> T {
        self.start(task);
        let out = f();
        self.finish(task);
        out
    }

    /// Task names in start order.
    pub fn started(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.task.clone())
            .collect()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.started.lock().unwrap().clone()
    }

    /// Task names in finish order.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Whether `first` finished before `second` started.
    pub fn finished_before_started(&self, first: &str, second: &str) -> bool {
        let events = self.events();
        let end = events.iter().position(|e| *e == format!("end:{first}"));
        let start = events.iter().position(|e| *e == format!("start:{second}"));
        matches!((end, start), (Some(e), Some(s)) if e < s)
    }

    /// Position of `task` in start order.
    pub fn start_index(&self, task: &str) -> Option<usize> {
        self.started().iter().position(|t| t == task)
    }

    /// Position of `task` in finish order.
    pub fn finish_index(&self, task: &str) -> Option<usize> {
        self.finished().iter().position(|t| t == task)
    }
}

/// A `CommandRunner` that records which tasks were "run" instead of
/// spawning processes. Tasks listed via [`FakeRunner::failing`] report
/// `Failed(1)`, everything else succeeds.
#[derive(Debug, Default)]
pub struct FakeRunner {
    log: Arc<ExecutionLog>,
    failing: BTreeSet<String>,
}

impl FakeRunner {
    pub fn new(log: Arc<ExecutionLog>) -> Self {
        Self {
            log,
            failing: BTreeSet::new(),
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, task: &str, _cmd: &str) -> TaskOutcome {
        self.log.record(task, || {
            if self.failing.contains(task) {
                TaskOutcome::Failed(1)
            } else {
                TaskOutcome::Success
            }
        })
    }
}
