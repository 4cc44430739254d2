// src/engine/object.rs

//! Task objects: stateful work whose result is read back after it ran.

use std::sync::Arc;

use tracing::debug;

use crate::dag::handle::{HandleKind, TaskHandle};
use crate::dag::node::Work;
use crate::dag::result::TaskResult;
use crate::engine::{DispatchMode, LaunchOptions, Scheduler};
use crate::errors::Result;

/// A unit of work carried by an object instead of a closure.
pub trait TaskObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Runs once, on whatever the launch options dispatch to.
    fn execute(&self);

    /// Read after [`execute`](TaskObject::execute) returned.
    fn result(&self) -> TaskResult {
        TaskResult::empty()
    }
}

impl Scheduler {
    /// Launch `object.execute()` and return a result handle that completes
    /// once its result has been extracted.
    ///
    /// Execution honors `prerequisites`, `options` and the gate like any
    /// other launch. Extraction runs inline right after execution and is not
    /// gated, so a pause that starts in between cannot strand the result.
    pub fn launch_object<O: TaskObject>(
        &self,
        object: Arc<O>,
        prerequisites: &[TaskHandle],
        options: LaunchOptions,
    ) -> Result<TaskHandle> {
        let name = object.name().to_string();

        let runner = Arc::clone(&object);
        let executed = self.launch(name.clone(), prerequisites, options, move || {
            runner.execute();
        })?;

        let extract: Work = Box::new(move || Some(object.result()));
        let handle = self.shared().launch_continuation(
            format!("{name}.result"),
            HandleKind::ResultTask,
            &executed,
            DispatchMode::Inline,
            extract,
        )?;

        debug!(task = %name, "task object launched");
        Ok(handle)
    }
}
