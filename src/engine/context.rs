// src/engine/context.rs

//! Caller-owned delivery contexts.
//!
//! A delivery context is the "main thread" of some host: tasks dispatched to
//! it are not run by the worker pool but sent over a channel and run by
//! whoever drains the matching [`ContextQueue`], on that thread, in arrival
//! order.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::dag::node::TaskNode;

/// Create a connected context / queue pair.
pub fn delivery_context(name: impl Into<String>) -> (DeliveryContext, ContextQueue) {
    let name: Arc<str> = Arc::from(name.into());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DeliveryContext {
            name: Arc::clone(&name),
            tx,
        },
        ContextQueue { name, rx },
    )
}

/// Sending side: given to the scheduler via [`super::DispatchMode::Context`]
/// or [`super::Scheduler::bind_completion`].
#[derive(Clone)]
pub struct DeliveryContext {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Arc<TaskNode>>,
}

impl DeliveryContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owning queue still exists.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Hands the node back if the queue was dropped.
    pub(crate) fn deliver(&self, node: Arc<TaskNode>) -> Result<(), Arc<TaskNode>> {
        trace!(context = %self.name, task = %node.name(), "delivering task to context");
        self.tx.send(node).map_err(|err| err.0)
    }
}

impl fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Receiving side, owned by the context's thread.
pub struct ContextQueue {
    name: Arc<str>,
    rx: mpsc::UnboundedReceiver<Arc<TaskNode>>,
}

impl ContextQueue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run everything delivered so far without waiting. Returns how many
    /// tasks ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(node) = self.rx.try_recv() {
            node.execute();
            ran += 1;
        }
        if ran > 0 {
            debug!(context = %self.name, ran, "drained delivery context");
        }
        ran
    }

    /// Wait for the next delivered task and run it.
    ///
    /// Returns `false` once every [`DeliveryContext`] for this queue has been
    /// dropped and nothing is left to run.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(node) => {
                node.execute();
                true
            }
            None => {
                debug!(context = %self.name, "delivery context closed");
                false
            }
        }
    }
}

impl Drop for ContextQueue {
    /// Nodes already delivered still have to run; they run here, on the
    /// dropping thread. Later deliveries fall back to inline execution.
    fn drop(&mut self) {
        self.rx.close();
        let mut ran = 0;
        while let Ok(node) = self.rx.try_recv() {
            warn!(
                context = %self.name,
                task = %node.name(),
                "delivery context dropped with pending work; running task inline"
            );
            node.execute();
            ran += 1;
        }
        if ran > 0 {
            debug!(context = %self.name, ran, "drained delivery context on drop");
        }
    }
}

impl fmt::Debug for ContextQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
