// src/engine/ready_queue.rs

use std::sync::{Arc, PoisonError, RwLock};

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, unbounded};
use tracing::trace;

use crate::dag::node::TaskNode;
use crate::types::Priority;

/// Ready work waiting for a worker, one channel per priority class.
///
/// Workers always take from the highest non-empty class first. Nothing here
/// knows about dependencies or pipes: a node only gets in once it may run.
///
/// Closing drops the senders. Workers keep receiving what was already queued
/// and see the classes disconnect once they are drained.
#[derive(Debug)]
pub(crate) struct ReadyQueue {
    senders: RwLock<Option<[Sender<Arc<TaskNode>>; 3]>>,
    receivers: [Receiver<Arc<TaskNode>>; 3],
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        let (high_tx, high_rx) = unbounded();
        let (normal_tx, normal_rx) = unbounded();
        let (low_tx, low_rx) = unbounded();
        Self {
            senders: RwLock::new(Some([high_tx, normal_tx, low_tx])),
            receivers: [high_rx, normal_rx, low_rx],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.receivers.iter().map(Receiver::len).sum()
    }

    /// Stop accepting work. Already queued nodes can still be received.
    pub(crate) fn close(&self) {
        self.senders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Queue a ready node. Hands it back if the queue is closed.
    pub(crate) fn push(&self, node: Arc<TaskNode>) -> Result<(), Arc<TaskNode>> {
        let senders = self.senders.read().unwrap_or_else(PoisonError::into_inner);
        let Some(senders) = senders.as_ref() else {
            return Err(node);
        };
        let priority = node.priority();
        trace!(task = %node.name(), %priority, "queued ready task");
        senders[priority.index()].send(node).map_err(|err| err.0)
    }

    /// Next node by priority without blocking.
    ///
    /// `Err(())` once every class is disconnected and drained.
    fn try_next(&self) -> Result<Option<Arc<TaskNode>>, ()> {
        let mut disconnected = 0;
        for priority in Priority::DESCENDING {
            match self.receivers[priority.index()].try_recv() {
                Ok(node) => return Ok(Some(node)),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => disconnected += 1,
            }
        }
        if disconnected == self.receivers.len() {
            Err(())
        } else {
            Ok(None)
        }
    }

    /// Block until there is ready work, or return `None` once the queue is
    /// closed and drained.
    pub(crate) fn next_blocking(&self) -> Option<Arc<TaskNode>> {
        loop {
            match self.try_next() {
                Ok(Some(node)) => return Some(node),
                Err(()) => return None,
                Ok(None) => {}
            }

            // Wait without receiving, then take by priority on the next pass.
            let mut select = Select::new();
            for receiver in &self.receivers {
                select.recv(receiver);
            }
            select.ready();
        }
    }
}
