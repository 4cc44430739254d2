// src/engine/workers.rs

//! Worker pool.
//!
//! Each worker is a named OS thread that pulls ready nodes from the shared
//! [`super::ready_queue::ReadyQueue`] and runs them to completion. Workers
//! exit once the queue is closed *and* drained, so work that was already
//! queued when the scheduler shuts down still runs.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::engine::scheduler::Shared;
use crate::errors::Result;

/// Spawn `count` workers named `<prefix>-<index>`.
///
/// If any spawn fails, the workers started so far are stopped and joined
/// before the error is returned.
pub(crate) fn spawn_workers(
    shared: &Arc<Shared>,
    count: usize,
    prefix: &str,
) -> Result<Vec<JoinHandle<()>>> {
    let mut workers = Vec::with_capacity(count);

    for index in 0..count {
        let worker_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(format!("{prefix}-{index}"))
            .spawn(move || worker_loop(worker_shared, index));

        match spawned {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                error!(index, error = %err, "failed to spawn worker thread");
                shared.shutdown();
                join_workers(&mut workers);
                return Err(err.into());
            }
        }
    }

    info!(workers = count, prefix, "worker pool started");
    Ok(workers)
}

/// Join every worker, skipping the calling thread if it is one of them.
pub(crate) fn join_workers(workers: &mut Vec<JoinHandle<()>>) {
    let current = thread::current().id();

    for handle in workers.drain(..) {
        if handle.thread().id() == current {
            // Dropped from inside one of its own tasks; this thread exits on
            // its own once the queue is drained.
            continue;
        }
        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if handle.join().is_err() {
            error!(worker = %name, "worker thread panicked");
        }
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    debug!(worker = index, "worker started");
    let mut ran: u64 = 0;

    while let Some(node) = shared.next_ready() {
        node.execute();
        ran += 1;
    }

    debug!(worker = index, ran, "worker finished (queue closed)");
}
