pub mod builders;
pub mod recorder;

use std::sync::{Arc, Once};
use std::time::Duration;

use taskgraph::config::SchedulerConfig;
use taskgraph::dag::TaskHandle;
use taskgraph::engine::{Gate, Scheduler};
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Scheduler with `workers` threads and its own gate, so pausing it in one
/// test never affects another.
pub fn scheduler(workers: usize) -> Scheduler {
    Scheduler::with_gate(SchedulerConfig::with_workers(workers), Arc::new(Gate::new()))
        .expect("failed to start test scheduler")
}

/// Wait until `handle` has completed.
///
/// Uses a completion callback on a worker, so the test runtime is never
/// blocked while waiting.
pub async fn wait_for(scheduler: &Scheduler, handle: &TaskHandle) {
    let (tx, rx) = oneshot::channel();
    scheduler
        .bind_completion(handle, None, move |_| {
            let _ = tx.send(());
        })
        .expect("bind_completion on a valid handle");
    rx.await.expect("completion callback dropped without running");
}

/// Wait for every handle in `handles`.
pub async fn wait_for_all(scheduler: &Scheduler, handles: &[TaskHandle]) {
    for handle in handles {
        wait_for(scheduler, handle).await;
    }
}

/// Poll `cond` every few milliseconds until it holds.
pub async fn eventually<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    while !cond() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
