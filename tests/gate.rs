// tests/gate.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use taskgraph::config::SchedulerConfig;
use taskgraph::engine::{Gate, LaunchOptions, Scheduler};
use taskgraph_test_utils::recorder::ExecutionLog;
use taskgraph_test_utils::{init_tracing, scheduler, wait_for, with_timeout};

#[tokio::test]
async fn task_launched_while_paused_waits_for_resume() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let log = ExecutionLog::new();

        let done = scheduler
            .launch("done", &[], LaunchOptions::new(), || ())
            .unwrap();
        wait_for(&scheduler, &done).await;

        scheduler.gate().pause();
        assert!(scheduler.is_paused());

        // Declared prerequisites are all complete; only the gate holds it.
        let l = log.clone();
        let gated = scheduler
            .launch("gated", &[done], LaunchOptions::new(), move || {
                l.record("gated", || ())
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.started().is_empty());
        assert!(!gated.is_completed());

        scheduler.gate().resume();
        assert!(!scheduler.is_paused());
        wait_for(&scheduler, &gated).await;
        assert_eq!(log.started(), vec!["gated"]);
    })
    .await;
}

#[tokio::test]
async fn tasks_launched_before_pause_are_not_gated() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let hold = scheduler.make_event("hold");
        let early = scheduler
            .launch("early", &[hold.clone()], LaunchOptions::new(), || ())
            .unwrap();

        scheduler.gate().pause();
        hold.trigger();
        wait_for(&scheduler, &early).await;
        assert!(early.is_completed());

        scheduler.gate().resume();
    })
    .await;
}

#[test]
fn resume_token_is_shared_while_paused_and_complete_while_running() {
    init_tracing();
    let gate = Gate::new();

    let running = gate.wait_for_resume_token();
    assert!(running.is_completed());

    gate.pause();
    gate.pause();
    let first = gate.wait_for_resume_token();
    let second = gate.wait_for_resume_token();
    assert!(!first.is_completed());
    assert_eq!(first, second);

    gate.resume();
    assert!(first.is_completed());

    // A new pause hands out a fresh token.
    gate.pause();
    let third = gate.wait_for_resume_token();
    assert_ne!(first, third);
    assert!(!third.is_completed());
    gate.resume();
    assert!(third.is_completed());
}

#[test]
fn gated_prerequisites_only_add_the_token_while_paused() {
    init_tracing();
    let gate = Gate::new();
    let declared = vec![taskgraph::dag::TaskHandle::new_event("a")];

    assert_eq!(gate.gated_prerequisites(&declared), declared);

    gate.pause();
    let gated = gate.gated_prerequisites(&declared);
    assert_eq!(gated.len(), 2);
    assert_eq!(gated[0], declared[0]);
    assert_eq!(gated[1], gate.wait_for_resume_token());
    gate.resume();
}

#[tokio::test]
async fn completion_callbacks_are_not_gated() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let task = scheduler
            .launch("task", &[], LaunchOptions::new(), || ())
            .unwrap();
        wait_for(&scheduler, &task).await;

        scheduler.gate().pause();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler
            .bind_completion(&task, None, move |_| {
                flag.store(true, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();

        rx.await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
        assert!(scheduler.is_paused());
        scheduler.gate().resume();
    })
    .await;
}

#[test]
fn schedulers_share_the_global_gate_by_default() {
    init_tracing();
    let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();
    assert!(Arc::ptr_eq(scheduler.gate(), &Gate::global()));

    let own = Arc::new(Gate::new());
    let other = Scheduler::with_gate(SchedulerConfig::with_workers(1), own.clone()).unwrap();
    assert!(Arc::ptr_eq(other.gate(), &own));
}

#[test]
fn token_taken_during_a_racing_resume_belongs_to_the_new_pause() {
    init_tracing();
    for _ in 0..500 {
        let gate = Arc::new(Gate::new());
        gate.pause();
        let stale = gate.wait_for_resume_token();

        let resumer = {
            let gate = gate.clone();
            std::thread::spawn(move || gate.resume())
        };
        gate.pause();
        let token = gate.wait_for_resume_token();
        resumer.join().unwrap();

        // Either the resume landed before the second pause (fresh token), or
        // after it (gate running again). A token from the current pause is
        // never triggered by the earlier resume.
        if gate.is_paused() {
            assert!(!token.is_completed());
            assert_ne!(token, stale);
        }
        assert!(stale.is_completed());
    }
}
