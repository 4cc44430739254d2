// tests/events.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskgraph::dag::{HandleKind, TaskHandle, TaskState};
use taskgraph::engine::LaunchOptions;
use taskgraph::errors::TaskGraphError;
use taskgraph_test_utils::{init_tracing, scheduler, wait_for, with_timeout};

#[test]
fn second_trigger_is_a_no_op() {
    init_tracing();
    let event = TaskHandle::new_event("once");

    assert_eq!(event.kind(), HandleKind::Event);
    assert_eq!(event.state(), Some(TaskState::Pending));
    assert!(event.trigger());
    assert!(event.is_completed());
    assert!(!event.trigger());
    assert!(event.is_completed());
}

#[tokio::test]
async fn dependents_are_released_exactly_once() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let event = scheduler.make_event("go");
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let task = scheduler
            .launch("counted", &[event.clone()], LaunchOptions::new(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert!(event.trigger());
        assert!(!event.trigger());
        wait_for(&scheduler, &task).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    })
    .await;
}

#[tokio::test]
async fn triggered_event_still_waits_for_added_prerequisites() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let hold = scheduler.make_event("hold");
        let work = scheduler
            .launch("work", &[hold.clone()], LaunchOptions::new(), || ())
            .unwrap();

        let event = scheduler.make_event("after-work");
        event.add_prerequisite(&work).unwrap();
        assert!(event.trigger());
        assert!(!event.is_completed());

        hold.trigger();
        wait_for(&scheduler, &event).await;
        assert!(work.is_completed());
        assert!(event.is_completed());
    })
    .await;
}

#[tokio::test]
async fn completed_prerequisite_is_accepted_without_effect() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);
        let done = scheduler
            .launch("done", &[], LaunchOptions::new(), || ())
            .unwrap();
        wait_for(&scheduler, &done).await;

        let event = scheduler.make_event("e");
        event.add_prerequisite(&done).unwrap();
        assert!(event.trigger());
        assert!(event.is_completed());
    })
    .await;
}

#[test]
fn add_prerequisite_after_trigger_is_rejected() {
    init_tracing();
    let event = TaskHandle::new_event("late");
    let other = TaskHandle::new_event("other");
    event.trigger();

    let err = event.add_prerequisite(&other).unwrap_err();
    assert!(matches!(err, TaskGraphError::AlreadyTriggered(name) if name == "late"));
}

#[test]
fn self_edge_is_rejected_as_cycle() {
    init_tracing();
    let event = TaskHandle::new_event("self");

    let err = event.add_prerequisite(&event).unwrap_err();
    assert!(matches!(err, TaskGraphError::DagCycle(_)));
    assert!(event.trigger());
    assert!(event.is_completed());
}

#[tokio::test]
async fn cycle_through_a_dependent_task_is_rejected() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let event = scheduler.make_event("E");
        let task = scheduler
            .launch("A", &[event.clone()], LaunchOptions::new(), || ())
            .unwrap();

        let err = event.add_prerequisite(&task).unwrap_err();
        assert!(matches!(err, TaskGraphError::DagCycle(_)));

        // The rejected edge left nothing behind.
        event.trigger();
        wait_for(&scheduler, &task).await;
        assert!(task.is_completed());
    })
    .await;
}

#[tokio::test]
async fn cycle_through_pipe_order_is_rejected() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let pipe = scheduler.make_pipe("P");
        let event = scheduler.make_event("E");

        let head = pipe
            .launch("head", &[event.clone()], LaunchOptions::new(), || ())
            .unwrap();
        let tail = pipe
            .launch("tail", &[], LaunchOptions::new(), || ())
            .unwrap();

        // `tail` cannot run before `head`, which waits on E.
        let err = event.add_prerequisite(&tail).unwrap_err();
        assert!(matches!(err, TaskGraphError::DagCycle(_)));

        event.trigger();
        wait_for(&scheduler, &tail).await;
        assert!(head.is_completed());
    })
    .await;
}

#[tokio::test]
async fn event_operations_on_task_handles_are_wrong_variant() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);
        let task = scheduler
            .launch("plain", &[], LaunchOptions::new(), || ())
            .unwrap();
        let other = TaskHandle::new_event("other");

        assert!(!task.trigger());
        let err = task.add_prerequisite(&other).unwrap_err();
        assert!(matches!(
            err,
            TaskGraphError::WrongVariant { op: "add_prerequisite", .. }
        ));

        wait_for(&scheduler, &task).await;
    })
    .await;
}

#[test]
fn invalid_handles_are_logged_no_ops() {
    init_tracing();
    let invalid = TaskHandle::default();
    let event = TaskHandle::new_event("e");

    assert!(!invalid.is_valid());
    assert!(!invalid.trigger());
    assert!(!invalid.is_completed());
    assert_eq!(invalid.state(), None);
    assert!(matches!(
        invalid.add_prerequisite(&event),
        Err(TaskGraphError::InvalidHandle(_))
    ));
    assert!(matches!(
        event.add_prerequisite(&invalid),
        Err(TaskGraphError::InvalidHandle(_))
    ));
    assert_eq!(invalid, TaskHandle::default());
    assert_ne!(event, TaskHandle::default());
    assert_eq!(event, event.clone());
}

#[test]
fn long_event_chain_releases_from_a_single_trigger() {
    init_tracing();
    let scheduler = scheduler(1);
    let first = scheduler.make_event("e0");

    let mut events = vec![first.clone()];
    for i in 1..20_000 {
        let event = scheduler.make_event(format!("e{i}"));
        event.add_prerequisite(&events[i - 1]).unwrap();
        assert!(event.trigger());
        events.push(event);
    }
    assert!(events.iter().all(|e| !e.is_completed()));

    first.trigger();

    assert!(events.iter().all(TaskHandle::is_completed));
}
