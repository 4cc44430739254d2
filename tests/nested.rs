// tests/nested.rs

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use taskgraph::dag::{TaskHandle, TaskState};
use taskgraph::engine::{LaunchOptions, add_nested, current_task};
use taskgraph::errors::TaskGraphError;
use taskgraph_test_utils::recorder::ExecutionLog;
use taskgraph_test_utils::{init_tracing, scheduler, wait_for, with_timeout};

#[tokio::test]
async fn parent_completes_only_after_nested_child() {
    with_timeout(async {
        init_tracing();
        let scheduler = Arc::new(scheduler(2));
        let log = ExecutionLog::new();
        let release = scheduler.make_event("release-child");

        let (child_tx, child_rx) = mpsc::channel::<TaskHandle>();
        let inner = scheduler.clone();
        let l = log.clone();
        let hold = release.clone();
        let parent = scheduler
            .launch("parent", &[], LaunchOptions::new(), move || {
                l.record("parent", || {
                    let l = l.clone();
                    let child = inner
                        .launch("child", &[hold], LaunchOptions::new(), move || {
                            l.record("child", || ())
                        })
                        .unwrap();
                    add_nested(&child).unwrap();
                    let _ = child_tx.send(child);
                })
            })
            .unwrap();

        let l = log.clone();
        let dependent = scheduler
            .launch("dependent", &[parent.clone()], LaunchOptions::new(), move || {
                l.record("dependent", || ())
            })
            .unwrap();

        let child = child_rx.recv().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(log.finished(), vec!["parent"]);
        assert_eq!(parent.state(), Some(TaskState::Running));
        assert!(!dependent.is_completed());

        release.trigger();
        wait_for(&scheduler, &dependent).await;

        assert!(child.is_completed());
        assert!(parent.is_completed());
        assert_eq!(log.finished(), vec!["parent", "child", "dependent"]);
    })
    .await;
}

#[tokio::test]
async fn nesting_an_already_completed_child_has_no_effect() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);
        let done = TaskHandle::new_event("done");
        done.trigger();

        let (tx, rx) = mpsc::channel();
        let parent = scheduler
            .launch("parent", &[], LaunchOptions::new(), move || {
                let _ = tx.send(add_nested(&done).is_ok());
            })
            .unwrap();

        wait_for(&scheduler, &parent).await;
        assert!(rx.recv().unwrap());
    })
    .await;
}

#[tokio::test]
async fn current_task_is_visible_inside_work_only() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);
        assert!(current_task().is_none());

        let (tx, rx) = mpsc::channel();
        let task = scheduler
            .launch("introspect", &[], LaunchOptions::new(), move || {
                let current = current_task();
                let _ = tx.send(current.and_then(|h| h.name().map(str::to_string)));
            })
            .unwrap();

        wait_for(&scheduler, &task).await;
        assert_eq!(rx.recv().unwrap().as_deref(), Some("introspect"));
    })
    .await;
}

#[tokio::test]
async fn nesting_a_task_under_itself_is_rejected() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);

        let (tx, rx) = mpsc::channel();
        let task = scheduler
            .launch("selfish", &[], LaunchOptions::new(), move || {
                let me = current_task().unwrap_or_default();
                let _ = tx.send(add_nested(&me));
            })
            .unwrap();

        wait_for(&scheduler, &task).await;
        assert!(matches!(rx.recv().unwrap(), Err(TaskGraphError::DagCycle(_))));
    })
    .await;
}

#[test]
fn add_nested_outside_a_task_fails() {
    init_tracing();
    let event = TaskHandle::new_event("orphan");
    let err = add_nested(&event).unwrap_err();
    assert!(matches!(err, TaskGraphError::NotInTask("add_nested")));
}
