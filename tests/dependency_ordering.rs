// tests/dependency_ordering.rs

use std::thread;
use std::time::Duration;

use taskgraph::dag::{TaskHandle, TaskState};
use taskgraph::engine::LaunchOptions;
use taskgraph_test_utils::recorder::ExecutionLog;
use taskgraph_test_utils::{init_tracing, scheduler, wait_for, wait_for_all, with_timeout};

#[tokio::test]
async fn chain_a_b_c_runs_in_dependency_order() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(4);
        let log = ExecutionLog::new();

        let l = log.clone();
        let a = scheduler
            .launch("A", &[], LaunchOptions::new(), move || {
                l.record("A", || thread::sleep(Duration::from_millis(20)))
            })
            .unwrap();
        let l = log.clone();
        let b = scheduler
            .launch("B", &[a.clone()], LaunchOptions::new(), move || {
                l.record("B", || thread::sleep(Duration::from_millis(10)))
            })
            .unwrap();
        let l = log.clone();
        let c = scheduler
            .launch("C", &[a.clone(), b.clone()], LaunchOptions::new(), move || {
                l.record("C", || ())
            })
            .unwrap();

        wait_for(&scheduler, &c).await;

        assert_eq!(log.started(), vec!["A", "B", "C"]);
        assert_eq!(log.finished(), vec!["A", "B", "C"]);
        assert!(a.is_completed() && b.is_completed() && c.is_completed());
    })
    .await;
}

#[tokio::test]
async fn diamond_join_waits_for_both_branches() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(4);
        let log = ExecutionLog::new();

        let l = log.clone();
        let root = scheduler
            .launch("root", &[], LaunchOptions::new(), move || l.record("root", || ()))
            .unwrap();
        let l = log.clone();
        let slow = scheduler
            .launch("slow", &[root.clone()], LaunchOptions::new(), move || {
                l.record("slow", || thread::sleep(Duration::from_millis(40)))
            })
            .unwrap();
        let l = log.clone();
        let fast = scheduler
            .launch("fast", &[root.clone()], LaunchOptions::new(), move || {
                l.record("fast", || ())
            })
            .unwrap();
        let l = log.clone();
        let join = scheduler
            .launch("join", &[slow, fast], LaunchOptions::new(), move || {
                l.record("join", || ())
            })
            .unwrap();

        wait_for(&scheduler, &join).await;

        let join_start = log.start_index("join").unwrap();
        assert_eq!(join_start, 3);
        assert!(log.finished_before_started("slow", "join"));
        assert!(log.finished_before_started("fast", "join"));
    })
    .await;
}

#[tokio::test]
async fn dependent_stays_pending_until_prerequisite_completes() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let gate = scheduler.make_event("hold");

        let first = scheduler
            .launch("first", &[gate.clone()], LaunchOptions::new(), || ())
            .unwrap();
        let second = scheduler
            .launch("second", &[first.clone()], LaunchOptions::new(), || ())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(first.state(), Some(TaskState::Pending));
        assert_eq!(second.state(), Some(TaskState::Pending));

        gate.trigger();
        wait_for(&scheduler, &second).await;
        assert_eq!(second.state(), Some(TaskState::Completed));
    })
    .await;
}

#[tokio::test]
async fn completed_and_invalid_prerequisites_do_not_block() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);

        let done = scheduler
            .launch("done", &[], LaunchOptions::new(), || ())
            .unwrap();
        wait_for(&scheduler, &done).await;

        let later = scheduler
            .launch(
                "later",
                &[done, TaskHandle::default()],
                LaunchOptions::new(),
                || (),
            )
            .unwrap();
        wait_for(&scheduler, &later).await;
        assert!(later.is_completed());
    })
    .await;
}

#[tokio::test]
async fn inline_task_runs_on_the_thread_that_released_it() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(3);
        let log = ExecutionLog::new();

        let l = log.clone();
        let parent = scheduler
            .launch("parent", &[], LaunchOptions::new(), move || {
                l.record("parent", || thread::sleep(Duration::from_millis(10)))
            })
            .unwrap();
        let l = log.clone();
        let inline = scheduler
            .launch("inline", &[parent], LaunchOptions::new().inline(), move || {
                l.record("inline", || ())
            })
            .unwrap();

        wait_for(&scheduler, &inline).await;

        let runs = log.executions();
        assert_eq!(runs.len(), 2);
        let worker = runs[0].thread.clone().unwrap();
        assert!(worker.starts_with("taskgraph-worker-"));
        assert_eq!(runs[1].thread.as_deref(), Some(worker.as_str()));
    })
    .await;
}

#[test]
fn inline_task_without_prerequisites_runs_during_launch() {
    init_tracing();
    let scheduler = scheduler(1);
    let log = ExecutionLog::new();

    let l = log.clone();
    let handle = scheduler
        .launch("now", &[], LaunchOptions::new().inline(), move || {
            l.record("now", || ())
        })
        .unwrap();

    assert!(handle.is_completed());
    assert_eq!(
        log.executions()[0].thread,
        thread::current().name().map(str::to_string)
    );
}

#[tokio::test]
async fn fan_out_runs_in_parallel_across_workers() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(4);
        let log = ExecutionLog::new();
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(3));

        let mut handles = Vec::new();
        for i in 0..3 {
            let l = log.clone();
            let b = barrier.clone();
            let name = format!("par{i}");
            handles.push(
                scheduler
                    .launch(name.clone(), &[], LaunchOptions::new(), move || {
                        l.record(&name, || {
                            b.wait();
                        })
                    })
                    .unwrap(),
            );
        }

        wait_for_all(&scheduler, &handles).await;
        assert_eq!(log.max_concurrency(), 3);
    })
    .await;
}

#[test]
fn long_inline_chain_runs_without_growing_the_stack() {
    init_tracing();
    let scheduler = scheduler(1);
    let start = scheduler.make_event("start");
    let ran = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let mut previous = start.clone();
    for i in 0..20_000 {
        let counter = ran.clone();
        previous = scheduler
            .launch(
                format!("link-{i}"),
                &[previous],
                LaunchOptions::new().inline(),
                move || {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                },
            )
            .unwrap();
    }

    assert!(start.trigger());

    assert!(previous.is_completed());
    assert_eq!(ran.load(std::sync::atomic::Ordering::SeqCst), 20_000);
}

#[test]
fn long_inline_pipe_drains_on_the_releasing_thread() {
    init_tracing();
    let scheduler = scheduler(1);
    let pipe = scheduler.make_pipe("inline-pipe");
    let start = scheduler.make_event("start");
    let log = ExecutionLog::new();

    let mut handles = Vec::new();
    for i in 0..5_000 {
        let prerequisites = if i == 0 { vec![start.clone()] } else { Vec::new() };
        let l = log.clone();
        let name = format!("p{i}");
        handles.push(
            pipe.launch(name.clone(), &prerequisites, LaunchOptions::new().inline(), move || {
                l.record(&name, || ())
            })
            .unwrap(),
        );
    }
    assert!(log.started().is_empty());

    start.trigger();

    assert!(handles.iter().all(TaskHandle::is_completed));
    assert!(pipe.is_empty());
    assert_eq!(log.started().len(), 5_000);
    assert_eq!(log.max_concurrency(), 1);
    let here = thread::current().name().map(str::to_string);
    assert!(log.executions().iter().all(|e| e.thread == here));
}
