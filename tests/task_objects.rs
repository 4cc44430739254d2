// tests/task_objects.rs

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use taskgraph::dag::{HandleKind, TaskResult};
use taskgraph::engine::{Gate, LaunchOptions, Scheduler, TaskObject};
use taskgraph::config::SchedulerConfig;
use taskgraph::errors::TaskGraphError;
use taskgraph_test_utils::{init_tracing, scheduler, wait_for, with_timeout};

struct WordCount {
    text: String,
    count: Mutex<Option<usize>>,
}

impl WordCount {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            count: Mutex::new(None),
        })
    }
}

impl TaskObject for WordCount {
    fn name(&self) -> &str {
        "word-count"
    }

    fn execute(&self) {
        *self.count.lock().unwrap() = Some(self.text.split_whitespace().count());
    }

    fn result(&self) -> TaskResult {
        match *self.count.lock().unwrap() {
            Some(n) => TaskResult::new(n),
            None => TaskResult::empty(),
        }
    }
}

struct Fire;

impl TaskObject for Fire {
    fn name(&self) -> &str {
        "fire"
    }

    fn execute(&self) {}
}

#[tokio::test]
async fn object_result_is_extracted_after_execution() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(2);
        let object = WordCount::new("one two three four");

        let handle = scheduler
            .launch_object(object.clone(), &[], LaunchOptions::new())
            .unwrap();
        assert_eq!(handle.kind(), HandleKind::ResultTask);
        assert_eq!(handle.name(), Some("word-count.result"));

        wait_for(&scheduler, &handle).await;
        assert_eq!(handle.result_as::<usize>().unwrap(), 4);
        assert_eq!(*object.count.lock().unwrap(), Some(4));
    })
    .await;
}

#[tokio::test]
async fn object_without_result_yields_an_empty_one() {
    with_timeout(async {
        init_tracing();
        let scheduler = scheduler(1);
        let handle = scheduler
            .launch_object(Arc::new(Fire), &[], LaunchOptions::new())
            .unwrap();

        wait_for(&scheduler, &handle).await;
        assert!(!handle.result().unwrap().is_valid());
        assert!(matches!(
            handle.result_as::<usize>(),
            Err(TaskGraphError::EmptyResult(_))
        ));
    })
    .await;
}

#[tokio::test]
async fn object_execution_is_gated_but_extraction_is_not() {
    with_timeout(async {
        init_tracing();
        let gate = Arc::new(Gate::new());
        let scheduler = Scheduler::with_gate(SchedulerConfig::with_workers(1), gate.clone()).unwrap();
        let object = WordCount::new("a b");

        gate.pause();
        let handle = scheduler
            .launch_object(object.clone(), &[], LaunchOptions::new())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(object.count.lock().unwrap().is_none());
        assert!(matches!(
            handle.result(),
            Err(TaskGraphError::NotYetCompleted(_))
        ));

        gate.resume();
        wait_for(&scheduler, &handle).await;
        assert_eq!(handle.result_as::<usize>().unwrap(), 2);
    })
    .await;
}
