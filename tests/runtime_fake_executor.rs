// tests/runtime_fake_executor.rs

mod common;
use crate::common::{init_tracing, passing};

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use suitedag::dag::{Group, Node, NodeResult, Scheduler};
use suitedag::engine::{CoreRuntime, RunEvent, RunOptions, Runtime};
use suitedag::exec::Body;
use suitedag_test_utils::FakeExecutor;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn runtime_launches_nodes_in_dependency_order() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(passing("a"))
        .with_group(Group::new("g").with_test(passing("b")));
    let scheduler = Scheduler::new(root, RunOptions::default())?;

    let (tx, rx) = mpsc::unbounded_channel();
    let launched = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&launched));

    let runtime = Runtime::new(CoreRuntime::new(scheduler), rx, tx, executor);
    let report = timeout(Duration::from_secs(2), runtime.run()).await??;

    let launched = launched.lock().unwrap().clone();
    assert_eq!(
        launched,
        vec![
            "Global exclusive start",
            "a",
            "g b",
            "Global exclusive finish",
        ]
    );
    assert!(report.is_success());
    assert_eq!(report.stats.passes, 2);
    assert_eq!(report.stats.groups, 2);
    Ok(())
}

#[tokio::test]
async fn runtime_reports_failures_and_hook_cascades() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_before_all(Node::before_all("setup", Body::Noop))
        .with_test(passing("a"));
    let scheduler = Scheduler::new(root, RunOptions::default())?;

    let (tx, rx) = mpsc::unbounded_channel();
    let launched = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&launched)).failing("setup");

    let runtime = Runtime::new(CoreRuntime::new(scheduler), rx, tx, executor);
    let report = timeout(Duration::from_secs(2), runtime.run()).await??;

    assert!(!launched.lock().unwrap().iter().any(|t| t == "a"));
    assert_eq!(report.stats.failures, 2);
    assert_eq!(
        report.node("setup").and_then(|n| n.result),
        Some(NodeResult::Failure)
    );
    assert_eq!(
        report.node("a").and_then(|n| n.result),
        Some(NodeResult::HookFailure)
    );
    Ok(())
}

#[tokio::test]
async fn observer_sees_start_first_and_finish_last() -> TestResult {
    init_tracing();

    let root = Group::root().with_test(passing("a")).with_test(passing("b"));
    let scheduler = Scheduler::new(root, RunOptions::default())?;

    let (tx, rx) = mpsc::unbounded_channel();
    let (obs_tx, mut obs_rx) = mpsc::unbounded_channel();
    let executor = FakeExecutor::new(tx.clone(), Arc::new(Mutex::new(Vec::new())));

    let runtime =
        Runtime::new(CoreRuntime::new(scheduler), rx, tx, executor).with_observer(obs_tx);
    timeout(Duration::from_secs(2), runtime.run()).await??;

    let mut events = Vec::new();
    while let Some(event) = obs_rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(RunEvent::Start)));
    assert!(matches!(events.last(), Some(RunEvent::Finish(stats)) if stats.passes == 2));

    let starts = events
        .iter()
        .filter(|e| matches!(e, RunEvent::TestStart(_)))
        .count();
    let finishes = events
        .iter()
        .filter(|e| matches!(e, RunEvent::TestFinish { .. }))
        .count();
    // Two tests plus the entry and exit markers.
    assert_eq!(starts, 4);
    assert_eq!(finishes, 4);
    Ok(())
}
