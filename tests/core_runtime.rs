// tests/core_runtime.rs

mod common;
use crate::common::{drive, emitted, init_tracing, launches, passing};

use std::error::Error;
use std::time::Duration;

use suitedag::dag::{Failure, Group, Node, NodeId, NodeResult, Scheduler};
use suitedag::engine::{CoreCommand, CoreRuntime, NodeOutcome, RunEvent, RunOptions, RuntimeEvent};
use suitedag::exec::Body;

type TestResult = Result<(), Box<dyn Error>>;

fn core_for(root: Group, options: RunOptions) -> Result<CoreRuntime, Box<dyn Error>> {
    Ok(CoreRuntime::new(Scheduler::new(root, options)?))
}

fn finished(node: NodeId) -> RuntimeEvent {
    RuntimeEvent::NodeFinished {
        node,
        outcome: NodeOutcome::Success,
    }
}

fn failed(node: NodeId, message: &str) -> RuntimeEvent {
    RuntimeEvent::NodeFinished {
        node,
        outcome: NodeOutcome::Failed(Failure::new(message)),
    }
}

fn id_of(core: &CoreRuntime, title: &str) -> NodeId {
    let graph = core.scheduler().graph();
    graph
        .node_ids()
        .find(|id| graph.full_title(*id, " ") == title)
        .unwrap_or_else(|| panic!("no node titled {title:?}"))
}

fn count_finish(events: &[RunEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RunEvent::Finish(_)))
        .count()
}

#[test]
fn start_emits_start_and_launches_the_entry_marker() -> TestResult {
    init_tracing();

    let mut core = core_for(Group::root().with_test(passing("a")), RunOptions::default())?;
    let step = core.start();

    assert!(step.keep_running);
    let events = emitted(&step);
    assert!(matches!(events[0], RunEvent::Start));
    assert!(matches!(&events[1], RunEvent::TestStart(n) if n.title == "Global exclusive start"));

    let launched = launches(&step);
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].node, core.scheduler().first());

    // Markers carry no timeout.
    assert!(
        !step
            .commands
            .iter()
            .any(|c| matches!(c, CoreCommand::ArmTimeout { .. }))
    );

    // Starting twice does nothing.
    assert!(core.start().commands.is_empty());
    Ok(())
}

#[test]
fn local_tests_run_one_after_another() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(passing("a"))
        .with_test(passing("b"))
        .with_test(passing("c"));
    let mut core = core_for(root, RunOptions::default())?;

    let launched = drive(&mut core, &[]);

    assert_eq!(
        launched,
        vec![
            "Global exclusive start",
            "a",
            "b",
            "c",
            "Global exclusive finish",
        ]
    );
    assert!(core.is_finished());
    assert!(!core.is_stalled());

    let stats = core.report().stats;
    assert_eq!(stats.passes, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.max_concurrency, 1);
    // One tick per admission and one per completion.
    assert_eq!(stats.ticks, 10);
    assert!(stats.duration.is_some());
    Ok(())
}

#[test]
fn concurrency_ceiling_limits_admissions() -> TestResult {
    init_tracing();

    let mut root = Group::root().non_exclusive_tests();
    for title in ["a", "b", "c", "d", "e"] {
        root.add_test(passing(title));
    }
    let options = RunOptions {
        concurrency: Some(2),
        ..RunOptions::default()
    };
    let mut core = core_for(root, options)?;

    let start = core.start();
    let entry = launches(&start)[0].node;

    let step = core.step(finished(entry));
    let batch = launches(&step);
    assert_eq!(batch.len(), 2);
    assert_eq!(core.scheduler().running(), 2);
    assert_eq!(core.scheduler().ready_len(), 3);

    let armed: Vec<_> = step
        .commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::ArmTimeout { node, after } => Some((*node, *after)),
            _ => None,
        })
        .collect();
    assert_eq!(armed.len(), 2);
    assert!(armed.iter().all(|(_, after)| *after == Duration::from_millis(2000)));

    // One slot frees up, one node gets in.
    let step = core.step(finished(batch[0].node));
    assert_eq!(launches(&step).len(), 1);
    assert!(matches!(step.commands[0], CoreCommand::ClearTimeout(id) if id == batch[0].node));
    Ok(())
}

#[test]
fn unbounded_and_zero_ceilings_admit_everything_ready() -> TestResult {
    init_tracing();

    for concurrency in [None, Some(0)] {
        let mut root = Group::root().non_exclusive_tests();
        for title in ["a", "b", "c", "d", "e"] {
            root.add_test(passing(title));
        }
        let options = RunOptions {
            concurrency,
            ..RunOptions::default()
        };
        let mut core = core_for(root, options)?;
        drive(&mut core, &[]);

        let stats = core.report().stats;
        assert_eq!(stats.max_concurrency, 5);
        assert_eq!(stats.passes, 5);
    }
    Ok(())
}

#[test]
fn timeout_then_late_success_is_reconciled() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(passing("slow").with_timeout(Duration::from_millis(50)))
        .with_test(passing("next"));
    let mut core = core_for(root, RunOptions::default())?;
    let slow = id_of(&core, "slow");

    let start = core.start();
    let step = core.step(finished(launches(&start)[0].node));
    assert!(step.commands.iter().any(|c| matches!(
        c,
        CoreCommand::ArmTimeout { node, after } if *node == slow && *after == Duration::from_millis(50)
    )));

    let step = core.step(RuntimeEvent::TimeoutElapsed { node: slow });
    let snapshot = core.scheduler().snapshot(slow);
    assert_eq!(snapshot.result, Some(NodeResult::Timeout));
    assert_eq!(
        snapshot.failure.as_ref().map(Failure::message),
        Some("Timeout of 50ms exceeded")
    );
    let next = launches(&step);
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].title, "next");

    // Late success arrives.
    let step = core.step(finished(slow));
    let events = emitted(&step);
    let Some(RunEvent::TestFinish { node, previous }) = events.first() else {
        panic!("expected a test finish event, got {events:?}");
    };
    assert_eq!(
        previous.as_ref().and_then(|p| p.result),
        Some(NodeResult::Timeout)
    );
    assert_eq!(node.result, Some(NodeResult::Timeout));
    let message = node.failure.as_ref().map(Failure::message).unwrap_or("");
    assert!(
        message.starts_with("Timeout of 50ms exceeded, eventually succeeded after"),
        "{message}"
    );

    // A stale timer and further completions change nothing visible.
    assert!(core.step(RuntimeEvent::TimeoutElapsed { node: slow }).commands.is_empty());
    assert!(core.step(finished(slow)).commands.is_empty());
    let step = core.step(failed(slow, "again"));
    assert!(matches!(
        emitted(&step).as_slice(),
        [RunEvent::TestError { error, .. }] if error.message() == "again"
    ));

    let stats = core.scheduler().stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.passes, 0);
    Ok(())
}

#[test]
fn timeout_then_late_failure_nests_the_cause() -> TestResult {
    init_tracing();

    let root = Group::root().with_test(passing("slow").with_timeout(Duration::from_millis(1500)));
    let mut core = core_for(root, RunOptions::default())?;
    let slow = id_of(&core, "slow");

    let start = core.start();
    core.step(finished(launches(&start)[0].node));
    let step = core.step(RuntimeEvent::TimeoutElapsed { node: slow });

    // The terminal node runs as soon as the timed out node is done.
    let last = launches(&step);
    assert_eq!(last[0].node, core.scheduler().last());

    core.step(failed(slow, "late boom"));

    let snapshot = core.scheduler().snapshot(slow);
    let failure = snapshot.failure.expect("failure recorded");
    assert!(
        failure
            .message()
            .starts_with("Timeout of 2s exceeded, eventually failed after"),
        "{}",
        failure.message()
    );
    assert_eq!(failure.causes().len(), 1);
    assert_eq!(failure.causes()[0].message(), "late boom");
    assert_eq!(core.scheduler().stats().failures, 1);
    Ok(())
}

#[test]
fn completing_twice_turns_a_pass_into_a_failure() -> TestResult {
    init_tracing();

    let root = Group::root().with_test(passing("a")).with_test(passing("b"));
    let mut core = core_for(root, RunOptions::default())?;
    let (a, b) = (id_of(&core, "a"), id_of(&core, "b"));

    let start = core.start();
    core.step(finished(launches(&start)[0].node));
    core.step(finished(a));
    assert_eq!(core.scheduler().stats().passes, 1);

    let step = core.step(finished(a));
    let events = emitted(&step);
    assert!(matches!(
        events.as_slice(),
        [RunEvent::TestFinish { previous: Some(p), .. }] if p.result == Some(NodeResult::Success)
    ));

    let snapshot = core.scheduler().snapshot(a);
    assert_eq!(snapshot.result, Some(NodeResult::Failure));
    assert_eq!(
        snapshot.failure.as_ref().map(Failure::message),
        Some("done() called multiple times")
    );
    assert_eq!(core.scheduler().stats().passes, 0);
    assert_eq!(core.scheduler().stats().failures, 1);

    let step = core.step(finished(b));
    let last = launches(&step)[0].node;
    let step = core.step(finished(last));
    assert!(!step.keep_running);
    assert!(step.commands.iter().any(|c| matches!(c, CoreCommand::RequestExit)));

    let report = core.report();
    assert_eq!(report.stats.passes, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].full_title, "a");
    assert_eq!(report.failures[0].failure_number, Some(1));
    assert!(!report.is_success());
    Ok(())
}

#[test]
fn a_failure_is_sticky() -> TestResult {
    init_tracing();

    let root = Group::root().with_test(passing("a")).with_test(passing("b"));
    let mut core = core_for(root, RunOptions::default())?;
    let a = id_of(&core, "a");

    let start = core.start();
    core.step(finished(launches(&start)[0].node));
    core.step(failed(a, "first"));

    assert!(core.step(finished(a)).commands.is_empty());

    let step = core.step(failed(a, "second"));
    assert!(matches!(
        emitted(&step).as_slice(),
        [RunEvent::TestError { error, .. }] if error.message() == "second"
    ));

    let snapshot = core.scheduler().snapshot(a);
    assert_eq!(snapshot.failure.as_ref().map(Failure::message), Some("first"));
    assert_eq!(core.scheduler().stats().failures, 1);
    Ok(())
}

#[test]
fn failed_before_all_fails_dependents_without_running_them() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_before_all(Node::before_all("setup", Body::Noop))
        .with_test(passing("a"))
        .with_test(passing("b"))
        .with_test(passing("c").with_skip(true))
        .with_after_all(Node::after_all("teardown", Body::Noop));
    let mut core = core_for(root, RunOptions::default())?;

    let launched = drive(&mut core, &["setup"]);
    assert_eq!(
        launched,
        vec!["Global exclusive start", "setup", "Global exclusive finish"]
    );

    let report = core.report();
    for title in ["a", "b", "c", "teardown"] {
        let node = report.node(title).expect("node in report");
        assert_eq!(node.result, Some(NodeResult::HookFailure), "{title}");
        assert_eq!(
            node.failure.as_ref().map(Failure::message),
            Some("setup dependency failed")
        );
    }

    assert_eq!(report.stats.failures, 5);
    let order: Vec<_> = report.failures.iter().map(|f| f.full_title.as_str()).collect();
    assert_eq!(order, vec!["setup", "a", "b", "c", "teardown"]);
    let ordinals: Vec<_> = report.failures.iter().map(|f| f.failure_number).collect();
    assert_eq!(ordinals, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    Ok(())
}

#[test]
fn failing_test_does_not_fail_its_siblings() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(passing("a"))
        .with_test(passing("b"))
        .with_test(passing("c"));
    let mut core = core_for(root, RunOptions::default())?;

    let launched = drive(&mut core, &["b"]);
    assert_eq!(launched.len(), 5);

    let report = core.report();
    assert_eq!(report.stats.passes, 2);
    assert_eq!(report.stats.failures, 1);
    assert_eq!(report.node("c").and_then(|n| n.result), Some(NodeResult::Success));
    Ok(())
}

#[test]
fn skipped_nodes_complete_without_launching() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(Node::pending("todo"))
        .with_test(passing("a"));
    let mut core = core_for(root, RunOptions::default())?;

    let launched = drive(&mut core, &[]);
    assert!(!launched.iter().any(|t| t == "todo"));

    let report = core.report();
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.passes, 1);
    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.node("todo").and_then(|n| n.result), Some(NodeResult::Skipped));
    Ok(())
}

#[test]
fn bail_skips_waiting_nodes_and_forces_the_terminal_node() -> TestResult {
    init_tracing();

    let root = Group::root()
        .with_test(passing("a"))
        .with_test(passing("b"))
        .with_test(passing("c"));
    let mut core = core_for(root, RunOptions::default())?;
    let a = id_of(&core, "a");

    let mut events = Vec::new();
    let start = core.start();
    events.extend(emitted(&start));
    events.extend(emitted(&core.step(finished(launches(&start)[0].node))));

    let step = core.step(RuntimeEvent::BailRequested);
    events.extend(emitted(&step));
    assert!(core.scheduler().is_bailing());
    let forced = launches(&step);
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].node, core.scheduler().last());

    // Asking again is a no-op.
    assert!(core.step(RuntimeEvent::BailRequested).commands.is_empty());

    let step = core.step(finished(forced[0].node));
    events.extend(emitted(&step));
    assert!(!step.keep_running);
    assert!(core.is_finished());

    // The body that was running when we bailed reports in late.
    events.extend(emitted(&core.step(finished(a))));

    assert_eq!(count_finish(&events), 1);
    let report = core.report();
    assert_eq!(report.stats.skipped, 2);
    assert_eq!(report.node("b").and_then(|n| n.result), Some(NodeResult::Skipped));
    assert_eq!(report.node("c").and_then(|n| n.result), Some(NodeResult::Skipped));
    Ok(())
}

#[test]
fn bail_completes_waiting_markers_as_success() -> TestResult {
    init_tracing();

    let root = Group::root()
        .non_exclusive_tests()
        .with_test(passing("a"))
        .with_test(passing("b"));
    let mut core = core_for(root, RunOptions::default())?;

    let start = core.start();
    core.step(finished(launches(&start)[0].node));
    let step = core.step(RuntimeEvent::BailRequested);
    core.step(finished(launches(&step)[0].node));

    let report = core.report();
    assert_eq!(
        report.node("Non exclusives end").and_then(|n| n.result),
        Some(NodeResult::Success)
    );
    // Markers are never tallied.
    assert_eq!(report.stats.passes, 0);
    assert_eq!(report.stats.skipped, 0);
    Ok(())
}

#[test]
fn completion_for_unknown_node_is_ignored() -> TestResult {
    init_tracing();

    let mut core = core_for(Group::root().with_test(passing("a")), RunOptions::default())?;
    core.start();

    assert!(core.step(finished(NodeId(999))).commands.is_empty());
    assert!(core.step(RuntimeEvent::TimeoutElapsed { node: NodeId(999) }).commands.is_empty());
    Ok(())
}
