#![allow(dead_code)]

pub use suitedag_test_utils::{init_tracing, run_suite, run_suite_with, with_timeout, Journal};

use std::collections::VecDeque;

use suitedag::dag::{Failure, Launch, Node, NodeId};
use suitedag::engine::{CoreCommand, CoreRuntime, CoreStep, NodeOutcome, RunEvent, RuntimeEvent};
use suitedag::exec::Body;

/// Test node whose body does nothing.
pub fn passing(title: &str) -> Node {
    Node::test(title, Body::Noop)
}

/// Test node whose body returns an error.
pub fn failing(title: &str, message: &'static str) -> Node {
    Node::test(title, Body::sync(move |_| Err(anyhow::anyhow!(message))))
}

pub fn launches(step: &CoreStep) -> Vec<Launch> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Launch(l) => Some(l.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

pub fn emitted(step: &CoreStep) -> Vec<RunEvent> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Emit(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}

/// Drive a core to the end without any executor: launched nodes complete in
/// launch order, failing when their (space separated) title is in `fail`.
///
/// Returns launched titles in launch order.
pub fn drive(core: &mut CoreRuntime, fail: &[&str]) -> Vec<String> {
    drive_with_events(core, fail).0
}

/// Like [`drive`], also returning every published event.
pub fn drive_with_events(core: &mut CoreRuntime, fail: &[&str]) -> (Vec<String>, Vec<RunEvent>) {
    let mut titles = Vec::new();
    let mut events = Vec::new();
    let mut pending: VecDeque<(NodeId, String)> = VecDeque::new();

    let step = core.start();
    events.extend(emitted(&step));
    for l in launches(&step) {
        pending.push_back((l.node, l.title));
    }

    while let Some((node, title)) = pending.pop_front() {
        let outcome = if fail.contains(&title.as_str()) {
            NodeOutcome::Failed(Failure::new(format!("{title} failed")))
        } else {
            NodeOutcome::Success
        };
        titles.push(title);

        let step = core.step(RuntimeEvent::NodeFinished { node, outcome });
        events.extend(emitted(&step));
        for l in launches(&step) {
            pending.push_back((l.node, l.title));
        }
    }

    (titles, events)
}

/// Titles of the non-marker nodes among `titles`.
pub fn without_markers(titles: &[String]) -> Vec<String> {
    let markers = [
        "Global exclusive start",
        "Global exclusive finish",
        "Non exclusives end",
    ];
    titles
        .iter()
        .filter(|t| !markers.iter().any(|m| t.ends_with(m)))
        .cloned()
        .collect()
}
