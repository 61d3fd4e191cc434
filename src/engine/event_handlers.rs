// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use crate::dag::{Launch, NodeId, Scheduler, SchedulerStep};
use crate::engine::{NodeOutcome, RunEvent};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Cancel any timer armed for this node.
    ClearTimeout(NodeId),
    /// Publish a lifecycle event to observers.
    Emit(RunEvent),
    /// Run these node bodies.
    Launch(Vec<Launch>),
    /// Start a timer that reports back after `after`.
    ArmTimeout { node: NodeId, after: Duration },
    /// The terminal node completed; the run is over.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Seed the run with its entry node.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start();
    into_core_step(step)
}

/// Handle a completion signal from a node body.
pub fn handle_node_finished(
    scheduler: &mut Scheduler,
    node: NodeId,
    outcome: NodeOutcome,
) -> CoreStep {
    let step = scheduler.handle_completion(node, outcome);
    into_core_step(step)
}

/// Handle an elapsed timer.
pub fn handle_timeout(scheduler: &mut Scheduler, node: NodeId) -> CoreStep {
    let step = scheduler.handle_timeout(node);
    into_core_step(step)
}

/// Handle a bail request.
pub fn handle_bail(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.bail();
    into_core_step(step)
}

/// Translate a scheduler step into shell commands.
///
/// Stale timers are cleared before anything else so that a timer for a node
/// that already completed can never be observed as armed, and events are
/// published before new bodies start.
pub fn into_core_step(step: SchedulerStep) -> CoreStep {
    let SchedulerStep {
        launches,
        cleared_timers,
        events,
        run_just_finished,
    } = step;

    let mut commands = Vec::new();
    commands.extend(cleared_timers.into_iter().map(CoreCommand::ClearTimeout));
    commands.extend(events.into_iter().map(CoreCommand::Emit));

    let timers: Vec<CoreCommand> = launches
        .iter()
        .filter_map(|l| {
            l.timeout.map(|after| CoreCommand::ArmTimeout {
                node: l.node,
                after,
            })
        })
        .collect();

    if !launches.is_empty() {
        commands.push(CoreCommand::Launch(launches));
    }
    commands.extend(timers);

    if run_just_finished {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running: !run_just_finished,
    }
}
