// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use std::time::Duration;

use crate::dag::context::Context;
use crate::dag::node::NodeId;
use crate::engine::RunEvent;
use crate::exec::Body;

/// A node admitted by the scheduler whose body must now be invoked.
#[derive(Debug, Clone)]
pub struct Launch {
    pub node: NodeId,
    /// Full title, space separated.
    pub title: String,
    pub body: Body,
    pub context: Context,
    /// Arm a timeout for this long, if set.
    pub timeout: Option<Duration>,
}

/// Structured result of a single scheduler "step".
///
/// Tests can drive the scheduler by hand and assert on what each step
/// produced.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes admitted in this step that need their bodies run.
    pub launches: Vec<Launch>,
    /// Nodes that reached their first completion; any armed timer is stale.
    pub cleared_timers: Vec<NodeId>,
    /// Lifecycle events, in the order they happened.
    pub events: Vec<RunEvent>,
    /// Whether this step completed the terminal node.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn launched_ids(&self) -> Vec<NodeId> {
        self.launches.iter().map(|l| l.node).collect()
    }
}
