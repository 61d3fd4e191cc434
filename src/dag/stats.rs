// src/dag/stats.rs

//! Run statistics and the final report handed back to callers.

use std::time::{Duration, SystemTime};

use crate::dag::graph::NodeSnapshot;

/// Aggregate counters for a run.
///
/// `tests` counts every registered non-marker node (hooks included), the
/// same population that `passes`, `failures` and `skipped` are tallied over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub groups: usize,
    pub tests: usize,
    pub skipped: usize,
    pub passes: usize,
    pub failures: usize,
    pub completed: usize,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub duration: Option<Duration>,
    /// Peak number of simultaneously admitted nodes.
    pub max_concurrency: usize,
    /// Logical clock: one tick per admission and per first completion.
    pub ticks: u64,
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    /// Failed nodes, in the order their failure was recorded.
    pub failures: Vec<NodeSnapshot>,
    /// Every registered node in registration order.
    pub nodes: Vec<NodeSnapshot>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.stats.failures == 0
    }

    pub fn node(&self, full_title: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.full_title == full_title)
    }
}
