// src/engine/mod.rs

//! Orchestration engine for suitedag.
//!
//! This module ties together:
//! - the scheduler
//! - the main runtime event loop that reacts to:
//!   - node body completions
//!   - elapsed node timeouts
//!   - bail requests (e.g. Ctrl-C)
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::dag::{Failure, NodeId, NodeSnapshot, PreviousOutcome, RunStats};
use crate::types::Exclusivity;

/// Default per-node timeout applied at the root of every run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Outcome of a node body for the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Success,
    Failed(Failure),
}

/// Run-wide options used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    /// Maximum number of running nodes. `None` or `Some(0)` is unbounded.
    pub concurrency: Option<usize>,
    /// Timeout for nodes that do not set one themselves.
    pub default_timeout: Duration,
    /// Exclusivity for nodes that do not set one themselves.
    pub test_exclusivity: Exclusivity,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: None,
            default_timeout: DEFAULT_TIMEOUT,
            test_exclusivity: Exclusivity::Local,
        }
    }
}

/// Events flowing into the runtime from executors, timers and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A node body signalled completion. May arrive more than once.
    NodeFinished { node: NodeId, outcome: NodeOutcome },
    /// The timeout armed for a node elapsed.
    TimeoutElapsed { node: NodeId },
    /// Cancel the run (e.g. Ctrl-C).
    BailRequested,
}

/// Lifecycle events published to observers (reporters).
#[derive(Debug, Clone)]
pub enum RunEvent {
    Start,
    Finish(RunStats),
    TestStart(NodeSnapshot),
    /// `previous` is set when a late completion replaced an earlier outcome.
    TestFinish {
        node: NodeSnapshot,
        previous: Option<PreviousOutcome>,
    },
    /// An error that could not be recorded on the node.
    TestError { node: NodeSnapshot, error: Failure },
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
