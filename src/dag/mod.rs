// src/dag/mod.rs

//! Test graph representation and scheduling.
//!
//! - [`group`] and [`node`] are the declarative tree handed to a run.
//! - [`graph`] is the arena the tree compiles into.
//! - [`scheduler`] contains the per-run state machine that admits ready
//!   nodes under the concurrency ceiling and records their completions.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`stats`] holds run statistics and the final report.

pub mod context;
pub mod failure;
pub mod graph;
pub mod group;
pub mod node;
pub mod scheduler;
pub mod scheduler_step;
pub mod stats;

pub use context::Context;
pub use failure::{Failure, format_ms};
pub use graph::{GraphSink, GroupInfo, NodeSnapshot, TestGraph};
pub use group::{Group, GroupId};
pub use node::{Node, NodeId, NodeKind, NodeResult, PreviousOutcome, RunState};
pub use scheduler::Scheduler;
pub use scheduler_step::{Launch, SchedulerStep};
pub use stats::{RunReport, RunStats};
