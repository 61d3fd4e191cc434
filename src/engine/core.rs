// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing launched nodes to the executor
//! - arming and cancelling timeout timers
//! - forwarding lifecycle events to observers
//!
//! The core is intended to be unit tested without channels or processes.

use crate::dag::{RunReport, Scheduler};
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{
    CoreStep, handle_bail, handle_node_finished, handle_start, handle_timeout,
};

/// Pure core runtime state.
///
/// It has **no** channels, does not spawn tasks and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Begin the run: emits the start event and launches the entry node.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::NodeFinished { node, outcome } => {
                handle_node_finished(&mut self.scheduler, node, outcome)
            }
            RuntimeEvent::TimeoutElapsed { node } => handle_timeout(&mut self.scheduler, node),
            RuntimeEvent::BailRequested => handle_bail(&mut self.scheduler),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Started, not finished, and nothing left that could ever complete.
    pub fn is_stalled(&self) -> bool {
        self.scheduler.is_started() && !self.scheduler.is_finished() && self.scheduler.is_idle()
    }

    pub fn report(&self) -> RunReport {
        self.scheduler.report()
    }
}
