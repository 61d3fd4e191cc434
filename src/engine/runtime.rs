// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{Launch, NodeId, RunReport};
use crate::errors::{Result, SuitedagError};
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RunEvent, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates node
/// body execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, arming timeout timers, dispatching launched nodes to the
/// executor and forwarding lifecycle events to an observer.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    /// Handed to timers so they can report back.
    event_tx: mpsc::UnboundedSender<RuntimeEvent>,
    executor: E,
    timers: HashMap<NodeId, JoinHandle<()>>,
    observer: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("armed_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        event_tx: mpsc::UnboundedSender<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            timers: HashMap::new(),
            observer: None,
        }
    }

    /// Forward every [`RunEvent`] to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Main event loop.
    ///
    /// - Starts the run in the core.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them to the core.
    /// - Executes commands returned by the core (launch bodies, timers, ...).
    ///
    /// Returns once the terminal node completed.
    pub async fn run(mut self) -> Result<RunReport> {
        info!("suitedag runtime started");

        let step = self.core.start();
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            if self.core.is_stalled() {
                self.abort_timers();
                return Err(SuitedagError::Stalled(
                    "no node is running or ready but the run has not finished".to_string(),
                ));
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    self.abort_timers();
                    return Err(SuitedagError::ChannelClosed);
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        self.abort_timers();
        info!("runtime exiting");
        Ok(self.core.report())
    }

    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }

        if !step.keep_running {
            info!("core requested exit; stopping runtime");
        }
        Ok(step.keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::ClearTimeout(node) => {
                if let Some(timer) = self.timers.remove(&node) {
                    timer.abort();
                }
            }
            CoreCommand::Emit(event) => self.publish(event),
            CoreCommand::Launch(launches) => self.launch(launches).await?,
            CoreCommand::ArmTimeout { node, after } => self.arm_timeout(node, after),
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn publish(&self, event: RunEvent) {
        let Some(observer) = &self.observer else {
            return;
        };
        if observer.send(event).is_err() {
            debug!("run event observer dropped; event discarded");
        }
    }

    async fn launch(&mut self, launches: Vec<Launch>) -> Result<()> {
        if launches.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = launches.iter().map(|l| l.node).collect();
        debug!(?ids, "launching node bodies");

        self.executor.launch(launches).await
    }

    fn arm_timeout(&mut self, node: NodeId, after: Duration) {
        let tx = self.event_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RuntimeEvent::TimeoutElapsed { node });
        });

        if let Some(previous) = self.timers.insert(node, timer) {
            warn!(node = %node, "timer armed twice; replacing");
            previous.abort();
        }
    }

    fn abort_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}
