// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning bodies
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation in [`super::body`].
//!
//! - `RealExecutorBackend` is the default implementation used by `suitedag`.
//!   It spawns one tokio task per launched node; the task runs the node body
//!   and reports back with `NodeFinished` events.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which nodes were launched and directly emits `NodeFinished` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::Launch;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::body::run_body;

/// Trait abstracting how launched nodes are executed.
pub trait ExecutorBackend: Send {
    /// Start executing the given nodes.
    ///
    /// The implementation must not wait for the bodies to finish; every
    /// completion is reported asynchronously as a `RuntimeEvent`.
    fn launch(
        &mut self,
        launches: Vec<Launch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend reporting to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self { tx: runtime_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn launch(
        &mut self,
        launches: Vec<Launch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            for launch in launches {
                tokio::spawn(run_body(launch, tx.clone()));
            }
            Ok(())
        })
    }
}
