use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use suitedag::dag::{Failure, Launch};
use suitedag::engine::{NodeOutcome, RuntimeEvent};
use suitedag::errors::Result;
use suitedag::exec::ExecutorBackend;

/// A fake executor that:
/// - records the title of every launched node, in launch order
/// - never runs bodies
/// - immediately reports completion: failure for titles registered with
///   [`FakeExecutor::failing`], success otherwise.
pub struct FakeExecutor {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    launched: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
        launched: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            launched,
            failing: HashSet::new(),
        }
    }

    /// Report failure for nodes with this full (space separated) title.
    pub fn failing(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn launch(
        &mut self,
        launches: Vec<Launch>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let launched = Arc::clone(&self.launched);
        let failing = self.failing.clone();

        Box::pin(async move {
            for l in launches {
                launched.lock().unwrap().push(l.title.clone());

                let outcome = if failing.contains(&l.title) {
                    NodeOutcome::Failed(Failure::new(format!("{} failed", l.title)))
                } else {
                    NodeOutcome::Success
                };

                tx.send(RuntimeEvent::NodeFinished {
                    node: l.node,
                    outcome,
                })
                .map_err(|e| anyhow::anyhow!("runtime channel closed: {e}"))?;
            }
            Ok(())
        })
    }
}
