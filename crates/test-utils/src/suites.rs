//! Run a group tree end to end with the real executor.

use tokio::sync::mpsc;
use suitedag::dag::{Group, RunReport, Scheduler};
use suitedag::engine::{CoreRuntime, RunEvent, RunOptions, Runtime, RuntimeEvent};
use suitedag::errors::Result;
use suitedag::exec::RealExecutorBackend;

/// Report of a finished run plus every event it published.
#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
    pub events: Vec<RunEvent>,
}

impl RunOutput {
    pub fn finish_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, RunEvent::Finish(_)))
            .count()
    }
}

/// Compile `root` and run it to completion.
pub async fn run_suite(root: Group, options: RunOptions) -> Result<RunOutput> {
    run_suite_with(root, options, |_| {}).await
}

/// Like [`run_suite`], handing the runtime event sender to `setup` first
/// (e.g. to schedule a bail request).
pub async fn run_suite_with<F>(root: Group, options: RunOptions, setup: F) -> Result<RunOutput>
where
    F: FnOnce(mpsc::UnboundedSender<RuntimeEvent>),
{
    let scheduler = Scheduler::new(root, options)?;

    let (rt_tx, rt_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    setup(rt_tx.clone());

    let executor = RealExecutorBackend::new(rt_tx.clone());
    let runtime = Runtime::new(CoreRuntime::new(scheduler), rt_rx, rt_tx, executor)
        .with_observer(event_tx);

    let report = runtime.run().await?;

    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event);
    }

    Ok(RunOutput { report, events })
}
