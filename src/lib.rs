// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{BuildOptions, config_root_dir, load_and_validate};
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunEvent, Runtime, RuntimeEvent};
use crate::errors::SuitedagError;
use crate::exec::RealExecutorBackend;
use crate::report::ListReporter;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - suite file loading
/// - scheduler / runtime
/// - executor
/// - list reporter
/// - Ctrl-C handling (bails out of the run)
///
/// Returns whether every test passed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let suite = load_and_validate(&config_path)
        .with_context(|| format!("loading suite file {}", config_path.display()))?;

    let grep = args
        .grep
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(SuitedagError::from)?;

    let build = BuildOptions {
        root_dir: Some(config_root_dir(&config_path)),
        grep,
    };
    let options = suite.run_options(args.concurrency);
    let root = suite.to_group(&build);

    let scheduler = Scheduler::new(root, options)?;

    if args.dry_run {
        println!("{}", report::dot::render(scheduler.graph()));
        debug!("dry-run complete (no execution)");
        return Ok(true);
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let executor = RealExecutorBackend::new(rt_tx.clone());

    // Ctrl-C → bail.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::BailRequested);
        });
    }

    // Reporter prints as events arrive.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let reporter = tokio::spawn(async move {
        let mut list = ListReporter::new();
        println!();
        while let Some(event) = event_rx.recv().await {
            if let Some(line) = list.line(&event) {
                println!("{line}");
            }
        }
    });

    info!(options = ?options, "starting suite");

    let core = CoreRuntime::new(scheduler);
    let runtime = Runtime::new(core, rt_rx, rt_tx, executor).with_observer(event_tx);
    let outcome = runtime.run().await?;

    // The observer sender went away with the runtime; drain the reporter.
    let _ = reporter.await;

    print!("{}", report::epilogue(&outcome));
    Ok(outcome.is_success())
}
