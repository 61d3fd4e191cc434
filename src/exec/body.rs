// src/exec/body.rs

//! Node bodies and the fault boundary they run inside.
//!
//! Every body runs on its own tokio task. Whatever happens in there (an
//! `Err` return, a panic, a callback invoked once, several times or with a
//! non-error value) is turned into `NodeFinished` events for the runtime.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::debug;

use crate::dag::failure::NON_ERROR_PREFIX;
use crate::dag::{Context, Failure, Launch, NodeId};
use crate::engine::{NodeOutcome, RuntimeEvent};

use super::command::run_command;

pub type BodyFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type SyncFn = dyn Fn(&Context) -> anyhow::Result<()> + Send + Sync;
type AsyncFn = dyn Fn(Context) -> BodyFuture + Send + Sync;
type CallbackFn = dyn Fn(Context, Done) + Send + Sync;

/// Shell command run as a node body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: String,
    pub cwd: Option<PathBuf>,
}

/// What a node does when it runs.
#[derive(Clone)]
pub enum Body {
    /// Completes immediately with success.
    Noop,
    /// Runs to completion on a blocking thread.
    Sync(Arc<SyncFn>),
    /// Returns a future; its output completes the node.
    Async(Arc<AsyncFn>),
    /// Completes whenever the [`Done`] handle is invoked.
    Callback(Arc<CallbackFn>),
    Command(CommandSpec),
}

impl Body {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Body::Sync(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Body::Async(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Context, Done) + Send + Sync + 'static,
    {
        Body::Callback(Arc::new(f))
    }

    pub fn command(cmd: impl Into<String>) -> Self {
        Body::Command(CommandSpec {
            cmd: cmd.into(),
            cwd: None,
        })
    }

    pub fn command_in(cmd: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Body::Command(CommandSpec {
            cmd: cmd.into(),
            cwd: Some(cwd.into()),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Body::Noop => "noop",
            Body::Sync(_) => "sync",
            Body::Async(_) => "async",
            Body::Callback(_) => "callback",
            Body::Command(_) => "command",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Command(spec) => f.debug_tuple("Command").field(spec).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Completion handle passed to callback bodies.
///
/// Cheap to clone and usable from any thread or task. Every invocation is
/// reported; the scheduler decides what a repeated one means.
#[derive(Clone)]
pub struct Done {
    node: NodeId,
    tx: mpsc::UnboundedSender<RuntimeEvent>,
}

impl Done {
    pub fn new(node: NodeId, tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self { node, tx }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn ok(&self) {
        self.send(NodeOutcome::Success);
    }

    pub fn fail(&self, err: impl Into<anyhow::Error>) {
        self.send(NodeOutcome::Failed(Failure::from(err.into())));
    }

    /// Fail with something that is not an error type.
    pub fn fail_with_value<T: fmt::Debug + ?Sized>(&self, value: &T) {
        self.send(NodeOutcome::Failed(Failure::from_value(NON_ERROR_PREFIX, value)));
    }

    pub fn finish(&self, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.ok(),
            Err(err) => self.fail(err),
        }
    }

    fn send(&self, outcome: NodeOutcome) {
        let event = RuntimeEvent::NodeFinished {
            node: self.node,
            outcome,
        };
        if self.tx.send(event).is_err() {
            debug!(node = %self.node, "runtime gone; completion dropped");
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").field("node", &self.node).finish()
    }
}

/// Run a launched node's body and report its completion.
pub async fn run_body(launch: Launch, tx: mpsc::UnboundedSender<RuntimeEvent>) {
    let Launch {
        node,
        title,
        body,
        context,
        ..
    } = launch;

    debug!(node = %node, title = %title, kind = body.kind(), "running node body");

    let done = Done::new(node, tx);
    let rejected_future = matches!(body, Body::Async(_));

    let joined: std::result::Result<anyhow::Result<()>, JoinError> = match body {
        Body::Noop => Ok(Ok(())),
        Body::Sync(f) => tokio::task::spawn_blocking(move || f(&context)).await,
        Body::Async(f) => tokio::spawn(async move { f(context).await }).await,
        Body::Callback(f) => {
            let handle = done.clone();
            match tokio::task::spawn_blocking(move || f(context, handle)).await {
                // The body reports through its handle.
                Ok(()) => return,
                Err(err) => Err(err),
            }
        }
        Body::Command(spec) => tokio::spawn(run_command(spec, title)).await,
    };

    let outcome = match joined {
        Ok(Ok(())) => NodeOutcome::Success,
        Ok(Err(err)) => {
            let failure = Failure::from(err);
            if rejected_future && failure.message().is_empty() {
                NodeOutcome::Failed(Failure::new("future rejected with no rejection reason"))
            } else {
                NodeOutcome::Failed(failure)
            }
        }
        Err(err) if err.is_panic() => NodeOutcome::Failed(Failure::from_panic(err.into_panic())),
        Err(err) => NodeOutcome::Failed(Failure::new(format!("body task cancelled: {err}"))),
    };

    done.send(outcome);
}
