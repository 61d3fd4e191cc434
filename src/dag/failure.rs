// src/dag/failure.rs

//! Failure records attached to nodes that did not succeed.
//!
//! Every failure mode a node body can produce (returned error, panic,
//! callback invoked with an error or a non-error value, timeout, upstream
//! hook failure) ends up as a [`Failure`]. A failure may carry nested causes,
//! which is how a late failure arriving after a timeout is reported.

use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Prefix used when a completion callback is invoked with a non-error value.
pub const NON_ERROR_PREFIX: &str = "done() invoked with non-error: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    message: String,
    causes: Vec<Failure>,
    detail: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            detail: None,
        }
    }

    /// Attach a context payload (error chain, stderr tail, ...) for reporting.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Wrap an arbitrary non-error value, prefixing its debug rendering.
    pub fn from_value<T: fmt::Debug + ?Sized>(prefix: &str, value: &T) -> Self {
        Self::new(format!("{prefix}{value:?}"))
    }

    /// Convert a panic payload caught at the node fault boundary.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return Self::new(*msg).with_detail("panicked");
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return Self::new(msg.clone()).with_detail("panicked");
        }
        Self::new("panicked with a non-string payload")
    }

    pub fn add_cause(&mut self, cause: Failure) {
        self.causes.push(cause);
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[Failure] {
        &self.causes
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Failure>() {
            Ok(failure) => failure,
            Err(err) => Failure::new(err.to_string()).with_detail(format!("{err:?}")),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

/// Human readable rendering of a duration: `1ms`, `3s`, `2m`, `1h`, `4d`.
pub fn format_ms(duration: Duration) -> String {
    const SECOND: f64 = 1000.0;
    const MINUTE: f64 = SECOND * 60.0;
    const HOUR: f64 = MINUTE * 60.0;
    const DAY: f64 = HOUR * 24.0;

    let ms = duration.as_millis() as f64;
    if ms >= DAY {
        format!("{}d", (ms / DAY).round())
    } else if ms >= HOUR {
        format!("{}h", (ms / HOUR).round())
    } else if ms >= MINUTE {
        format!("{}m", (ms / MINUTE).round())
    } else if ms >= SECOND {
        format!("{}s", (ms / SECOND).round())
    } else {
        format!("{ms}ms")
    }
}
