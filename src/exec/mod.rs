// src/exec/mod.rs

//! Body execution layer.
//!
//! - [`body`] defines what a node runs and the fault boundary around it.
//! - [`command`] runs shell-command bodies with `tokio::process::Command`.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod body;
pub mod command;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use body::{Body, BodyFuture, CommandSpec, Done, run_body};
