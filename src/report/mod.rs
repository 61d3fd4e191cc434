// src/report/mod.rs

//! Human-facing output of a run.
//!
//! - [`summary`] prints a line per finished test and the closing epilogue.
//! - [`dot`] renders the compiled dependency graph for `--dry-run`.

pub mod dot;
pub mod summary;

pub use summary::{ListReporter, epilogue};
