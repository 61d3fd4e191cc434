// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Failures of individual test bodies are not errors of the engine; they are
//! recorded on the node as a [`crate::dag::Failure`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuitedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Cycle detected in test graph: {0}")]
    GraphCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Runtime stalled: {0}")]
    Stalled(String),

    #[error("Runtime event channel closed before the run finished")]
    ChannelClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SuitedagError>;
