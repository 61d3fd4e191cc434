// src/config/mod.rs

//! Suite file loading and validation for suitedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a suite file from disk (`loader.rs`).
//! - Validate it (`validate.rs`).
//! - Turn it into a [`crate::dag::Group`] tree and run options (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::BuildOptions;
pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, GroupSpec, RawSuiteFile, SuiteFile, TestSpec};
