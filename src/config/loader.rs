// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSuiteFile, SuiteFile};
use crate::errors::Result;

/// Load a suite file from a given path and return the raw `RawSuiteFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSuiteFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let suite: RawSuiteFile = toml::from_str(&contents)?;

    Ok(suite)
}

/// Load a suite file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks that there is something to run and that every entry has what it
///   needs (titles, commands).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SuiteFile> {
    let raw = load_from_path(&path)?;
    let suite = SuiteFile::try_from(raw)?;
    Ok(suite)
}

/// Default suite file: `Suitedag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Suitedag.toml")
}

/// Directory commands run in: the suite file's directory, or the current
/// working directory for a bare file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
