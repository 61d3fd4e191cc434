// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Concurrency constraint carried by nodes and groups.
///
/// - `None`: may run alongside any sibling that is also `None`.
/// - `Local`: serialised against sibling nodes of the same group.
/// - `Global`: serialised against every other node in the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exclusivity {
    #[default]
    None,
    Local,
    Global,
}

impl FromStr for Exclusivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Exclusivity::None),
            "local" => Ok(Exclusivity::Local),
            "global" => Ok(Exclusivity::Global),
            other => Err(format!(
                "invalid exclusivity: {other} (expected \"none\", \"local\" or \"global\")"
            )),
        }
    }
}

impl fmt::Display for Exclusivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Exclusivity::None => "none",
            Exclusivity::Local => "local",
            Exclusivity::Global => "global",
        };
        f.write_str(s)
    }
}
