// src/config/model.rs

use serde::Deserialize;

use crate::types::Exclusivity;

/// Top-level suite file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// concurrency = 4
/// timeout_ms = 5000
/// test_exclusivity = "none"
///
/// [suite]
/// title = "api"
///
/// [[suite.before_all]]
/// cmd = "./scripts/start-db.sh"
///
/// [[suite.test]]
/// title = "migrations apply"
/// cmd = "cargo run --bin migrate"
///
/// [[suite.group]]
/// title = "users"
/// exclusivity = "local"
///
/// [[suite.group.test]]
/// title = "create"
/// cmd = "./scripts/users.sh create"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSuiteFile {
    /// Run-wide options from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// The root group from `[suite]`.
    #[serde(default)]
    pub suite: GroupSpec,
}

/// Validated suite file. Only constructible through `TryFrom<RawSuiteFile>`.
#[derive(Debug, Clone)]
pub struct SuiteFile {
    pub config: ConfigSection,
    pub suite: GroupSpec,
}

impl SuiteFile {
    pub(crate) fn new_unchecked(config: ConfigSection, suite: GroupSpec) -> Self {
        Self { config, suite }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Maximum number of nodes running at once; unset or 0 is unbounded.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Timeout applied to every node that does not set one. 0 disables it.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Exclusivity of nodes that do not set one; defaults to `"local"`.
    #[serde(default)]
    pub test_exclusivity: Option<Exclusivity>,
}

/// A group: `[suite]` itself or any nested `[[...group]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub only: bool,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// How the group as a whole runs next to its siblings.
    #[serde(default)]
    pub exclusivity: Exclusivity,

    /// Default exclusivity for nodes in this group and below.
    #[serde(default)]
    pub test_exclusivity: Option<Exclusivity>,

    #[serde(default)]
    pub group: Vec<GroupSpec>,

    #[serde(default)]
    pub test: Vec<TestSpec>,

    #[serde(default)]
    pub before_all: Vec<TestSpec>,

    #[serde(default)]
    pub before_each: Vec<TestSpec>,

    #[serde(default)]
    pub after_each: Vec<TestSpec>,

    #[serde(default)]
    pub after_all: Vec<TestSpec>,
}

impl GroupSpec {
    /// Number of tests declared in this group and all nested groups.
    pub fn test_count(&self) -> usize {
        self.test.len() + self.group.iter().map(GroupSpec::test_count).sum::<usize>()
    }
}

/// A test or hook entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    /// Required for tests; hooks get a numbered default.
    #[serde(default)]
    pub title: Option<String>,

    /// Shell command to run. A test without one must be marked `skip`.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub only: bool,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub exclusivity: Option<Exclusivity>,
}
