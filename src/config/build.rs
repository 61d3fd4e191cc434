// src/config/build.rs

//! Turn a validated [`SuiteFile`] into the group tree and options of a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::config::model::{GroupSpec, SuiteFile, TestSpec};
use crate::dag::{Group, Node};
use crate::engine::RunOptions;
use crate::exec::Body;

/// Inputs to [`SuiteFile::to_group`] that do not come from the file itself.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Working directory for commands.
    pub root_dir: Option<PathBuf>,
    /// Select tests whose full title matches; everything else is skipped.
    pub grep: Option<Regex>,
}

impl SuiteFile {
    /// Run options from `[config]`, with `concurrency` optionally overridden.
    pub fn run_options(&self, concurrency: Option<usize>) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            concurrency: concurrency.or(self.config.concurrency),
            default_timeout: self
                .config
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            test_exclusivity: self
                .config
                .test_exclusivity
                .unwrap_or(defaults.test_exclusivity),
        }
    }

    /// Build the root group of the run.
    pub fn to_group(&self, opts: &BuildOptions) -> Group {
        let root = match &self.suite.title {
            Some(title) => Group::new(title.as_str()),
            None => Group::root(),
        };
        let root = configure(root, &self.suite);
        let mut path = Vec::new();
        if let Some(title) = &self.suite.title {
            path.push(title.as_str());
        }
        populate(root, &self.suite, &mut path, opts)
    }
}

fn configure(mut group: Group, spec: &GroupSpec) -> Group {
    group = group
        .with_only(spec.only)
        .with_skip(spec.skip)
        .with_exclusivity(spec.exclusivity);
    if let Some(ms) = spec.timeout_ms {
        group = group.with_timeout(Duration::from_millis(ms));
    }
    if let Some(excl) = spec.test_exclusivity {
        group = group.with_test_exclusivity(excl);
    }
    group
}

fn populate<'a>(
    mut group: Group,
    spec: &'a GroupSpec,
    path: &mut Vec<&'a str>,
    opts: &BuildOptions,
) -> Group {
    let hooks = [
        (&spec.before_all, "Before all hook"),
        (&spec.before_each, "Before each hook"),
        (&spec.after_each, "After each hook"),
        (&spec.after_all, "After all hook"),
    ];
    for (idx, (entries, default_title)) in hooks.into_iter().enumerate() {
        for (n, entry) in entries.iter().enumerate() {
            let title = entry
                .title
                .clone()
                .unwrap_or_else(|| format!("{default_title} {}", n + 1));
            let hook = node(title, entry, opts);
            match idx {
                0 => group.add_before_all(hook),
                1 => group.add_before_each(hook),
                2 => group.add_after_each(hook),
                _ => group.add_after_all(hook),
            };
        }
    }

    for entry in &spec.test {
        let title = entry.title.clone().unwrap_or_default();
        let mut test = node(title.clone(), entry, opts);

        if let Some(grep) = &opts.grep {
            let full_title = path
                .iter()
                .copied()
                .chain(std::iter::once(title.as_str()))
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if grep.is_match(&full_title) {
                debug!(test = %full_title, "selected by --grep");
                test = test.with_only(true);
            }
        }

        group.add_test(test);
    }

    for child in &spec.group {
        let title = child.title.as_deref().unwrap_or("");
        path.push(title);
        let built = populate(configure(Group::new(title), child), child, path, opts);
        path.pop();
        group.add_group(built);
    }

    group
}

fn node(title: String, entry: &TestSpec, opts: &BuildOptions) -> Node {
    let mut node = match &entry.cmd {
        Some(cmd) => Node::test(title, command_body(cmd, opts.root_dir.as_deref())),
        None => Node::pending(title),
    };

    node = node.with_only(entry.only);
    if entry.skip {
        node = node.with_skip(true);
    }
    if let Some(ms) = entry.timeout_ms {
        node = node.with_timeout(Duration::from_millis(ms));
    }
    if let Some(excl) = entry.exclusivity {
        node = node.with_exclusivity(excl);
    }
    node
}

fn command_body(cmd: &str, root_dir: Option<&Path>) -> Body {
    match root_dir {
        Some(dir) => Body::command_in(cmd, dir),
        None => Body::command(cmd),
    }
}
