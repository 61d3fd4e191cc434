// src/report/summary.rs

//! Plain-text run output: one line per finished test and a closing epilogue.

use std::fmt::Write as _;

use crate::dag::{Failure, NodeKind, NodeResult, NodeSnapshot, RunReport, format_ms};
use crate::engine::RunEvent;

const OK: &str = "✓";
const ERROR: &str = "✖";

/// Turns run events into list lines as they arrive.
#[derive(Debug, Default)]
pub struct ListReporter {
    failed: usize,
}

impl ListReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line to print for `event`, if any.
    ///
    /// Hooks only show up when they fail on their own; a hook failing
    /// because of an upstream hook stays quiet.
    pub fn line(&mut self, event: &RunEvent) -> Option<String> {
        let RunEvent::TestFinish { node, .. } = event else {
            return None;
        };

        let normal = node.kind == NodeKind::Normal;
        match node.result? {
            NodeResult::HookFailure if !normal => None,
            NodeResult::Failure | NodeResult::Timeout | NodeResult::HookFailure => {
                self.failed += 1;
                let message = node.failure.as_ref().map(Failure::message).unwrap_or("");
                Some(format!(
                    "  {}) {}\n       {}",
                    self.failed, node.full_title, message
                ))
            }
            NodeResult::Skipped if normal => Some(format!("  - {}", node.full_title)),
            NodeResult::Success if normal => Some(format!(
                "  {OK} {}: {}ms",
                node.full_title,
                node.duration.unwrap_or_default().as_millis()
            )),
            _ => None,
        }
    }
}

fn pluralize(n: usize) -> &'static str {
    if n == 1 { "test" } else { "tests" }
}

/// Totals plus the numbered failure listing.
pub fn epilogue(report: &RunReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "    {} of {} {} succeeded ({})",
        stats.passes,
        stats.tests,
        pluralize(stats.passes),
        format_ms(stats.duration.unwrap_or_default())
    );

    if stats.skipped > 0 {
        let _ = writeln!(out, "    {} {} skipped", stats.skipped, pluralize(stats.skipped));
    }

    let _ = writeln!(
        out,
        "    {} max concurrent {}",
        stats.max_concurrency,
        pluralize(stats.max_concurrency)
    );

    if stats.failures > 0 {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {ERROR} {} {} failed",
            stats.failures,
            pluralize(stats.failures)
        );
        out.push_str(&list_failures(&report.failures));
    }

    out
}

/// Every failure with its ordinal, message, detail and nested causes.
pub fn list_failures(failures: &[NodeSnapshot]) -> String {
    let mut out = String::new();

    for (i, node) in failures.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {}) {}:",
            node.failure_number.unwrap_or(i + 1),
            node.full_title
        );

        if let Some(failure) = &node.failure {
            print_failure(&mut out, failure);
            for cause in failure.causes() {
                let _ = writeln!(out);
                print_failure(&mut out, cause);
            }
        }
    }

    out
}

fn print_failure(out: &mut String, failure: &Failure) {
    let _ = writeln!(out, "     {}", failure.message());
    if let Some(detail) = failure.detail() {
        for line in detail.lines() {
            let _ = writeln!(out, "   {line}");
        }
    }
}
