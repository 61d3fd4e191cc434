// src/dag/node.rs

//! The atomic unit of work: a test, a hook, or a structural root marker.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::dag::failure::{Failure, format_ms};
use crate::dag::group::GroupId;
use crate::exec::Body;
use crate::types::Exclusivity;

/// Sequence id assigned when a node is registered with the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Normal,
    BeforeEach,
    AfterEach,
    BeforeAll,
    AfterAll,
    /// Structural marker (run entry/exit, exclusivity barriers).
    Root,
}

/// Per-node run state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Waiting,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeResult {
    Success,
    Failure,
    Timeout,
    HookFailure,
    Skipped,
}

impl NodeResult {
    /// Results that count as a failure in the run statistics.
    pub fn is_failing(self) -> bool {
        matches!(
            self,
            NodeResult::Failure | NodeResult::Timeout | NodeResult::HookFailure
        )
    }

    /// Results of a dependency that cascade into a hook failure.
    pub fn fails_dependents(self) -> bool {
        matches!(self, NodeResult::Failure | NodeResult::Timeout)
    }
}

/// Outcome recorded before a late completion overwrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousOutcome {
    pub result: Option<NodeResult>,
    pub failure: Option<Failure>,
    pub duration: Option<Duration>,
}

/// What a call to [`Node::complete`] amounted to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    /// First completion: the node just reached `Completed`.
    First,
    /// A reconciled late completion; carries the outcome it replaced.
    Late(PreviousOutcome),
    /// Dropped entirely. Carries the error that was discarded, if any.
    Ignored(Option<Failure>),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: Option<NodeId>,
    pub(crate) title: String,
    pub(crate) kind: NodeKind,
    pub(crate) body: Option<Body>,
    pub(crate) exclusivity: Option<Exclusivity>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) only: bool,
    pub(crate) skip: bool,

    /// Group the node was compiled into.
    pub(crate) group: Option<GroupId>,
    /// Group that declared the node, when it differs (cloned hooks).
    pub(crate) origin: Option<GroupId>,

    pub(crate) priors: Vec<NodeId>,
    pub(crate) nexts: Vec<NodeId>,
    pub(crate) completed_priors: usize,
    /// Nodes whose failure fails this one with a hook failure.
    pub(crate) dependencies: Vec<NodeId>,

    pub(crate) state: RunState,
    pub(crate) result: Option<NodeResult>,
    pub(crate) failure: Option<Failure>,
    pub(crate) started_at: Option<Instant>,
    pub(crate) duration: Option<Duration>,
    pub(crate) tick_start: Option<u64>,
    pub(crate) tick_end: Option<u64>,
    pub(crate) completed_number: Option<usize>,
    pub(crate) failure_number: Option<usize>,
    late_reconciled: bool,
}

impl Node {
    fn with_kind(title: impl Into<String>, body: Option<Body>, kind: NodeKind) -> Self {
        let skip = body.is_none();
        Self {
            id: None,
            title: title.into(),
            kind,
            body,
            exclusivity: None,
            timeout: None,
            only: false,
            skip,
            group: None,
            origin: None,
            priors: Vec::new(),
            nexts: Vec::new(),
            completed_priors: 0,
            dependencies: Vec::new(),
            state: RunState::Waiting,
            result: None,
            failure: None,
            started_at: None,
            duration: None,
            tick_start: None,
            tick_end: None,
            completed_number: None,
            failure_number: None,
            late_reconciled: false,
        }
    }

    pub fn test(title: impl Into<String>, body: Body) -> Self {
        Self::with_kind(title, Some(body), NodeKind::Normal)
    }

    /// A test declared without a body; it is always skipped.
    pub fn pending(title: impl Into<String>) -> Self {
        Self::with_kind(title, None, NodeKind::Normal)
    }

    pub fn before_all(title: impl Into<String>, body: Body) -> Self {
        Self::with_kind(title, Some(body), NodeKind::BeforeAll)
    }

    pub fn after_all(title: impl Into<String>, body: Body) -> Self {
        Self::with_kind(title, Some(body), NodeKind::AfterAll)
    }

    pub fn before_each(title: impl Into<String>, body: Body) -> Self {
        Self::with_kind(title, Some(body), NodeKind::BeforeEach)
    }

    pub fn after_each(title: impl Into<String>, body: Body) -> Self {
        Self::with_kind(title, Some(body), NodeKind::AfterEach)
    }

    pub(crate) fn root(title: impl Into<String>) -> Self {
        Self::with_kind(title, Some(Body::Noop), NodeKind::Root)
    }

    pub fn with_only(mut self, only: bool) -> Self {
        self.only = only;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Timeout budget; a zero duration disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_exclusivity(mut self, exclusivity: Exclusivity) -> Self {
        self.exclusivity = Some(exclusivity);
        self
    }

    pub fn globally_exclusive(self) -> Self {
        self.with_exclusivity(Exclusivity::Global)
    }

    pub fn locally_exclusive(self) -> Self {
        self.with_exclusivity(Exclusivity::Local)
    }

    pub fn non_exclusive(self) -> Self {
        self.with_exclusivity(Exclusivity::None)
    }

    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Declared exclusivity; nodes left unset behave as locally exclusive.
    pub fn exclusivity(&self) -> Exclusivity {
        self.exclusivity.unwrap_or(Exclusivity::Local)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn priors(&self) -> &[NodeId] {
        &self.priors
    }

    pub fn nexts(&self) -> &[NodeId] {
        &self.nexts
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn result(&self) -> Option<NodeResult> {
        self.result
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Ready once every prior edge has reported its first completion.
    pub fn is_ready(&self) -> bool {
        self.completed_priors == self.priors.len()
    }

    /// Copy of a hook template for a test container.
    ///
    /// Keeps title, body, flags, exclusivity, kind and declaring group, but
    /// none of the graph or run state.
    pub(crate) fn clone_hook(&self) -> Node {
        let mut hook = Node::with_kind(self.title.clone(), self.body.clone(), self.kind);
        hook.skip = self.skip;
        hook.only = self.only;
        hook.timeout = self.timeout;
        hook.exclusivity = self.exclusivity;
        hook.origin = self.origin;
        hook
    }

    pub(crate) fn add_dependencies(&mut self, deps: &[NodeId]) {
        for dep in deps {
            if !self.dependencies.contains(dep) {
                self.dependencies.push(*dep);
            }
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = RunState::Running;
    }

    /// Record a completion signal.
    ///
    /// The first call moves the node to `Completed`. Later calls are late
    /// completions: a failure is sticky, a timeout accepts exactly one late
    /// completion (rewriting the message to report the eventual outcome),
    /// anything else becomes a "called multiple times" failure. At most one
    /// late completion is ever reconciled.
    pub(crate) fn complete(
        &mut self,
        error: Option<Failure>,
        result: Option<NodeResult>,
        now: Instant,
    ) -> Completion {
        let duration = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        let mut error = error;
        let mut result = result;
        let mut previous = None;

        if self.state == RunState::Completed {
            if self.late_reconciled || self.result == Some(NodeResult::Failure) {
                return Completion::Ignored(error);
            }

            self.late_reconciled = true;
            previous = Some(PreviousOutcome {
                result: self.result,
                failure: self.failure.clone(),
                duration: self.duration,
            });

            if self.result == Some(NodeResult::Timeout) {
                let budget = format_ms(self.timeout.unwrap_or_default());
                let elapsed = format_ms(duration);
                error = Some(match error {
                    None => Failure::new(format!(
                        "Timeout of {budget} exceeded, eventually succeeded after {elapsed}"
                    )),
                    Some(late) => {
                        let mut failure = Failure::new(format!(
                            "Timeout of {budget} exceeded, eventually failed after {elapsed}"
                        ));
                        failure.add_cause(late);
                        failure
                    }
                });
                result = Some(NodeResult::Timeout);
            } else {
                error = Some(Failure::new("done() called multiple times"));
            }
        }

        let result = match error {
            Some(failure) => {
                self.failure = Some(failure);
                result.unwrap_or(NodeResult::Failure)
            }
            None => result.unwrap_or(NodeResult::Success),
        };

        self.result = Some(result);
        self.state = RunState::Completed;
        self.duration = Some(duration);

        match previous {
            Some(previous) => Completion::Late(previous),
            None => Completion::First,
        }
    }
}
