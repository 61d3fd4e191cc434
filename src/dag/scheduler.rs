// src/dag/scheduler.rs

use std::collections::VecDeque;
use std::time::SystemTime;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::failure::{Failure, format_ms};
use crate::dag::graph::{NodeSnapshot, TestGraph};
use crate::dag::group::Group;
use crate::dag::node::{Completion, NodeId, NodeKind, NodeResult, PreviousOutcome, RunState};
use crate::dag::scheduler_step::{Launch, SchedulerStep};
use crate::dag::stats::{RunReport, RunStats};
use crate::engine::{NodeOutcome, RunEvent, RunOptions};
use crate::errors::{Result, SuitedagError};
use crate::exec::Body;
use crate::types::Exclusivity;

/// Scheduler holds the compiled graph plus mutable per-run state.
///
/// It is responsible for:
/// - admitting ready nodes while the concurrency ceiling allows
/// - short-circuiting nodes whose hook dependencies failed
/// - recording completions (including late ones) and tallying statistics
/// - releasing dependents once all of their priors completed
/// - the bail path, which drains every waiting node and forces the
///   terminal node so the run always finishes
///
/// It never spawns or awaits anything: callers feed it events and execute
/// the [`SchedulerStep`] it returns.
#[derive(Debug)]
pub struct Scheduler {
    graph: TestGraph,
    options: RunOptions,
    ready: VecDeque<NodeId>,
    /// Terminal node forced in by the bail path.
    forced: Option<NodeId>,
    running: usize,
    tick: u64,
    started: bool,
    bailing: bool,
    finished: bool,
    stats: RunStats,
    failures: Vec<NodeId>,
    started_at: Option<Instant>,
    first: NodeId,
    last: NodeId,
}

impl Scheduler {
    /// Compile `root` and prepare a run over it.
    ///
    /// The root is always globally exclusive so the run has a single entry
    /// node and a single terminal node. The run-wide timeout and test
    /// exclusivity from `options` apply wherever the root leaves them unset.
    pub fn new(mut root: Group, options: RunOptions) -> Result<Self> {
        root.set_exclusivity(Exclusivity::Global);
        root.set_timeout_default(options.default_timeout);
        root.set_test_exclusivity_default(options.test_exclusivity);

        let mut graph = TestGraph::new();
        root.compile(&mut graph);
        graph.ensure_acyclic()?;

        let (Some(first), Some(last)) = (graph.first(), graph.last()) else {
            return Err(SuitedagError::ConfigError(
                "compiled test graph is empty".to_string(),
            ));
        };

        let stats = RunStats {
            groups: graph.groups().filter(|(_, g)| !g.test_container).count(),
            tests: graph.nodes().filter(|n| n.kind != NodeKind::Root).count(),
            ..RunStats::default()
        };

        debug!(
            nodes = graph.len(),
            tests = stats.tests,
            groups = stats.groups,
            "scheduler: compiled test graph"
        );

        Ok(Self {
            graph,
            options,
            ready: VecDeque::new(),
            forced: None,
            running: 0,
            tick: 0,
            started: false,
            bailing: false,
            finished: false,
            stats,
            failures: Vec::new(),
            started_at: None,
            first,
            last,
        })
    }

    pub fn graph(&self) -> &TestGraph {
        &self.graph
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn first(&self) -> NodeId {
        self.first
    }

    pub fn last(&self) -> NodeId {
        self.last
    }

    /// Number of admitted nodes that have not completed yet.
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_bailing(&self) -> bool {
        self.bailing
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True when nothing can make progress without an outside event.
    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.ready.is_empty() && self.forced.is_none()
    }

    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        self.graph.snapshot(id)
    }

    /// Failed nodes in the order their failure ordinals were assigned.
    pub fn failures(&self) -> Vec<NodeSnapshot> {
        self.failures.iter().map(|id| self.graph.snapshot(*id)).collect()
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            stats: self.stats.clone(),
            failures: self.failures(),
            nodes: self.graph.node_ids().map(|id| self.graph.snapshot(id)).collect(),
        }
    }

    /// Record the start of the run and admit the entry node.
    pub fn start(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.started {
            warn!("scheduler: start called twice; ignoring");
            return step;
        }

        self.started = true;
        self.started_at = Some(Instant::now());
        self.stats.start_time = Some(SystemTime::now());
        info!(tests = self.stats.tests, "scheduler: starting run");

        step.events.push(RunEvent::Start);
        self.ready.push_back(self.first);
        self.dispatch(&mut step);
        step
    }

    /// A node body reported an outcome.
    pub fn handle_completion(&mut self, node: NodeId, outcome: NodeOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.graph.get(node).is_none() {
            warn!(node = %node, "completion for unknown node; ignoring");
            return step;
        }

        let error = match outcome {
            NodeOutcome::Success => None,
            NodeOutcome::Failed(failure) => Some(failure),
        };

        self.complete(node, error, None, &mut step);
        self.dispatch(&mut step);
        step
    }

    /// The timeout armed for `node` elapsed.
    ///
    /// Ignored unless the node is still running: a completion that won the
    /// race already cleared it.
    pub fn handle_timeout(&mut self, node: NodeId) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let Some(n) = self.graph.get(node) else {
            return step;
        };

        if n.state != RunState::Running {
            debug!(node = %node, "stale timeout; ignoring");
            return step;
        }

        let budget = format_ms(n.timeout().unwrap_or_default());
        let failure = Failure::new(format!("Timeout of {budget} exceeded"));
        self.complete(node, Some(failure), Some(NodeResult::Timeout), &mut step);
        self.dispatch(&mut step);
        step
    }

    /// Cancel the run.
    ///
    /// Every waiting node is completed without running (markers as success,
    /// everything else as skipped) and the terminal node is forced in so the
    /// run still finishes. Running nodes are left to complete on their own.
    pub fn bail(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.bailing || self.finished {
            return step;
        }

        self.bailing = true;
        self.ready.clear();

        let waiting: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|n| n.state == RunState::Waiting)
            .filter_map(|n| n.id)
            .filter(|id| *id != self.last)
            .collect();

        warn!(waiting = waiting.len(), running = self.running, "bailing out of run");

        for id in waiting {
            let result = if self.graph.node(id).kind == NodeKind::Root {
                NodeResult::Success
            } else {
                NodeResult::Skipped
            };
            self.complete(id, None, Some(result), &mut step);
        }

        self.ready.clear();
        if self.graph.node(self.last).state == RunState::Waiting {
            self.forced = Some(self.last);
        }

        self.dispatch(&mut step);
        step
    }

    fn has_capacity(&self) -> bool {
        match self.options.concurrency {
            None | Some(0) => true,
            Some(limit) => self.running < limit,
        }
    }

    /// Admission loop: drain the ready queue as far as the ceiling allows.
    fn dispatch(&mut self, step: &mut SchedulerStep) {
        if let Some(id) = self.forced.take() {
            if self.graph.node(id).state == RunState::Waiting {
                debug!(node = %id, "admitting forced terminal node");
                self.admit(id, step);
            }
        }

        while self.has_capacity() {
            let Some(id) = self.ready.pop_front() else {
                break;
            };

            let node = self.graph.node(id);
            if node.state != RunState::Waiting || !node.is_ready() {
                continue;
            }

            self.admit(id, step);
        }
    }

    fn admit(&mut self, id: NodeId, step: &mut SchedulerStep) {
        self.tick += 1;
        self.running += 1;
        self.stats.max_concurrency = self.stats.max_concurrency.max(self.running);

        let tick = self.tick;
        self.graph.node_mut(id).tick_start = Some(tick);
        debug!(node = %id, tick, running = self.running, "admitted node");

        self.begin(id, step);
    }

    fn begin(&mut self, id: NodeId, step: &mut SchedulerStep) {
        let failed_dependency = self
            .graph
            .node(id)
            .dependencies
            .iter()
            .copied()
            .find(|dep| {
                self.graph
                    .node(*dep)
                    .result
                    .is_some_and(NodeResult::fails_dependents)
            });

        if let Some(dep) = failed_dependency {
            let failure = Failure::new(format!(
                "{} dependency failed",
                self.graph.full_title(dep, "/")
            ));
            self.complete(id, Some(failure), Some(NodeResult::HookFailure), step);
            return;
        }

        self.graph.node_mut(id).started_at = Some(Instant::now());

        if self.graph.node(id).skip {
            self.complete(id, None, Some(NodeResult::Skipped), step);
            return;
        }

        let node = self.graph.node_mut(id);
        node.mark_running();
        let body = node.body.clone().unwrap_or(Body::Noop);
        let timeout = node.timeout();
        let group = node.group;

        let context = group
            .map(|g| self.graph.context_for(g))
            .unwrap_or_default();

        step.events.push(RunEvent::TestStart(self.graph.snapshot(id)));
        step.launches.push(Launch {
            node: id,
            title: self.graph.full_title(id, " "),
            body,
            context,
            timeout,
        });
    }

    fn complete(
        &mut self,
        id: NodeId,
        error: Option<Failure>,
        result: Option<NodeResult>,
        step: &mut SchedulerStep,
    ) {
        let admitted = {
            let node = self.graph.node(id);
            node.state != RunState::Completed && node.tick_start.is_some()
        };

        match self.graph.node_mut(id).complete(error, result, Instant::now()) {
            Completion::First => self.on_first_completion(id, admitted, step),
            Completion::Late(previous) => {
                warn!(
                    node = %id,
                    previous = ?previous.result,
                    "late completion reconciled"
                );
                self.tally(id, Some(&previous));
                step.events.push(RunEvent::TestFinish {
                    node: self.graph.snapshot(id),
                    previous: Some(previous),
                });
            }
            Completion::Ignored(Some(error)) => {
                warn!(node = %id, error = %error, "completion after failure ignored");
                step.events.push(RunEvent::TestError {
                    node: self.graph.snapshot(id),
                    error,
                });
            }
            Completion::Ignored(None) => {
                debug!(node = %id, "repeated completion ignored");
            }
        }
    }

    fn on_first_completion(&mut self, id: NodeId, admitted: bool, step: &mut SchedulerStep) {
        step.cleared_timers.push(id);

        if admitted {
            self.running = self.running.saturating_sub(1);
            self.tick += 1;
            self.graph.node_mut(id).tick_end = Some(self.tick);
        }

        self.tally(id, None);
        step.events.push(RunEvent::TestFinish {
            node: self.graph.snapshot(id),
            previous: None,
        });

        if id == self.last {
            self.finish(step);
        }

        let nexts = self.graph.node(id).nexts.clone();
        for next in nexts {
            let node = self.graph.node_mut(next);
            node.completed_priors += 1;
            if node.is_ready() && node.state == RunState::Waiting && !self.bailing {
                self.ready.push_back(next);
            }
        }
    }

    fn tally(&mut self, id: NodeId, previous: Option<&PreviousOutcome>) {
        if self.graph.node(id).kind == NodeKind::Root {
            return;
        }

        if self.graph.node(id).completed_number.is_none() {
            self.stats.completed += 1;
            self.graph.node_mut(id).completed_number = Some(self.stats.completed);
        }

        let previous_result = previous.and_then(|p| p.result);
        match self.graph.node(id).result {
            Some(NodeResult::Success) => self.stats.passes += 1,
            Some(result) if result.is_failing() => {
                if previous_result == Some(NodeResult::Success) {
                    self.stats.passes = self.stats.passes.saturating_sub(1);
                }

                if previous.is_none() || previous_result == Some(NodeResult::Success) {
                    self.stats.failures += 1;
                    self.failures.push(id);
                    self.graph.node_mut(id).failure_number = Some(self.stats.failures);
                }
            }
            Some(NodeResult::Skipped) => self.stats.skipped += 1,
            _ => {}
        }
    }

    fn finish(&mut self, step: &mut SchedulerStep) {
        self.finished = true;
        self.stats.end_time = Some(SystemTime::now());
        self.stats.duration = Some(
            self.started_at
                .map(|start| start.elapsed())
                .unwrap_or_default(),
        );
        self.stats.ticks = self.tick;

        info!(
            passes = self.stats.passes,
            failures = self.stats.failures,
            skipped = self.stats.skipped,
            max_concurrency = self.stats.max_concurrency,
            "scheduler: run finished"
        );

        step.events.push(RunEvent::Finish(self.stats.clone()));
        step.run_just_finished = true;
    }
}
