// src/dag/graph.rs

//! Arena holding every registered node and group of a run.
//!
//! Compilation ([`crate::dag::Group::compile`]) pushes nodes into a
//! [`GraphSink`]; [`TestGraph`] is the sink used by the scheduler. It assigns
//! sequence ids, wires prior/next edges, and keeps the set of *leaves*
//! (registered nodes without outgoing edges) so that globally exclusive nodes
//! can be made to wait for everything registered before them.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::dag::context::Context;
use crate::dag::failure::Failure;
use crate::dag::group::GroupId;
use crate::dag::node::{Node, NodeId, NodeKind, NodeResult, RunState};
use crate::errors::{Result, SuitedagError};
use crate::types::Exclusivity;

/// Receiver of compiled groups and nodes.
pub trait GraphSink {
    /// Register a group as it starts compiling.
    fn register_group(&mut self, info: GroupInfo) -> GroupId;

    /// Register a finalized node, wiring it after `priors`.
    fn emit_node(&mut self, node: Node, priors: &[NodeId]) -> NodeId;
}

/// Static information about a compiled group.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub title: Option<String>,
    pub parent: Option<GroupId>,
    pub test_container: bool,
    pub exclusivity: Exclusivity,
}

/// Read-only view of a node, handed to observers and reports.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub title: String,
    pub full_title: String,
    pub kind: NodeKind,
    pub exclusivity: Exclusivity,
    pub skipped: bool,
    pub state: RunState,
    pub result: Option<NodeResult>,
    pub failure: Option<Failure>,
    pub timeout: Option<Duration>,
    pub duration: Option<Duration>,
    pub tick_start: Option<u64>,
    pub tick_end: Option<u64>,
    pub completed_number: Option<usize>,
    pub failure_number: Option<usize>,
}

#[derive(Debug, Default)]
pub struct TestGraph {
    nodes: Vec<Node>,
    groups: Vec<GroupInfo>,
    leaves: BTreeSet<NodeId>,
    contexts: HashMap<GroupId, Context>,
}

impl TestGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..=self.nodes.len() as u64).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[Self::index(id)]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[Self::index(id)]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let idx = (id.0 as usize).checked_sub(1)?;
        self.nodes.get(idx)
    }

    pub fn group(&self, id: GroupId) -> &GroupInfo {
        &self.groups[id.0 as usize]
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &GroupInfo)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(idx, info)| (GroupId(idx as u64), info))
    }

    /// First registered node (the run entry marker).
    pub fn first(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(1))
    }

    /// Last registered node (the run exit marker).
    pub fn last(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(self.nodes.len() as u64))
    }

    /// Current leaves: registered nodes without outgoing edges.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.leaves.iter().copied()
    }

    /// Title of a group including its ancestors, empty segments skipped.
    ///
    /// Test containers are transparent and report their parent's title.
    pub fn group_full_title(&self, id: GroupId, separator: &str) -> String {
        let info = self.group(id);
        let parent = info
            .parent
            .map(|p| self.group_full_title(p, separator))
            .unwrap_or_default();

        if info.test_container {
            return parent;
        }

        join_title(parent, info.title.as_deref().unwrap_or(""), separator)
    }

    /// Title of a node prefixed by the groups that declared it.
    pub fn full_title(&self, id: NodeId, separator: &str) -> String {
        let node = self.node(id);
        let scope = node
            .origin
            .or(node.group)
            .map(|g| self.group_full_title(g, separator))
            .unwrap_or_default();
        join_title(scope, &node.title, separator)
    }

    /// Context shared by the nodes of `id`, built on first use.
    pub fn context_for(&mut self, id: GroupId) -> Context {
        if let Some(ctx) = self.contexts.get(&id) {
            return ctx.clone();
        }

        let info = self.group(id).clone();
        let ctx = match info.parent {
            Some(parent) if info.test_container => self.context_for(parent),
            Some(parent) => self.context_for(parent).derive_child(),
            None => Context::new(),
        };

        self.contexts.insert(id, ctx.clone());
        ctx
    }

    pub fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = self.node(id);
        NodeSnapshot {
            id,
            title: node.title.clone(),
            full_title: self.full_title(id, "/"),
            kind: node.kind,
            exclusivity: node.exclusivity(),
            skipped: node.skip,
            state: node.state,
            result: node.result,
            failure: node.failure.clone(),
            timeout: node.timeout(),
            duration: node.duration,
            tick_start: node.tick_start,
            tick_end: node.tick_end,
            completed_number: node.completed_number,
            failure_number: node.failure_number,
        }
    }

    /// Edge list as a petgraph graph; node weights are the sequence ids.
    pub fn to_petgraph(&self) -> DiGraph<NodeId, ()> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.nodes.len());
        for id in self.node_ids() {
            graph.add_node(id);
        }
        for node in &self.nodes {
            let Some(id) = node.id else { continue };
            for next in &node.nexts {
                graph.add_edge(Self::graph_index(id), Self::graph_index(*next), ());
            }
        }
        graph
    }

    /// Compiled graphs are acyclic by construction; this double checks it.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let graph = self.to_petgraph();
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let id = graph[cycle.node_id()];
                Err(SuitedagError::GraphCycle(format!(
                    "cycle detected involving '{}' ({id})",
                    self.full_title(id, "/")
                )))
            }
        }
    }

    fn link(&mut self, priors: &[NodeId], next: NodeId) {
        for &prior in priors {
            if prior == next || self.node(next).priors.contains(&prior) {
                continue;
            }
            self.node_mut(prior).nexts.push(next);
            self.node_mut(next).priors.push(prior);
            self.leaves.remove(&prior);
        }
    }

    fn index(id: NodeId) -> usize {
        (id.0 as usize) - 1
    }

    fn graph_index(id: NodeId) -> NodeIndex {
        NodeIndex::new(Self::index(id))
    }
}

impl GraphSink for TestGraph {
    fn register_group(&mut self, info: GroupInfo) -> GroupId {
        let id = GroupId(self.groups.len() as u64);
        debug!(group = id.0, title = ?info.title, container = info.test_container, "registered group");
        self.groups.push(info);
        id
    }

    fn emit_node(&mut self, mut node: Node, priors: &[NodeId]) -> NodeId {
        let id = NodeId(self.nodes.len() as u64 + 1);
        node.id = Some(id);

        // A global node waits for everything registered before it.
        let frontier: Vec<NodeId> = if node.exclusivity() == Exclusivity::Global {
            self.leaves.iter().copied().collect()
        } else {
            Vec::new()
        };

        debug!(
            node = %id,
            title = %node.title,
            kind = ?node.kind,
            exclusivity = %node.exclusivity(),
            priors = ?priors,
            frontier = ?frontier,
            "registered node"
        );

        self.nodes.push(node);
        self.leaves.insert(id);
        self.link(priors, id);
        self.link(&frontier, id);
        id
    }
}

fn join_title(scope: String, title: &str, separator: &str) -> String {
    match (scope.is_empty(), title.is_empty()) {
        (true, _) => title.to_string(),
        (false, true) => scope,
        (false, false) => format!("{scope}{separator}{title}"),
    }
}
