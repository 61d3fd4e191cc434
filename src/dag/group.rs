// src/dag/group.rs

//! Groups and the compiler that linearizes them into a dependency graph.
//!
//! A [`Group`] owns five node buckets (before-all, before-each, normal,
//! after-each, after-all) and a list of child groups. [`Group::compile`]
//! walks the tree once and emits every finalized node to a [`GraphSink`],
//! wiring prior edges so that:
//!
//! - `none` nodes collect in a pending *bucket* and all depend on the
//!   current *frontier*;
//! - `local` nodes depend on the bucket (or the frontier when the bucket is
//!   empty) and become the new frontier;
//! - `global` nodes are wired by the sink to every current leaf of the run.
//!
//! Tests of a group that declares before-each/after-each hooks are wrapped
//! in a synthetic *test container* group whose before-all/after-all hooks
//! are clones of those hooks, so the same rules cover both cases.

use std::mem;
use std::time::Duration;

use tracing::debug;

use crate::dag::graph::{GraphSink, GroupInfo};
use crate::dag::node::{Node, NodeId, NodeKind};
use crate::types::Exclusivity;

/// Id assigned when a group registers with the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

#[derive(Debug, Clone, Default)]
pub struct Group {
    title: Option<String>,
    exclusivity: Exclusivity,
    test_exclusivity: Option<Exclusivity>,
    only: bool,
    skip: bool,
    timeout: Option<Duration>,
    test_container: bool,

    children: Vec<Group>,
    before_all: Vec<Node>,
    before_each: Vec<Node>,
    normal: Vec<Node>,
    after_each: Vec<Node>,
    after_all: Vec<Node>,

    // Compilation state.
    id: Option<GroupId>,
    prepared: bool,
    has_only_test: bool,
    frontier: Vec<NodeId>,
    bucket: Vec<NodeId>,
    globals: Vec<NodeId>,
    dependencies: Vec<NodeId>,
}

impl Group {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Untitled group used as the root of a run.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn id(&self) -> Option<GroupId> {
        self.id
    }

    pub fn exclusivity(&self) -> Exclusivity {
        self.exclusivity
    }

    pub fn test_exclusivity(&self) -> Option<Exclusivity> {
        self.test_exclusivity
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_test_container(&self) -> bool {
        self.test_container
    }

    pub fn children(&self) -> &[Group] {
        &self.children
    }

    /// Nodes still held in a bucket. Emitted nodes move into the graph.
    pub fn nodes(&self, kind: NodeKind) -> &[Node] {
        match kind {
            NodeKind::BeforeAll => &self.before_all,
            NodeKind::BeforeEach => &self.before_each,
            NodeKind::AfterEach => &self.after_each,
            NodeKind::AfterAll => &self.after_all,
            NodeKind::Normal | NodeKind::Root => &self.normal,
        }
    }

    pub fn add_group(&mut self, group: Group) -> &mut Self {
        self.children.push(group);
        self
    }

    pub fn add_test(&mut self, mut test: Node) -> &mut Self {
        test.kind = NodeKind::Normal;
        self.normal.push(test);
        self
    }

    pub fn add_before_all(&mut self, mut hook: Node) -> &mut Self {
        hook.kind = NodeKind::BeforeAll;
        self.before_all.push(hook);
        self
    }

    pub fn add_before_each(&mut self, mut hook: Node) -> &mut Self {
        hook.kind = NodeKind::BeforeEach;
        self.before_each.push(hook);
        self
    }

    pub fn add_after_each(&mut self, mut hook: Node) -> &mut Self {
        hook.kind = NodeKind::AfterEach;
        self.after_each.push(hook);
        self
    }

    pub fn add_after_all(&mut self, mut hook: Node) -> &mut Self {
        hook.kind = NodeKind::AfterAll;
        self.after_all.push(hook);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.add_group(group);
        self
    }

    pub fn with_test(mut self, test: Node) -> Self {
        self.add_test(test);
        self
    }

    pub fn with_before_all(mut self, hook: Node) -> Self {
        self.add_before_all(hook);
        self
    }

    pub fn with_before_each(mut self, hook: Node) -> Self {
        self.add_before_each(hook);
        self
    }

    pub fn with_after_each(mut self, hook: Node) -> Self {
        self.add_after_each(hook);
        self
    }

    pub fn with_after_all(mut self, hook: Node) -> Self {
        self.add_after_all(hook);
        self
    }

    pub fn with_only(mut self, only: bool) -> Self {
        self.only = only;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_exclusivity(mut self, exclusivity: Exclusivity) -> Self {
        self.exclusivity = exclusivity;
        self
    }

    /// Default exclusivity for nodes declared in this group and below.
    pub fn with_test_exclusivity(mut self, exclusivity: Exclusivity) -> Self {
        self.test_exclusivity = Some(exclusivity);
        self
    }

    /// No other group or node runs while this group runs.
    pub fn globally_exclusive(self) -> Self {
        self.with_exclusivity(Exclusivity::Global)
    }

    /// No sibling group runs while this group runs.
    pub fn locally_exclusive(self) -> Self {
        self.with_exclusivity(Exclusivity::Local)
    }

    pub fn globally_exclusive_tests(self) -> Self {
        self.with_test_exclusivity(Exclusivity::Global)
    }

    pub fn locally_exclusive_tests(self) -> Self {
        self.with_test_exclusivity(Exclusivity::Local)
    }

    pub fn non_exclusive_tests(self) -> Self {
        self.with_test_exclusivity(Exclusivity::None)
    }

    pub(crate) fn set_exclusivity(&mut self, exclusivity: Exclusivity) {
        self.exclusivity = exclusivity;
    }

    pub(crate) fn set_test_exclusivity_default(&mut self, exclusivity: Exclusivity) {
        if self.test_exclusivity.is_none() {
            self.test_exclusivity = Some(exclusivity);
        }
    }

    pub(crate) fn set_timeout_default(&mut self, timeout: Duration) {
        if self.timeout.is_none() {
            self.timeout = Some(timeout);
        }
    }

    /// Whether a node of `kind` in this group is marked `only`.
    ///
    /// For normal nodes the query also covers descendant groups, and a
    /// descendant group marked `only` counts as a match.
    pub fn has_only(&self, kind: NodeKind) -> bool {
        if self.nodes(kind).iter().any(Node::is_only) {
            return true;
        }

        kind == NodeKind::Normal
            && self
                .children
                .iter()
                .any(|child| child.only || child.has_only(kind))
    }

    /// Compile this group (the run root) into `sink`.
    ///
    /// Idempotent: a group that was already compiled emits nothing.
    pub fn compile(&mut self, sink: &mut dyn GraphSink) {
        self.compile_scope(sink, None);
    }

    fn compile_scope(&mut self, sink: &mut dyn GraphSink, parent: Option<GroupId>) {
        if self.prepared {
            return;
        }

        let id = sink.register_group(GroupInfo {
            title: self.title.clone(),
            parent,
            test_container: self.test_container,
            exclusivity: self.exclusivity,
        });
        self.id = Some(id);

        for hook in self.before_each.iter_mut().chain(self.after_each.iter_mut()) {
            hook.origin.get_or_insert(id);
        }

        self.has_only_test = self.has_only(NodeKind::Normal);

        if self.exclusivity == Exclusivity::Global {
            let start = self.root_marker("Global exclusive start", Exclusivity::Global);
            let start = sink.emit_node(start, &[]);
            self.frontier = vec![start];
        }

        if !self.before_all.is_empty() {
            let has_only = self.has_only(NodeKind::BeforeAll);
            for hook in mem::take(&mut self.before_all) {
                let hook = self.place_node(hook, has_only, sink);
                self.dependencies.push(hook);
            }
            self.close_bucket(sink);
        }

        let normal = mem::take(&mut self.normal);
        if !normal.is_empty() {
            if self.before_each.is_empty() && self.after_each.is_empty() {
                for test in normal {
                    self.place_node(test, self.has_only_test, sink);
                }
                self.close_bucket(sink);
            } else {
                let mut containers: Vec<Group> = normal
                    .into_iter()
                    .map(|test| self.test_container(test))
                    .collect();
                self.compile_children(&mut containers, sink);
            }
        }

        let mut children = mem::take(&mut self.children);
        self.compile_children(&mut children, sink);
        self.children = children;

        if !self.after_all.is_empty() {
            let has_only = self.has_only(NodeKind::AfterAll);
            for hook in mem::take(&mut self.after_all) {
                self.place_node(hook, has_only, sink);
            }
            self.close_bucket(sink);
        }

        if self.exclusivity == Exclusivity::Global {
            let end = self.root_marker("Global exclusive finish", Exclusivity::Global);
            let end = sink.emit_node(end, &[]);
            self.frontier = vec![end];
            self.globals = vec![end];
        }

        self.prepared = true;
    }

    /// Stamp inherited properties onto `node`, wire it and emit it.
    fn place_node(&mut self, mut node: Node, has_only: bool, sink: &mut dyn GraphSink) -> NodeId {
        if node.exclusivity.is_none() {
            node.exclusivity = self.test_exclusivity;
        }
        if node.timeout.is_none() {
            node.timeout = self.timeout;
        }

        if !node.only && !node.skip {
            if node.kind != NodeKind::Normal {
                // Hooks only drop out when nothing below is selected.
                if !self.has_only_test {
                    node.skip = self.skip || has_only;
                }
            } else {
                node.skip = self.skip || has_only;
            }
        }

        node.group = self.id;
        node.add_dependencies(&self.dependencies);

        let exclusivity = node.exclusivity();
        let priors = match exclusivity {
            Exclusivity::None => self.frontier.clone(),
            Exclusivity::Local if !self.bucket.is_empty() => mem::take(&mut self.bucket),
            Exclusivity::Local => self.frontier.clone(),
            // The sink wires global nodes to the run's leaves.
            Exclusivity::Global => Vec::new(),
        };

        let id = sink.emit_node(node, &priors);

        match exclusivity {
            Exclusivity::None => self.bucket.push(id),
            Exclusivity::Local => {
                self.bucket.clear();
                self.frontier = vec![id];
            }
            Exclusivity::Global => {
                self.bucket.clear();
                self.frontier = vec![id];
                self.globals = vec![id];
            }
        }

        id
    }

    /// Flush the pending bucket into the frontier.
    fn close_bucket(&mut self, sink: &mut dyn GraphSink) {
        match self.bucket.len() {
            0 => {}
            1 => self.frontier = mem::take(&mut self.bucket),
            _ => {
                let barrier = self.root_marker("Non exclusives end", Exclusivity::Local);
                let members = mem::take(&mut self.bucket);
                let barrier = sink.emit_node(barrier, &members);
                debug!(barrier = %barrier, members = members.len(), "closed non-exclusive bucket");
                self.frontier = vec![barrier];
            }
        }
    }

    fn compile_children(&mut self, children: &mut [Group], sink: &mut dyn GraphSink) {
        for child in children.iter_mut() {
            if !child.only && !child.skip {
                child.skip = self.skip || self.has_only_test;
            }
            if child.test_exclusivity.is_none() {
                child.test_exclusivity = self.test_exclusivity;
            }
            if child.timeout.is_none() {
                child.timeout = self.timeout;
            }

            if !child.test_container {
                // Ancestor hooks wrap descendant hooks.
                let own_before = mem::take(&mut child.before_each);
                child.before_each = self.before_each.iter().cloned().chain(own_before).collect();
                child.after_each.extend(self.after_each.iter().cloned());
            }

            child.dependencies = self.dependencies.clone();

            if child.exclusivity != Exclusivity::None {
                self.close_bucket(sink);
            }

            child.frontier = self.frontier.clone();
            child.compile_scope(sink, self.id);

            if !child.globals.is_empty() {
                self.globals = child.globals.clone();
            }

            if child.exclusivity == Exclusivity::None {
                if child.globals.is_empty() {
                    for id in &child.frontier {
                        if !self.bucket.contains(id) {
                            self.bucket.push(*id);
                        }
                    }
                } else {
                    self.frontier = child.globals.clone();
                    self.bucket.clear();
                }
            } else {
                self.frontier = child.frontier.clone();
            }
        }
    }

    /// Wrap `test` in a group running this group's each-hooks around it.
    fn test_container(&self, test: Node) -> Group {
        let mut container = Group::new(format!("{} Container", test.title));

        for hook in &self.before_each {
            let mut hook = hook.clone_hook();
            hook.skip |= test.skip;
            container.before_all.push(hook);
        }
        for hook in &self.after_each {
            let mut hook = hook.clone_hook();
            hook.skip |= test.skip;
            container.after_all.push(hook);
        }

        container.skip = test.skip;
        container.only = test.only;
        container.timeout = self.timeout;
        container.test_exclusivity = self.test_exclusivity;
        container.exclusivity = self.test_exclusivity.unwrap_or(Exclusivity::Local);
        container.test_container = true;
        container.normal.push(test);
        container
    }

    fn root_marker(&self, title: &str, exclusivity: Exclusivity) -> Node {
        let mut marker = Node::root(title).with_exclusivity(exclusivity);
        marker.group = self.id;
        marker
    }
}
