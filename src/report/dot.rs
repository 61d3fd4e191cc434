// src/report/dot.rs

//! Graphviz rendering of a compiled test graph.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::{NodeKind, TestGraph};
use crate::types::Exclusivity;

/// Render `graph` in dot notation.
///
/// Skipped nodes are grey, globally exclusive markers blue, other globally
/// exclusive nodes red.
pub fn render(graph: &TestGraph) -> String {
    let mut dot: DiGraph<String, &'static str> = DiGraph::with_capacity(graph.len(), graph.len());
    let mut colors = Vec::with_capacity(graph.len());

    for id in graph.node_ids() {
        let node = graph.node(id);
        let in_container = node
            .group()
            .is_some_and(|g| graph.group(g).test_container);

        let label = if node.kind() == NodeKind::Normal || in_container {
            node.title().to_string()
        } else {
            graph.full_title(id, "/")
        };

        let color = if node.is_skipped() {
            "azure4"
        } else if node.exclusivity() == Exclusivity::Global {
            if node.kind() == NodeKind::Root { "blue" } else { "red" }
        } else {
            "white"
        };

        dot.add_node(label);
        colors.push(color);
    }

    let pg = graph.to_petgraph();
    for edge in pg.raw_edges() {
        dot.add_edge(edge.source(), edge.target(), "");
    }

    let edge_attrs = |_, _| String::new();
    let node_attrs = |_, (idx, label): (NodeIndex, &String)| {
        format!(
            "shape=record, label=\"{{{}}}\", style=filled, fillcolor={}",
            escape(label),
            colors[idx.index()]
        )
    };

    let rendered = Dot::with_attr_getters(
        &dot,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &edge_attrs,
        &node_attrs,
    );

    format!("{rendered}")
}

fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '<' | '>' | '"' | '{' | '}' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
