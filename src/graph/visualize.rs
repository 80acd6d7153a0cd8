//! Graph inspection output.
//!
//! Renders a [`ModelGraph`] to Graphviz DOT text and produces a plain-text
//! statistics summary. Rendering the DOT to an image is left to external
//! tooling (`dot -Tpng deps.dot -o deps.png`).

use std::fmt::Write as _;

use crate::graph::{ModelGraph, NodeKind};

fn fill_color(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Parameter => "lightblue",
        NodeKind::Sketch => "lightyellow",
        NodeKind::Part => "lightgreen",
        NodeKind::Operation => "lightsalmon",
        NodeKind::Reference => "plum",
    }
}

/// Renders the graph as Graphviz DOT text.
///
/// Nodes are colored by kind; pattern operations are annotated.
pub fn to_dot(graph: &ModelGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph dependencies {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=filled];\n\n");

    for node in graph.iter() {
        let mut label = node.name.clone();
        if node.is_pattern {
            label.push_str("\\n[pattern]");
        }
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\", fillcolor={}];",
            node.id,
            label,
            fill_color(node.kind)
        );
    }

    out.push('\n');
    for node in graph.iter() {
        for dependent in graph.dependents(&node.id) {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", node.id, dependent);
        }
    }

    out.push_str("}\n");
    out
}

/// Produces a plain-text summary: counts by kind, edge count, depth, roots,
/// and leaves.
pub fn stats(graph: &ModelGraph) -> String {
    let counts = graph.counts_by_kind();
    let mut out = String::new();

    let _ = writeln!(out, "nodes: {}", graph.len());
    for kind in NodeKind::all() {
        let count = counts.get(&kind).copied().unwrap_or(0);
        if count > 0 {
            let _ = writeln!(out, "  {}: {}", kind.name(), count);
        }
    }
    let _ = writeln!(out, "edges: {}", graph.edge_count());
    let _ = writeln!(out, "max depth: {}", graph.max_depth());

    let roots = graph.roots();
    let _ = writeln!(out, "roots ({}): {}", roots.len(), roots.join(", "));
    let leaves = graph.leaves();
    let _ = writeln!(out, "leaves ({}): {}", leaves.len(), leaves.join(", "));

    out
}
