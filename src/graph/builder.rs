//! Dependency extraction from documents.
//!
//! Builds a [`ModelGraph`] in three phases: insert a node per declaration
//! (with a content hash of its spec), extract edges by scanning for `${...}`
//! identifiers and kind-specific reference fields, then validate the result
//! is acyclic.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::document::Document;
use crate::error::GraphError;
use crate::expr;
use crate::graph::{GraphNode, ModelGraph, NodeKind};
use crate::value::Value;

/// Operation types that emit multiple named parts.
const PATTERN_TYPES: [&str; 4] = ["pattern", "circular", "linear", "grid"];

/// Spec fields whose items reference parts (or part-producing operations).
const PART_LIST_FIELDS: [&str; 3] = ["inputs", "parts", "subtract"];

/// Spec fields holding a single part reference.
const PART_FIELDS: [&str; 3] = ["input", "base", "tool"];

/// Computes the content hash of a spec: the SHA-256 of its canonical JSON,
/// truncated to 16 hex characters.
pub fn hash_spec(spec: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.canonical_json().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Builds dependency graphs from documents.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    parameter_names: BTreeSet<String>,
}

impl GraphBuilder {
    /// Creates a builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a document into a validated dependency graph.
    pub fn build(&mut self, document: &Document) -> Result<ModelGraph, GraphError> {
        let mut graph = ModelGraph::new();

        // Phase 1: nodes
        self.add_parameter_nodes(&mut graph, document)?;
        self.add_section_nodes(&mut graph, NodeKind::Sketch, &document.sketches)?;
        self.add_section_nodes(&mut graph, NodeKind::Part, &document.parts)?;
        self.add_operation_nodes(&mut graph, document)?;
        self.add_section_nodes(&mut graph, NodeKind::Reference, &document.references)?;

        // Phase 2: edges
        self.extract_parameter_edges(&mut graph, document)?;
        self.extract_sketch_edges(&mut graph, document)?;
        self.extract_part_edges(&mut graph, document)?;
        self.extract_operation_edges(&mut graph, document)?;
        self.extract_reference_edges(&mut graph, document)?;

        // Phase 3: validation
        let cycles = graph.detect_cycles();
        if let Some(cycle) = cycles.first() {
            let mut trace: Vec<&str> = cycle.iter().map(String::as_str).collect();
            if let Some(first) = trace.first().copied() {
                trace.push(first);
            }
            return Err(GraphError::CircularDependency {
                trace: trace.join(" -> "),
            });
        }

        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        Ok(graph)
    }

    fn add_parameter_nodes(
        &mut self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, value) in &document.parameters {
            self.parameter_names.insert(name.clone());
            let mut spec = indexmap::IndexMap::new();
            spec.insert("value".to_string(), value.clone());
            let spec = Value::Map(spec);
            let hash = hash_spec(value);
            graph.add_node(GraphNode::new(NodeKind::Parameter, name, spec, hash))?;
        }
        Ok(())
    }

    fn add_section_nodes(
        &mut self,
        graph: &mut ModelGraph,
        kind: NodeKind,
        section: &indexmap::IndexMap<String, Value>,
    ) -> Result<(), GraphError> {
        for (name, spec) in section {
            let hash = hash_spec(spec);
            graph.add_node(GraphNode::new(kind, name, spec.clone(), hash))?;
        }
        Ok(())
    }

    fn add_operation_nodes(
        &mut self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, spec) in &document.operations {
            let hash = hash_spec(spec);
            let mut node = GraphNode::new(NodeKind::Operation, name, spec.clone(), hash);
            node.is_pattern = spec
                .get("type")
                .and_then(Value::as_str)
                .map(|t| PATTERN_TYPES.contains(&t))
                .unwrap_or(false);
            graph.add_node(node)?;
        }
        Ok(())
    }

    fn extract_parameter_edges(
        &self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, value) in &document.parameters {
            let dependent = NodeKind::Parameter.id(name);
            for reference in self.find_parameter_refs(value) {
                if reference != *name && self.parameter_names.contains(&reference) {
                    graph.add_dependency(&dependent, &NodeKind::Parameter.id(&reference))?;
                }
            }
        }
        Ok(())
    }

    fn extract_sketch_edges(
        &self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, spec) in &document.sketches {
            let dependent = NodeKind::Sketch.id(name);
            self.add_parameter_refs(graph, &dependent, spec)?;
        }
        Ok(())
    }

    fn extract_part_edges(
        &self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, spec) in &document.parts {
            let dependent = NodeKind::Part.id(name);
            self.add_parameter_refs(graph, &dependent, spec)?;

            if let Some(sketch_name) = spec.get("sketch").and_then(Value::as_str) {
                let sketch_id = NodeKind::Sketch.id(sketch_name);
                if graph.contains(&sketch_id) {
                    graph.add_dependency(&dependent, &sketch_id)?;
                }
            }
        }
        Ok(())
    }

    fn extract_operation_edges(
        &self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, spec) in &document.operations {
            let dependent = NodeKind::Operation.id(name);
            self.add_parameter_refs(graph, &dependent, spec)?;

            for part_name in self.operation_part_refs(spec) {
                self.add_part_or_operation_edge(graph, &dependent, &part_name)?;
            }

            // Sketch-consuming operations: extrude/revolve use `sketch`,
            // loft uses `profiles`
            if let Some(sketch_name) = spec.get("sketch").and_then(Value::as_str) {
                let sketch_id = NodeKind::Sketch.id(sketch_name);
                if graph.contains(&sketch_id) {
                    graph.add_dependency(&dependent, &sketch_id)?;
                }
            }
            if let Some(profiles) = spec.get("profiles").and_then(Value::as_list) {
                for profile in profiles {
                    if let Some(profile_name) = profile.as_str() {
                        let sketch_id = NodeKind::Sketch.id(profile_name);
                        if graph.contains(&sketch_id) {
                            graph.add_dependency(&dependent, &sketch_id)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn extract_reference_edges(
        &self,
        graph: &mut ModelGraph,
        document: &Document,
    ) -> Result<(), GraphError> {
        for (name, spec) in &document.references {
            let dependent = NodeKind::Reference.id(name);
            self.add_parameter_refs(graph, &dependent, spec)?;

            if let Some(part_name) = spec.get("part").and_then(Value::as_str) {
                self.add_part_or_operation_edge(graph, &dependent, part_name)?;
            }
        }
        Ok(())
    }

    fn add_parameter_refs(
        &self,
        graph: &mut ModelGraph,
        dependent: &str,
        spec: &Value,
    ) -> Result<(), GraphError> {
        for reference in self.find_parameter_refs(spec) {
            if self.parameter_names.contains(&reference) {
                graph.add_dependency(dependent, &NodeKind::Parameter.id(&reference))?;
            }
        }
        Ok(())
    }

    /// A referenced name can be a primitive part or another operation's
    /// output; wildcard entries resolve at build time instead.
    fn add_part_or_operation_edge(
        &self,
        graph: &mut ModelGraph,
        dependent: &str,
        part_name: &str,
    ) -> Result<(), GraphError> {
        let part_id = NodeKind::Part.id(part_name);
        let operation_id = NodeKind::Operation.id(part_name);
        if graph.contains(&part_id) {
            graph.add_dependency(dependent, &part_id)?;
        } else if graph.contains(&operation_id) {
            graph.add_dependency(dependent, &operation_id)?;
        } else if let Some(base) = wildcard_base(part_name) {
            // `holes_*` or `{pattern: holes}` style references depend on
            // the pattern operation that will emit those parts
            let base_operation = NodeKind::Operation.id(base);
            if graph.contains(&base_operation) {
                graph.add_dependency(dependent, &base_operation)?;
            }
        }
        Ok(())
    }

    /// Recursively harvests identifiers appearing inside `${...}` in any
    /// string of the value.
    fn find_parameter_refs(&self, value: &Value) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        collect_refs(value, &mut refs);
        refs
    }

    /// Part names referenced by an operation spec, from single-reference
    /// fields and list fields alike. Pattern/range entries contribute their
    /// base name.
    fn operation_part_refs(&self, spec: &Value) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();

        for field in PART_FIELDS {
            if let Some(name) = spec.get(field).and_then(Value::as_str) {
                refs.insert(name.to_string());
            }
        }

        for field in PART_LIST_FIELDS {
            if let Some(items) = spec.get(field).and_then(Value::as_list) {
                for item in items {
                    match item {
                        Value::Str(name) => {
                            refs.insert(name.clone());
                        }
                        Value::Map(map) => {
                            if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
                                refs.insert(format!("{}_*", pattern));
                            }
                            if let Some(range) = map.get("range").and_then(Value::as_str) {
                                if let Some(open) = range.find('[') {
                                    refs.insert(format!("{}_*", &range[..open]));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if let Some(items) = spec.get("union").and_then(Value::as_list) {
            for item in items {
                if let Some(name) = item.as_str() {
                    refs.insert(name.to_string());
                }
            }
        }

        refs
    }
}

fn collect_refs(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::Str(s) => {
            for caps in expr::expr_pattern().captures_iter(s) {
                if let Some(inner) = caps.get(1) {
                    for ident in expr::ident_pattern().find_iter(inner.as_str()) {
                        refs.insert(ident.as_str().to_string());
                    }
                }
            }
        }
        Value::List(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        Value::Map(map) => {
            for item in map.values() {
                collect_refs(item, refs);
            }
        }
        _ => {}
    }
}

/// The base name of a wildcard reference: `holes_*` -> `holes`, `*` -> None.
fn wildcard_base(name: &str) -> Option<&str> {
    let stripped = name.strip_suffix('*')?;
    let base = stripped.strip_suffix('_').unwrap_or(stripped);
    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use pretty_assertions::assert_eq;

    fn doc(json: &str) -> Document {
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        Document::from_value(Value::from(parsed)).unwrap()
    }

    #[test]
    fn test_hash_is_stable_and_order_independent() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        let hash_a = hash_spec(&Value::from(a));
        let hash_b = hash_spec(&Value::from(b));
        assert_eq!(hash_a, hash_b);
        assert_eq!(hash_a.len(), 16);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = hash_spec(&Value::Int(1));
        let b = hash_spec(&Value::Int(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parameter_chain_edges() {
        let document = doc(
            r#"{
                "parameters": {"a": 10, "b": "${a * 2}", "c": "${b + a}"}
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();

        assert_eq!(
            graph.dependencies("parameter:b"),
            vec!["parameter:a".to_string()]
        );
        let mut c_deps = graph.dependencies("parameter:c");
        c_deps.sort();
        assert_eq!(c_deps, vec!["parameter:a", "parameter:b"]);
    }

    #[test]
    fn test_part_and_operation_edges() {
        let document = doc(
            r#"{
                "parameters": {"size": 10},
                "parts": {
                    "base": {"primitive": "box", "width": "${size}", "height": 5, "depth": 5},
                    "tool": {"primitive": "cylinder", "radius": 1, "height": 20}
                },
                "operations": {
                    "cut": {"type": "boolean", "operation": "difference",
                            "base": "base", "subtract": ["tool"]}
                }
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();

        assert!(graph
            .dependencies("part:base")
            .contains(&"parameter:size".to_string()));
        let mut cut_deps = graph.dependencies("operation:cut");
        cut_deps.sort();
        assert_eq!(cut_deps, vec!["part:base", "part:tool"]);
    }

    #[test]
    fn test_operation_chains_to_operation() {
        let document = doc(
            r#"{
                "parts": {"base": {"primitive": "box", "width": 1, "height": 1, "depth": 1}},
                "operations": {
                    "moved": {"type": "transform", "input": "base",
                              "transforms": [{"type": "translate", "offset": [1, 0, 0]}]},
                    "doubled": {"type": "boolean", "operation": "union",
                                "inputs": ["base", "moved"]}
                }
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();
        let mut deps = graph.dependencies("operation:doubled");
        deps.sort();
        assert_eq!(deps, vec!["operation:moved", "part:base"]);
    }

    #[test]
    fn test_pattern_flag() {
        let document = doc(
            r#"{
                "parts": {"hole": {"primitive": "cylinder", "radius": 1, "height": 10}},
                "operations": {
                    "holes": {"type": "linear", "input": "hole", "count": 4,
                              "direction": "X", "spacing": 5}
                }
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();
        assert!(graph.node("operation:holes").unwrap().is_pattern);
    }

    #[test]
    fn test_wildcard_reference_depends_on_pattern_operation() {
        let document = doc(
            r#"{
                "parts": {
                    "plate": {"primitive": "box", "width": 100, "height": 100, "depth": 10},
                    "hole": {"primitive": "cylinder", "radius": 3, "height": 12}
                },
                "operations": {
                    "holes": {"type": "linear", "input": "hole", "count": 6,
                              "direction": "X", "spacing": 12},
                    "drilled": {"type": "boolean", "operation": "difference",
                                "base": "plate", "subtract": ["holes_*"]}
                }
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();
        assert!(graph
            .dependencies("operation:drilled")
            .contains(&"operation:holes".to_string()));
    }

    #[test]
    fn test_cycle_rejected_with_trace() {
        let document = doc(r#"{"parameters": {"a": "${b}", "b": "${a}"}}"#);
        match GraphBuilder::new().build(&document) {
            Err(GraphError::CircularDependency { trace }) => {
                assert!(trace.contains("parameter:a"));
                assert!(trace.contains("parameter:b"));
            }
            other => panic!("expected CircularDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_edges() {
        let document = doc(
            r#"{
                "parts": {"beam": {"primitive": "box", "width": 1, "height": 1, "depth": 1}},
                "references": {
                    "top": {"part": "beam", "face": ">Z", "at": "center"}
                }
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();
        assert_eq!(
            graph.dependencies("reference:top"),
            vec!["part:beam".to_string()]
        );
    }

    #[test]
    fn test_function_names_do_not_become_edges() {
        let document = doc(
            r#"{
                "parameters": {"a": 4, "b": "${sqrt(a)}"}
            }"#,
        );
        let graph = GraphBuilder::new().build(&document).unwrap();
        assert_eq!(
            graph.dependencies("parameter:b"),
            vec!["parameter:a".to_string()]
        );
    }
}
