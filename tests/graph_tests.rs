//! Dependency graph construction, hashing, invalidation, and inspection.

use declad::document::Document;
use declad::graph::{visualize, GraphBuilder, NodeKind};
use declad::value::Value;

fn document(json: &str) -> Document {
    let parsed: serde_json::Value = serde_json::from_str(json).expect("valid json");
    Document::from_value(Value::from(parsed)).expect("valid document")
}

fn bracket_document() -> Document {
    document(
        r#"{
            "parameters": {
                "width": 40,
                "height": "${width / 2}",
                "hole_r": 3
            },
            "sketches": {
                "outline": {
                    "plane": "XY",
                    "shapes": [
                        {"type": "rectangle", "width": "${width}", "height": "${height}"}
                    ]
                }
            },
            "parts": {
                "drill": {"primitive": "cylinder", "radius": "${hole_r}", "height": 30}
            },
            "operations": {
                "body": {"type": "extrude", "sketch": "outline", "distance": 10},
                "drilled": {"operation": "difference",
                            "base": "body", "subtract": ["drill"]}
            },
            "references": {
                "mount": {"part": "drilled", "face": ">Z", "at": "center"}
            }
        }"#,
    )
}

#[test]
fn test_every_declaration_becomes_a_node() {
    let graph = GraphBuilder::new().build(&bracket_document()).unwrap();
    let counts = graph.counts_by_kind();
    assert_eq!(counts[&NodeKind::Parameter], 3);
    assert_eq!(counts[&NodeKind::Sketch], 1);
    assert_eq!(counts[&NodeKind::Part], 1);
    assert_eq!(counts[&NodeKind::Operation], 2);
    assert_eq!(counts[&NodeKind::Reference], 1);
    assert_eq!(graph.len(), 8);
}

#[test]
fn test_topological_order_visits_each_node_once() {
    let graph = GraphBuilder::new().build(&bracket_document()).unwrap();
    let order = graph.topological_sort(None).unwrap();
    assert_eq!(order.len(), graph.len());

    let mut seen = std::collections::HashSet::new();
    for id in &order {
        assert!(seen.insert(id.clone()), "{} appears twice", id);
    }

    let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
    assert!(pos("parameter:width") < pos("parameter:height"));
    assert!(pos("parameter:height") < pos("sketch:outline"));
    assert!(pos("sketch:outline") < pos("operation:body"));
    assert!(pos("operation:body") < pos("operation:drilled"));
    assert!(pos("operation:drilled") < pos("reference:mount"));
}

#[test]
fn test_invalidation_closure_follows_edges() {
    let mut graph = GraphBuilder::new().build(&bracket_document()).unwrap();

    let affected = graph.descendants("parameter:width");
    assert!(affected.contains("parameter:height"));
    assert!(affected.contains("sketch:outline"));
    assert!(affected.contains("operation:body"));
    assert!(affected.contains("operation:drilled"));
    assert!(affected.contains("reference:mount"));
    assert!(!affected.contains("part:drill"));

    graph.mark_invalid("parameter:width");
    for id in &affected {
        graph.mark_invalid(id);
    }
    assert_eq!(graph.invalid_nodes().len(), affected.len() + 1);
}

#[test]
fn test_hashes_stable_across_builds() {
    let first = GraphBuilder::new().build(&bracket_document()).unwrap();
    let second = GraphBuilder::new().build(&bracket_document()).unwrap();
    for id in first.node_ids() {
        assert_eq!(
            first.node(&id).unwrap().hash,
            second.node(&id).unwrap().hash,
            "hash drifted for {}",
            id
        );
    }
}

#[test]
fn test_hash_changes_only_for_edited_nodes() {
    let original = GraphBuilder::new().build(&bracket_document()).unwrap();
    let edited = document(
        r#"{
            "parameters": {
                "width": 40,
                "height": "${width / 2}",
                "hole_r": 4
            },
            "sketches": {
                "outline": {
                    "plane": "XY",
                    "shapes": [
                        {"type": "rectangle", "width": "${width}", "height": "${height}"}
                    ]
                }
            },
            "parts": {
                "drill": {"primitive": "cylinder", "radius": "${hole_r}", "height": 30}
            },
            "operations": {
                "body": {"type": "extrude", "sketch": "outline", "distance": 10},
                "drilled": {"operation": "difference",
                            "base": "body", "subtract": ["drill"]}
            },
            "references": {
                "mount": {"part": "drilled", "face": ">Z", "at": "center"}
            }
        }"#,
    );
    let changed = GraphBuilder::new().build(&edited).unwrap();

    assert_ne!(
        original.node("parameter:hole_r").unwrap().hash,
        changed.node("parameter:hole_r").unwrap().hash
    );
    assert_eq!(
        original.node("parameter:width").unwrap().hash,
        changed.node("parameter:width").unwrap().hash
    );
    assert_eq!(
        original.node("operation:body").unwrap().hash,
        changed.node("operation:body").unwrap().hash
    );
}

#[test]
fn test_max_depth_of_chain() {
    let graph = GraphBuilder::new().build(&bracket_document()).unwrap();
    // width -> height -> outline -> body -> drilled -> mount
    assert_eq!(graph.max_depth(), 5);
}

#[test]
fn test_dot_and_stats_render() {
    let graph = GraphBuilder::new().build(&bracket_document()).unwrap();

    let dot = visualize::to_dot(&graph);
    assert!(dot.contains("digraph"));
    assert!(dot.contains("\"operation:drilled\""));
    assert!(dot.contains("\"operation:body\" -> \"operation:drilled\";"));

    let stats = visualize::stats(&graph);
    assert!(stats.contains("nodes: 8"));
    assert!(stats.contains("max depth: 5"));
}

#[test]
fn test_self_reference_is_rejected() {
    // An operation subtracting from itself forms a one-node cycle
    let looped = document(
        r#"{
            "parts": {
                "a": {"primitive": "box", "width": 1, "height": 1, "depth": 1}
            },
            "operations": {
                "cut": {"operation": "difference", "base": "a", "subtract": ["cut"]}
            }
        }"#,
    );
    let err = GraphBuilder::new().build(&looped).unwrap_err();
    assert!(err.to_string().contains("circular"));
}
