//! End-to-end build tests: documents through the orchestrator against the
//! mock backend.

use declad::backend::MockBackend;
use declad::build::ModelBuilder;
use declad::document::{Document, ExportFormat};
use declad::error::BuildError;
use declad::value::Value;
use pretty_assertions::assert_eq;

fn document(json: &str) -> Document {
    let parsed: serde_json::Value = serde_json::from_str(json).expect("valid json");
    Document::from_value(Value::from(parsed)).expect("valid document")
}

fn build(json: &str) -> ModelBuilder {
    let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
    builder.build(document(json)).expect("build should succeed");
    builder
}

fn build_err(json: &str) -> BuildError {
    let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
    builder
        .build(document(json))
        .expect_err("build should fail")
}

// ============================================
// 1. Parameters
// ============================================

#[test]
fn test_parameter_chain_resolves_through_graph() {
    let builder = build(
        r#"{
            "parameters": {"a": 10, "b": "${a * 2}", "c": "${b + a}"},
            "parts": {
                "probe": {"primitive": "box",
                          "width": "${c}", "height": "${b}", "depth": "${a}"}
            }
        }"#,
    );

    let part = builder.registry().get("probe").unwrap();
    let bbox = part.bounds(builder.backend()).unwrap();
    assert_eq!(bbox.size(), [30.0, 20.0, 10.0]);
}

#[test]
fn test_parameter_cycle_aborts_build() {
    let err = build_err(r#"{"parameters": {"a": "${b}", "b": "${a}"}}"#);
    let message = err.to_string();
    assert!(message.contains("circular"), "got: {}", message);
    assert!(message.contains("parameter:a"));
    assert!(message.contains("parameter:b"));
}

#[test]
fn test_division_by_zero_surfaces_expression() {
    let err = build_err(
        r#"{
            "parameters": {"bad": "${1 / 0}"},
            "parts": {"p": {"primitive": "sphere", "radius": "${bad}"}}
        }"#,
    );
    assert!(err.to_string().contains("1 / 0"), "got: {}", err);
}

// ============================================
// 2. Booleans and patterns
// ============================================

#[test]
fn test_hole_pattern_difference_keeps_plate_bounds() {
    let builder = build(
        r#"{
            "parts": {
                "plate": {"primitive": "box", "width": 100, "height": 100, "depth": 10},
                "hole": {"primitive": "cylinder", "radius": 3, "height": 12}
            },
            "operations": {
                "holes": {"type": "linear", "input": "hole",
                          "direction": "X", "count": 6, "spacing": 12},
                "drilled": {"operation": "difference",
                            "base": "plate", "subtract": ["holes_*"]}
            }
        }"#,
    );

    let registry = builder.registry();
    assert!(registry.exists("drilled"));
    for i in 0..6 {
        assert!(registry.exists(&format!("holes_{}", i)));
    }

    let plate = registry.get("plate").unwrap().bounds(builder.backend()).unwrap();
    let drilled = registry.get("drilled").unwrap().bounds(builder.backend()).unwrap();
    assert_eq!(plate, drilled);
}

#[test]
fn test_empty_wildcard_expansion_fails_with_registry_listing() {
    let err = build_err(
        r#"{
            "parts": {
                "plate": {"primitive": "box", "width": 10, "height": 10, "depth": 2}
            },
            "operations": {
                "drilled": {"operation": "difference",
                            "base": "plate", "subtract": ["bolt_*"]}
            }
        }"#,
    );
    let message = err.to_string();
    assert!(message.contains("bolt_*"));
    assert!(message.contains("plate"));
}

#[test]
fn test_range_expansion_in_document() {
    let builder = build(
        r#"{
            "parts": {
                "plate": {"primitive": "box", "width": 100, "height": 20, "depth": 5},
                "peg": {"primitive": "cylinder", "radius": 1, "height": 8}
            },
            "operations": {
                "pegs": {"type": "linear", "input": "peg",
                         "direction": "X", "count": 5, "spacing": 15},
                "combined": {"operation": "union",
                             "inputs": ["plate", {"range": "pegs[1..3]"}]}
            }
        }"#,
    );
    assert!(builder.registry().exists("combined"));
}

// ============================================
// 3. Finishing
// ============================================

#[test]
fn test_finishing_mutates_in_place_and_exports_input() {
    let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
    let doc = document(
        r#"{
            "parts": {
                "base": {"primitive": "box", "width": 20, "height": 20, "depth": 5}
            },
            "operations": {
                "rounded": {"type": "finishing", "finish": "fillet",
                            "input": "base", "radius": 2, "edges": "all"}
            },
            "export": {"default_part": "base", "formats": ["stl"]}
        }"#,
    );
    builder.build(doc).unwrap();

    // Only `base` is registered; the operation created no new part
    assert_eq!(builder.registry().names(), vec!["base"]);

    let part = builder.registry().get("base").unwrap();
    match part.metadata.get("finishing_ops") {
        Some(Value::List(ops)) => assert_eq!(ops.len(), 1),
        other => panic!("expected finishing_ops list, got {:?}", other),
    }

    assert_eq!(builder.export_part(None).as_deref(), Some("base"));
}

#[test]
fn test_finishing_only_document_falls_back_to_input_part() {
    // No export config: the last operation is finishing, which names no
    // registry entry, so selection falls through to its input
    let builder = build(
        r#"{
            "parts": {
                "base": {"primitive": "box", "width": 20, "height": 20, "depth": 5}
            },
            "operations": {
                "rounded": {"type": "fillet", "input": "base",
                            "radius": 1, "edges": "all"}
            }
        }"#,
    );
    assert_eq!(builder.export_part(None).as_deref(), Some("base"));
}

// ============================================
// 4. Extrude / revolve / loft / text
// ============================================

#[test]
fn test_mixed_extrude_scenario() {
    let builder = build(
        r#"{
            "sketches": {
                "profile": {
                    "plane": "XY",
                    "shapes": [
                        {"type": "rectangle", "width": 50, "height": 20},
                        {"type": "circle", "radius": 3, "operation": "subtract"}
                    ]
                }
            },
            "operations": {
                "plate": {"type": "extrude", "sketch": "profile", "distance": 10}
            }
        }"#,
    );

    let part = builder.registry().get("plate").unwrap();
    let bbox = part.bounds(builder.backend()).unwrap();
    assert_eq!(bbox.size(), [50.0, 20.0, 10.0]);
}

#[test]
fn test_revolve_rejects_nonpositive_angle() {
    let err = build_err(
        r#"{
            "sketches": {
                "half": {"shapes": [{"type": "rectangle", "width": 5, "height": 10}]}
            },
            "operations": {
                "bad": {"type": "revolve", "sketch": "half", "axis": "Z", "angle": -90}
            }
        }"#,
    );
    assert!(err.to_string().contains("(0, 360]"), "got: {}", err);
}

#[test]
fn test_loft_and_hull_chain() {
    let builder = build(
        r#"{
            "sketches": {
                "bottom": {"origin": [0, 0, 0],
                           "shapes": [{"type": "rectangle", "width": 20, "height": 20}]},
                "top": {"origin": [0, 0, 25],
                        "shapes": [{"type": "rectangle", "width": 8, "height": 8}]}
            },
            "parts": {
                "knob": {"primitive": "sphere", "radius": 3, "position": [0, 0, 40]}
            },
            "operations": {
                "body": {"type": "loft", "profiles": ["bottom", "top"]},
                "blended": {"type": "hull", "inputs": ["body", "knob"]}
            }
        }"#,
    );

    let bbox = builder
        .registry()
        .get("blended")
        .unwrap()
        .bounds(builder.backend())
        .unwrap();
    assert_eq!(bbox.max[2], 43.0);
    assert_eq!(bbox.min[2], 0.0);
}

#[test]
fn test_engrave_operation_propagates_appearance() {
    let builder = build(
        r#"{
            "parts": {
                "plate": {"primitive": "box", "width": 60, "height": 30, "depth": 4,
                          "color": "blue"}
            },
            "operations": {
                "labeled": {"type": "text", "input": "plate", "text": "REV A",
                            "face": ">Z", "position": [0, 0], "size": 6, "depth": -1}
            }
        }"#,
    );

    let part = builder.registry().get("labeled").unwrap();
    assert!(part.metadata.contains_key("color"));
    assert_eq!(
        part.metadata.get("text_operation"),
        Some(&Value::Str("engrave".to_string()))
    );
}

// ============================================
// 5. Transforms and references
// ============================================

#[test]
fn test_transform_requires_explicit_rotation_origin() {
    let err = build_err(
        r#"{
            "parts": {"b": {"primitive": "box", "width": 2, "height": 2, "depth": 2}},
            "operations": {
                "spun": {"type": "transform", "input": "b",
                         "transforms": [{"type": "rotate", "angle": 45, "axis": "Z"}]}
            }
        }"#,
    );
    assert!(err.to_string().contains("explicit origin"), "got: {}", err);
}

#[test]
fn test_reference_feeds_point_expression() {
    let builder = build(
        r#"{
            "parts": {
                "beam": {"primitive": "box", "width": 10, "height": 10, "depth": 10}
            },
            "references": {
                "beam_top": {"part": "beam", "face": ">Z", "at": "center"}
            }
        }"#,
    );

    assert_eq!(builder.named_points().get("beam_top"), Some(&[0.0, 0.0, 5.0]));
    let reference = builder.references().get("beam_top").unwrap();
    assert!(reference.orientation.is_some());
}

// ============================================
// 6. Errors, ordering, determinism
// ============================================

#[test]
fn test_builder_failure_names_the_node() {
    let err = build_err(
        r#"{
            "operations": {
                "cut": {"operation": "difference", "base": "ghost", "subtract": ["x"]}
            }
        }"#,
    );
    assert_eq!(err.node(), Some("operation:cut"));
}

#[test]
fn test_duplicate_output_name_rejected() {
    let err = build_err(
        r#"{
            "parts": {
                "a": {"primitive": "box", "width": 1, "height": 1, "depth": 1},
                "b": {"primitive": "box", "width": 1, "height": 1, "depth": 1},
                "both": {"primitive": "box", "width": 1, "height": 1, "depth": 1}
            },
            "operations": {
                "both": {"operation": "union", "inputs": ["a", "b"]}
            }
        }"#,
    );
    assert!(err.to_string().contains("already exists"), "got: {}", err);
}

#[test]
fn test_dependencies_build_before_dependents() {
    let builder = build(
        r#"{
            "parameters": {"size": 10},
            "parts": {
                "a": {"primitive": "box",
                      "width": "${size}", "height": "${size}", "depth": "${size}"},
                "b": {"primitive": "sphere", "radius": 2}
            },
            "operations": {
                "u": {"operation": "union", "inputs": ["a", "b"]}
            }
        }"#,
    );
    let order = builder.graph().topological_sort(None).unwrap();
    let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
    assert!(pos("parameter:size") < pos("part:a"));
    assert!(pos("part:a") < pos("operation:u"));
    assert!(pos("part:b") < pos("operation:u"));
}

#[test]
fn test_same_document_builds_identical_registries() {
    let json = r#"{
        "parameters": {"w": 30},
        "parts": {
            "plate": {"primitive": "box", "width": "${w}", "height": 20, "depth": 5},
            "pin": {"primitive": "cylinder", "radius": 2, "height": 10}
        },
        "operations": {
            "pins": {"type": "linear", "input": "pin",
                     "direction": "Y", "count": 3, "spacing": 6},
            "assembly": {"operation": "union", "inputs": ["plate", "pins_*"]}
        }
    }"#;

    let first = build(json);
    let second = build(json);

    assert_eq!(first.registry().names(), second.registry().names());
    for name in first.registry().names() {
        let a = first.registry().get(&name).unwrap().bounds(first.backend()).unwrap();
        let b = second
            .registry()
            .get(&name)
            .unwrap()
            .bounds(second.backend())
            .unwrap();
        assert_eq!(a, b, "bounds differ for {}", name);
    }
}

// ============================================
// 7. Rebuild
// ============================================

#[test]
fn test_rebuild_reevaluates_only_invalid_closure() {
    let original = r#"{
        "parameters": {"size": 10, "r": 2},
        "parts": {
            "plate": {"primitive": "box",
                      "width": "${size}", "height": "${size}", "depth": 2},
            "ball": {"primitive": "sphere", "radius": "${r}"}
        },
        "operations": {
            "joined": {"operation": "union", "inputs": ["plate", "ball"]}
        }
    }"#;
    let edited = r#"{
        "parameters": {"size": 10, "r": 3},
        "parts": {
            "plate": {"primitive": "box",
                      "width": "${size}", "height": "${size}", "depth": 2},
            "ball": {"primitive": "sphere", "radius": "${r}"}
        },
        "operations": {
            "joined": {"operation": "union", "inputs": ["plate", "ball"]}
        }
    }"#;

    let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
    builder.build(document(original)).unwrap();

    let rebuilt = builder.rebuild(document(edited)).unwrap();
    assert!(rebuilt.contains(&"parameter:r".to_string()));
    assert!(rebuilt.contains(&"part:ball".to_string()));
    assert!(rebuilt.contains(&"operation:joined".to_string()));
    assert!(!rebuilt.contains(&"part:plate".to_string()));
    assert!(!rebuilt.contains(&"parameter:size".to_string()));

    let ball = builder.registry().get("ball").unwrap();
    assert_eq!(ball.bounds(builder.backend()).unwrap().size(), [6.0, 6.0, 6.0]);
}

#[test]
fn test_rebuild_with_unchanged_document_rebuilds_nothing() {
    let json = r#"{
        "parts": {"b": {"primitive": "box", "width": 1, "height": 1, "depth": 1}}
    }"#;
    let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
    builder.build(document(json)).unwrap();
    let rebuilt = builder.rebuild(document(json)).unwrap();
    assert!(rebuilt.is_empty());
    assert!(builder.registry().exists("b"));
}

// ============================================
// 8. Export selection
// ============================================

#[test]
fn test_export_priority_chain() {
    let json = r#"{
        "parts": {
            "first": {"primitive": "box", "width": 1, "height": 1, "depth": 1},
            "second": {"primitive": "box", "width": 2, "height": 2, "depth": 2}
        },
        "operations": {
            "third": {"operation": "union", "inputs": ["first", "second"]}
        },
        "export": {"default_part": "second"}
    }"#;
    let builder = build(json);

    // Explicit name wins over config; config wins over last operation
    assert_eq!(builder.export_part(Some("first")).as_deref(), Some("first"));
    assert_eq!(builder.export_part(None).as_deref(), Some("second"));

    let no_config = build(
        r#"{
            "parts": {
                "first": {"primitive": "box", "width": 1, "height": 1, "depth": 1}
            },
            "operations": {
                "third": {"type": "linear", "input": "first",
                          "direction": "X", "count": 2, "spacing": 3}
            }
        }"#,
    );
    // Pattern op emits third_0/third_1, not `third`; falls through to the
    // first declared part
    assert_eq!(no_config.export_part(None).as_deref(), Some("first"));
}

#[test]
fn test_export_through_backend() {
    let builder = build(
        r#"{
            "parts": {"b": {"primitive": "box", "width": 1, "height": 1, "depth": 1}},
            "export": {"default_part": "b", "formats": ["stl", "step"]}
        }"#,
    );
    builder
        .export(ExportFormat::Stl, std::path::Path::new("/tmp/out.stl"), None)
        .unwrap();
    builder
        .export(ExportFormat::Step, std::path::Path::new("/tmp/out.step"), None)
        .unwrap();
    assert!(builder
        .export(ExportFormat::ThreeMf, std::path::Path::new("/tmp/out.3mf"), None)
        .is_err());
}
