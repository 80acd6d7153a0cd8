//! Finishing builder: fillet and chamfer.
//!
//! The one intentionally mutating operation: the input part keeps its
//! registry name and gets its geometry replaced, with a record appended to
//! its `finishing_ops` metadata so consumers can observe what was applied.
//!
//! Edge selection: the literal `"all"`, or a mapping with exactly one of
//! `direction`, `parallel_to`, `perpendicular_to` (axis names or unit
//! vectors; non-unit vectors are rejected), or `selector` (a raw feature
//! selector string).

use nalgebra::Vector3;
use tracing::info;

use crate::backend::{Feature, FeatureKind};
use crate::build::spec::SpecView;
use crate::build::BuildContext;
use crate::error::BuildError;
use crate::selector::SelectorResolver;
use crate::value::Value;
use crate::value_map;

const UNIT_EPS: f64 = 1e-6;
const ALIGN_EPS: f64 = 1e-6;

/// Builds a finishing operation. `finish` is `fillet` or `chamfer`,
/// already extracted by the dispatcher.
pub(crate) fn build(
    ctx: &mut BuildContext<'_>,
    name: &str,
    finish: &str,
    spec: &Value,
) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let input_name = view.str_field("input")?;
    if !ctx.registry.exists(input_name) {
        return Err(BuildError::MissingReference {
            path: format!("{}.input", view.path()),
            name: input_name.to_string(),
            available: ctx.registry.names(),
        });
    }

    let edges_spec = view.opt("edges").cloned().unwrap_or_else(|| Value::Str("all".to_string()));
    let edges = {
        let input = ctx.registry.get(input_name)?;
        select_edges(ctx.backend, &input.geometry, &edges_spec, &view)?
    };

    let record;
    let new_geometry = match finish {
        "fillet" => {
            let radius = view.positive_f64("radius")?;
            record = value_map! {
                "finish" => "fillet",
                "radius" => radius,
                "edges" => Value::Int(edges.len() as i64),
            };
            let input = ctx.registry.get(input_name)?;
            ctx.backend.fillet(&input.geometry, &edges, radius)?
        }
        "chamfer" => {
            let length = view.positive_f64("length")?;
            let length2 = match view.opt("length2") {
                None | Some(Value::Null) => None,
                Some(value) => {
                    let l2 = value
                        .as_f64()
                        .ok_or_else(|| view.invalid("length2", "must be a number"))?;
                    if l2 <= 0.0 {
                        return Err(view.invalid("length2", format!("must be positive, got {}", l2)));
                    }
                    Some(l2)
                }
            };
            record = value_map! {
                "finish" => "chamfer",
                "length" => length,
                "length2" => length2.map(Value::Float).unwrap_or(Value::Null),
                "edges" => Value::Int(edges.len() as i64),
            };
            let input = ctx.registry.get(input_name)?;
            ctx.backend.chamfer(&input.geometry, &edges, length, length2)?
        }
        other => {
            return Err(view.invalid(
                "finish",
                format!("unknown finishing operation '{}'; supported: fillet, chamfer", other),
            ))
        }
    };

    // Mutate in place: same name, new geometry, one more finishing_ops
    // entry
    let part = ctx.registry.get_mut(input_name)?;
    part.geometry = new_geometry;
    match part.metadata.get_mut("finishing_ops") {
        Some(Value::List(ops)) => ops.push(record),
        _ => {
            part.metadata
                .insert("finishing_ops".to_string(), Value::List(vec![record]));
        }
    }

    info!(
        operation = name,
        input = input_name,
        finish,
        edges = edges.len(),
        "applied finishing"
    );
    Ok(())
}

/// Resolves the `edges` field to a concrete edge set.
fn select_edges(
    backend: &mut dyn crate::backend::Backend,
    geometry: &crate::backend::GeomHandle,
    edges_spec: &Value,
    view: &SpecView<'_>,
) -> Result<Vec<Feature>, BuildError> {
    if let Some(keyword) = edges_spec.as_str() {
        if keyword == "all" {
            let edges = backend.edges(geometry)?;
            return Ok(edges);
        }
        return Err(view.invalid(
            "edges",
            format!("'{}' is not 'all'; use a mapping to filter edges", keyword),
        ));
    }

    let Some(map) = edges_spec.as_map() else {
        return Err(view.invalid("edges", "must be 'all' or a mapping"));
    };

    if let Some(selector) = map.get("selector").and_then(Value::as_str) {
        let resolver = SelectorResolver::new(backend, geometry);
        let edges = resolver.resolve(selector, FeatureKind::Edge)?;
        return Ok(edges);
    }

    let (field, want_parallel) = if map.contains_key("direction") {
        ("direction", true)
    } else if map.contains_key("parallel_to") {
        ("parallel_to", true)
    } else if map.contains_key("perpendicular_to") {
        ("perpendicular_to", false)
    } else {
        return Err(view.invalid(
            "edges",
            "mapping must have one of: direction, parallel_to, perpendicular_to, selector",
        ));
    };

    let direction = edge_direction(map.get(field).unwrap_or(&Value::Null), view, field)?;
    let all_edges = backend.edges(geometry)?;
    let selected: Vec<Feature> = all_edges
        .into_iter()
        .filter(|edge| {
            let Some(d) = edge.direction else {
                return false;
            };
            let dot = (d[0] * direction.x + d[1] * direction.y + d[2] * direction.z).abs();
            if want_parallel {
                (dot - 1.0).abs() < ALIGN_EPS
            } else {
                dot < ALIGN_EPS
            }
        })
        .collect();

    if selected.is_empty() {
        return Err(view.invalid(field, "matched no edges"));
    }
    Ok(selected)
}

/// Parses an axis name or unit-vector triple. Non-unit vectors are
/// rejected rather than silently normalized.
fn edge_direction(
    value: &Value,
    view: &SpecView<'_>,
    field: &str,
) -> Result<Vector3<f64>, BuildError> {
    if let Some(name) = value.as_str() {
        return crate::spatial::Axis::parse(name)
            .map(crate::spatial::Axis::unit)
            .ok_or_else(|| view.invalid(field, format!("'{}' is not one of X, Y, Z", name)));
    }
    if let Some(triple) = value.as_triple() {
        let v = Vector3::new(triple[0], triple[1], triple[2]);
        if (v.norm() - 1.0).abs() > UNIT_EPS {
            return Err(view.invalid(
                field,
                format!("must be a unit vector, got length {}", v.norm()),
            ));
        }
        return Ok(v);
    }
    Err(view.invalid(field, "must be an axis name (X, Y, Z) or a unit vector"))
}

#[cfg(test)]
mod tests {
    use crate::backend::MockBackend;
    use crate::build::tests::test_context;
    use crate::value::Value;
    use crate::value_map;

    #[test]
    fn test_fillet_mutates_in_place() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 20.0, 20.0, 5.0, [0.0; 3]);
        let before = fixture.registry.len();

        let spec = value_map! {"input" => "base", "radius" => 2.0, "edges" => "all"};
        super::build(&mut fixture.ctx(), "round_it", "fillet", &spec).unwrap();

        // No new registry entry; finishing_ops grew by one
        assert_eq!(fixture.registry.len(), before);
        let part = fixture.registry.get("base").unwrap();
        match part.metadata.get("finishing_ops") {
            Some(Value::List(ops)) => assert_eq!(ops.len(), 1),
            other => panic!("expected finishing_ops list, got {:?}", other),
        }
    }

    #[test]
    fn test_second_finishing_appends() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 20.0, 20.0, 5.0, [0.0; 3]);

        let fillet = value_map! {"input" => "base", "radius" => 2.0, "edges" => "all"};
        super::build(&mut fixture.ctx(), "f1", "fillet", &fillet).unwrap();
        let chamfer = value_map! {"input" => "base", "length" => 1.0, "edges" => "all"};
        super::build(&mut fixture.ctx(), "f2", "chamfer", &chamfer).unwrap();

        let part = fixture.registry.get("base").unwrap();
        match part.metadata.get("finishing_ops") {
            Some(Value::List(ops)) => assert_eq!(ops.len(), 2),
            other => panic!("expected finishing_ops list, got {:?}", other),
        }
    }

    #[test]
    fn test_direction_edge_filter() {
        let mut backend = MockBackend::new();
        {
            let mut fixture = test_context(&mut backend);
            fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
            let spec = value_map! {
                "input" => "base", "radius" => 1.0,
                "edges" => value_map! {"direction" => "Z"},
            };
            super::build(&mut fixture.ctx(), "vert", "fillet", &spec).unwrap();
        }
        // 4 vertical edges on a box
        assert!(backend
            .operations()
            .iter()
            .any(|op| op.contains("fillet") && op.contains("4 edges")));
    }

    #[test]
    fn test_non_unit_vector_rejected() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
        let spec = value_map! {
            "input" => "base", "radius" => 1.0,
            "edges" => value_map! {
                "parallel_to" => Value::List(vec![
                    Value::Int(0), Value::Int(0), Value::Int(2),
                ]),
            },
        };
        let err = super::build(&mut fixture.ctx(), "bad", "fillet", &spec).unwrap_err();
        assert!(err.to_string().contains("unit vector"));
    }

    #[test]
    fn test_selector_edges() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
        let spec = value_map! {
            "input" => "base", "length" => 0.5,
            "edges" => value_map! {"selector" => "|Z and >X"},
        };
        super::build(&mut fixture.ctx(), "bevel", "chamfer", &spec).unwrap();
        assert!(fixture
            .backend
            .operations()
            .iter()
            .any(|op| op.contains("chamfer") && op.contains("2 edges")));
    }

    #[test]
    fn test_radius_must_be_positive() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
        let spec = value_map! {"input" => "base", "radius" => 0.0, "edges" => "all"};
        assert!(super::build(&mut fixture.ctx(), "bad", "fillet", &spec).is_err());
    }
}
