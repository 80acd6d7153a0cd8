//! Sketch builder.
//!
//! Turns a `sketches:` declaration into a validated [`Sketch`]: plane,
//! origin, and one [`Shape2d`] per entry in `shapes`.

use tracing::info;

use crate::build::spec::SpecView;
use crate::build::{primitive, BuildContext};
use crate::error::BuildError;
use crate::sketch::{Plane, Shape2d, ShapeOp, Sketch};
use crate::value::Value;

/// Builds a sketch and stores it in the build context.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("sketches.{}", name), &resolved)?;

    let plane = view.enum_or("plane", Plane::Xy, Plane::parse, "XY, XZ, YZ")?;
    let origin = view.triple_or("origin", [0.0; 3])?;

    let shape_specs = view.list_field("shapes")?;
    let mut shapes = Vec::with_capacity(shape_specs.len());
    for (index, shape_spec) in shape_specs.iter().enumerate() {
        shapes.push(build_shape(name, index, shape_spec)?);
    }

    let sketch = Sketch::new(name, plane, origin, shapes)?;
    info!(
        sketch = name,
        plane = plane.name(),
        shapes = sketch.shapes.len(),
        "built sketch"
    );
    ctx.sketches.insert(name.to_string(), sketch);
    Ok(())
}

/// Builds a single shape from its spec entry.
pub(crate) fn build_shape(
    sketch_name: &str,
    index: usize,
    spec: &Value,
) -> Result<Shape2d, BuildError> {
    let view = SpecView::new(format!("sketches.{}.shapes.{}", sketch_name, index), spec)?;

    let op = view.enum_or("operation", ShapeOp::Add, ShapeOp::parse, "add, subtract")?;
    let kind = view.str_field("type")?;

    match kind {
        "rectangle" => Ok(Shape2d::Rectangle {
            width: view.positive_f64("width")?,
            height: view.positive_f64("height")?,
            center: view.pair_or("center", [0.0, 0.0])?,
            op,
        }),
        "circle" => Ok(Shape2d::Circle {
            radius: view.positive_f64("radius")?,
            center: view.pair_or("center", [0.0, 0.0])?,
            op,
        }),
        "polygon" => {
            let point_values = view.list_field("points")?;
            if point_values.len() < 3 {
                return Err(view.invalid(
                    "points",
                    format!("polygon needs at least 3 points, got {}", point_values.len()),
                ));
            }
            let mut points = Vec::with_capacity(point_values.len());
            for point in point_values {
                points.push(
                    point
                        .as_pair()
                        .ok_or_else(|| view.invalid("points", "each point must be [x, y]"))?,
                );
            }
            Ok(Shape2d::Polygon {
                points,
                closed: view.bool_or("closed", true)?,
                op,
            })
        }
        "text" => Ok(Shape2d::Text {
            spec: primitive::text_spec_from(&view)?,
            position: view.pair_or("position", [0.0, 0.0])?,
            op,
        }),
        other => Err(view.invalid(
            "type",
            format!(
                "unknown shape type '{}'; supported: rectangle, circle, polygon, text",
                other
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::build::tests::test_context;
    use crate::value_map;

    fn shape_list(shapes: Vec<Value>) -> Value {
        Value::List(shapes)
    }

    #[test]
    fn test_mixed_sketch() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        let spec = value_map! {
            "plane" => "XY",
            "origin" => Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
            "shapes" => shape_list(vec![
                value_map! {"type" => "rectangle", "width" => 50.0, "height" => 20.0},
                value_map! {
                    "type" => "circle", "radius" => 3.0,
                    "operation" => "subtract"
                },
            ]),
        };
        super::build(&mut fixture.ctx(), "profile", &spec).unwrap();

        let sketch = &fixture.sketches["profile"];
        assert_eq!(sketch.plane, Plane::Xy);
        assert_eq!(sketch.additive_shapes().count(), 1);
        assert_eq!(sketch.subtractive_shapes().count(), 1);
    }

    #[test]
    fn test_all_subtract_rejected() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        let spec = value_map! {
            "shapes" => shape_list(vec![value_map! {
                "type" => "circle", "radius" => 1.0, "operation" => "subtract"
            }]),
        };
        assert!(super::build(&mut fixture.ctx(), "holes", &spec).is_err());
    }

    #[test]
    fn test_invalid_plane() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        let spec = value_map! {
            "plane" => "XW",
            "shapes" => shape_list(vec![value_map! {
                "type" => "rectangle", "width" => 1.0, "height" => 1.0
            }]),
        };
        assert!(super::build(&mut fixture.ctx(), "bad", &spec).is_err());
    }

    #[test]
    fn test_polygon_needs_three_points() {
        let err = build_shape(
            "s",
            0,
            &value_map! {
                "type" => "polygon",
                "points" => Value::List(vec![
                    Value::List(vec![Value::Int(0), Value::Int(0)]),
                    Value::List(vec![Value::Int(1), Value::Int(0)]),
                ]),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 3 points"));
    }

    #[test]
    fn test_parameters_in_shapes() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.set_parameter("w", Value::Int(40));
        let spec = value_map! {
            "shapes" => shape_list(vec![value_map! {
                "type" => "rectangle", "width" => "${w}", "height" => "${w / 2}"
            }]),
        };
        super::build(&mut fixture.ctx(), "scaled", &spec).unwrap();

        match &fixture.sketches["scaled"].shapes[0] {
            Shape2d::Rectangle { width, height, .. } => {
                assert_eq!(*width, 40.0);
                assert_eq!(*height, 20.0);
            }
            other => panic!("expected rectangle, got {:?}", other),
        }
    }
}
