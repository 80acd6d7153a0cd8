//! Sweep builder.
//!
//! Sweeps a sketch profile along a path of points. Sharp-cornered hollow
//! profiles are known to be fragile in some kernels; the backend's error
//! is surfaced as-is with node context rather than retried.

use tracing::info;

use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::points::PointResolver;
use crate::value::Value;

/// Builds a sweep operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let sketch_name = view.str_field("sketch")?;
    let sketch = ctx
        .sketches
        .get(sketch_name)
        .ok_or_else(|| BuildError::MissingReference {
            path: format!("operations.{}.sketch", name),
            name: sketch_name.to_string(),
            available: ctx.sketches.keys().cloned().collect(),
        })?
        .clone();

    let path_values = view.list_field("path")?;
    if path_values.len() < 2 {
        return Err(view.invalid(
            "path",
            format!("sweep path needs at least 2 points, got {}", path_values.len()),
        ));
    }

    let path = {
        let resolver = PointResolver::new(ctx.registry, ctx.named_points, ctx.backend);
        let mut points = Vec::with_capacity(path_values.len());
        for value in path_values {
            points.push(resolver.resolve(value)?);
        }
        points
    };

    let profile = sketch
        .additive_shapes()
        .next()
        .ok_or_else(|| {
            view.invalid("sketch", format!("sketch '{}' has no additive shapes", sketch_name))
        })?
        .clone();

    let solid = ctx
        .backend
        .sweep(&profile, sketch.plane, sketch.origin, &path)?;

    let mut metadata = indexmap::IndexMap::new();
    metadata.insert("operation_type".to_string(), Value::Str("sweep".to_string()));
    metadata.insert("source".to_string(), Value::Str(sketch_name.to_string()));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(None, metadata, Some(&overrides));

    let part = Part::new(name, solid, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        sketch = sketch_name,
        path_points = path.len(),
        "built sweep"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::backend::MockBackend;
    use crate::build::tests::test_context;
    use crate::sketch::{Plane, Shape2d, ShapeOp, Sketch};
    use crate::value::Value;
    use crate::value_map;

    fn circle_sketch() -> Sketch {
        Sketch::new(
            "pipe",
            Plane::Xy,
            [0.0; 3],
            vec![Shape2d::Circle {
                radius: 2.0,
                center: [0.0, 0.0],
                op: ShapeOp::Add,
            }],
        )
        .unwrap()
    }

    fn point(x: f64, y: f64, z: f64) -> Value {
        Value::List(vec![Value::Float(x), Value::Float(y), Value::Float(z)])
    }

    #[test]
    fn test_sweep_along_path() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.sketches.insert("pipe".to_string(), circle_sketch());

        let spec = value_map! {
            "sketch" => "pipe",
            "path" => Value::List(vec![
                point(0.0, 0.0, 0.0),
                point(0.0, 0.0, 20.0),
                point(10.0, 0.0, 20.0),
            ]),
        };
        super::build(&mut fixture.ctx(), "tube", &spec).unwrap();

        let part = fixture.registry.get("tube").unwrap();
        let bbox = part.bounds(fixture.backend).unwrap();
        assert!(bbox.max[2] >= 20.0);
        assert!(bbox.max[0] >= 10.0);
    }

    #[test]
    fn test_sweep_needs_two_path_points() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.sketches.insert("pipe".to_string(), circle_sketch());
        let spec = value_map! {
            "sketch" => "pipe",
            "path" => Value::List(vec![point(0.0, 0.0, 0.0)]),
        };
        assert!(super::build(&mut fixture.ctx(), "bad", &spec).is_err());
    }
}
