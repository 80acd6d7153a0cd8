//! Revolve builder.
//!
//! Revolves a sketch profile about a world axis through an origin point.
//! The angle must be in (0, 360], defaulting to a full revolution.
//! Additive shapes are revolved and unioned, subtractive shapes revolved
//! and cut.

use tracing::info;

use crate::backend::BooleanOp;
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::spatial::Axis;
use crate::value::Value;

/// Builds a revolve operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let sketch_name = view.str_field("sketch")?;
    let axis_name = view.str_field("axis")?;
    let axis = Axis::parse(axis_name)
        .ok_or_else(|| view.invalid("axis", format!("'{}' is not one of X, Y, Z", axis_name)))?;

    let angle = view.f64_or("angle", 360.0)?;
    if angle <= 0.0 || angle > 360.0 {
        return Err(view.invalid("angle", format!("must be in (0, 360], got {}", angle)));
    }

    let axis_origin = view.triple_or("origin", [0.0; 3])?;

    let sketch = ctx
        .sketches
        .get(sketch_name)
        .ok_or_else(|| BuildError::MissingReference {
            path: format!("operations.{}.sketch", name),
            name: sketch_name.to_string(),
            available: ctx.sketches.keys().cloned().collect(),
        })?
        .clone();

    let mut solid = None;
    for shape in sketch.additive_shapes() {
        let revolved = ctx.backend.revolve(
            shape,
            sketch.plane,
            sketch.origin,
            axis.unit_array(),
            axis_origin,
            angle,
        )?;
        solid = Some(match solid {
            None => revolved,
            Some(current) => ctx.backend.combine(BooleanOp::Union, &current, &revolved)?,
        });
    }
    let mut solid = solid.ok_or_else(|| {
        view.invalid("sketch", format!("sketch '{}' has no additive shapes", sketch_name))
    })?;

    for shape in sketch.subtractive_shapes() {
        let revolved = ctx.backend.revolve(
            shape,
            sketch.plane,
            sketch.origin,
            axis.unit_array(),
            axis_origin,
            angle,
        )?;
        solid = ctx
            .backend
            .combine(BooleanOp::Difference, &solid, &revolved)?;
    }

    let mut metadata = indexmap::IndexMap::new();
    metadata.insert("operation_type".to_string(), Value::Str("revolve".to_string()));
    metadata.insert("source".to_string(), Value::Str(sketch_name.to_string()));
    metadata.insert("angle".to_string(), Value::Float(angle));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(None, metadata, Some(&overrides));

    let part = Part::new(name, solid, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        sketch = sketch_name,
        axis = axis_name,
        angle,
        "built revolve"
    );
    Ok(())
}
