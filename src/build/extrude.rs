//! Extrude builder.
//!
//! Extrudes a sketch into a solid: additive shapes are extruded and
//! unioned, subtractive shapes are extruded and cut. Text shapes come out
//! of the backend already 3D, so the extrusion distance goes straight into
//! text construction instead of being applied twice.

use tracing::info;

use crate::backend::BooleanOp;
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::value::Value;

/// Builds an extrude operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let sketch_name = view.str_field("sketch")?;
    let distance = view.f64_field("distance")?;
    if distance == 0.0 {
        return Err(view.invalid("distance", "must be non-zero"));
    }
    let taper = view.f64_or("taper", 0.0)?;

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
        let extruded = ctx
            .backend
            .extrude(shape, sketch.plane, sketch.origin, distance, taper)?;
        solid = Some(match solid {
            None => extruded,
            Some(current) => ctx.backend.combine(BooleanOp::Union, &current, &extruded)?,
        });
    }
    let mut solid = solid.ok_or_else(|| {
        view.invalid("sketch", format!("sketch '{}' has no additive shapes", sketch_name))
    })?;

    for shape in sketch.subtractive_shapes() {
        let extruded = ctx
            .backend
            .extrude(shape, sketch.plane, sketch.origin, distance, taper)?;
        solid = ctx
            .backend
            .combine(BooleanOp::Difference, &solid, &extruded)?;
    }

    let mut metadata = indexmap::IndexMap::new();
    metadata.insert("operation_type".to_string(), Value::Str("extrude".to_string()));
    metadata.insert("source".to_string(), Value::Str(sketch_name.to_string()));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(None, metadata, Some(&overrides));

    let part = Part::new(name, solid, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        sketch = sketch_name,
        distance,
        "built extrude"
    );
    Ok(())
}
