//! Text operation builder: engrave and emboss.
//!
//! Renders text as a solid on a face of an existing part and cuts it in
//! (depth < 0, engrave) or unions it on (depth > 0, emboss). The position
//! is given in the selected face's local plane; the result is a new part
//! carrying the input's appearance metadata.

use tracing::info;

use crate::backend::{BooleanOp, FeatureKind};
use crate::build::primitive::text_spec_from;
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::selector::SelectorResolver;
use crate::spatial::{RefKind, SpatialRef};
use crate::value::Value;

/// Builds a text operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
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

    let text_spec = text_spec_from(&view)?;
    let face_selector = view.str_field("face")?;
    let position = view.pair_field("position")?;
    let depth = view.f64_field("depth")?;
    if depth == 0.0 {
        return Err(view.invalid("depth", "must be non-zero; negative engraves, positive embosses"));
    }
    let engrave = depth < 0.0;

    // Anchor the text on the selected face's local plane
    let (face_center, face_normal) = {
        let input = ctx.registry.get(input_name)?;
        let resolver = SelectorResolver::new(ctx.backend, &input.geometry);
        let faces = resolver.resolve(face_selector, FeatureKind::Face)?;
        let face = &faces[0];
        (face.center, face.normal.unwrap_or([0.0, 0.0, 1.0]))
    };
    let frame = SpatialRef::with_orientation(face_center, face_normal, RefKind::Face).frame();
    let anchor = frame.to_world([position[0], position[1], 0.0]);

    let text_solid = ctx.backend.make_text(&text_spec, depth.abs())?;
    // Engraving sinks the solid into the face; embossing sits on it
    let offset = if engrave {
        [
            anchor[0] - face_normal[0] * depth.abs(),
            anchor[1] - face_normal[1] * depth.abs(),
            anchor[2] - face_normal[2] * depth.abs(),
        ]
    } else {
        anchor
    };
    let placed = ctx.backend.translate(&text_solid, offset)?;

    let (geometry, source_metadata) = {
        let input = ctx.registry.get(input_name)?;
        let base = ctx.backend.clone_shape(&input.geometry)?;
        let op = if engrave {
            BooleanOp::Difference
        } else {
            BooleanOp::Union
        };
        (
            ctx.backend.combine(op, &base, &placed)?,
            input.metadata.clone(),
        )
    };

    let mut operation_metadata = indexmap::IndexMap::new();
    operation_metadata.insert("operation_type".to_string(), Value::Str("text".to_string()));
    operation_metadata.insert("source".to_string(), Value::Str(input_name.to_string()));
    operation_metadata.insert(
        "text_operation".to_string(),
        Value::Str(if engrave { "engrave" } else { "emboss" }.to_string()),
    );
    operation_metadata.insert("depth".to_string(), Value::Float(depth));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(Some(&source_metadata), operation_metadata, Some(&overrides));

    let part = Part::new(name, geometry, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        input = input_name,
        engrave,
        "built text operation"
    );
    Ok(())
}
