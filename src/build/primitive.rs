//! Primitive part builder.
//!
//! Variants: box, cylinder, sphere, cone, torus, text. All dimensions are
//! strictly positive. An optional `position` translates the primitive after
//! construction; `color`/`material` become appearance metadata.

use tracing::info;

use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::sketch::{FontStyle, HAlign, TextSpec, VAlign};
use crate::build::spec::SpecView;
use crate::value::Value;

/// Builds a primitive declared in the `parts:` section.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("parts.{}", name), &resolved)?;

    let kind = view.str_field("primitive")?;
    let geometry = match kind {
        "box" => {
            let width = view.positive_f64("width")?;
            let height = view.positive_f64("height")?;
            let depth = view.positive_f64("depth")?;
            ctx.backend.make_box(width, height, depth)?
        }
        "cylinder" => {
            let radius = view.positive_f64("radius")?;
            let height = view.positive_f64("height")?;
            ctx.backend.make_cylinder(radius, height)?
        }
        "sphere" => {
            let radius = view.positive_f64("radius")?;
            ctx.backend.make_sphere(radius)?
        }
        "cone" => {
            let bottom = view.positive_f64("radius1")?;
            let top = view.positive_f64("radius2")?;
            let height = view.positive_f64("height")?;
            ctx.backend.make_cone(bottom, top, height)?
        }
        "torus" => {
            let major = view.positive_f64("major_radius")?;
            let minor = view.positive_f64("minor_radius")?;
            ctx.backend.make_torus(major, minor)?
        }
        "text" => {
            let text_spec = text_spec_from(&view)?;
            let height = view.positive_f64("height")?;
            ctx.backend.make_text(&text_spec, height)?
        }
        other => {
            return Err(view.invalid(
                "primitive",
                format!(
                    "unknown primitive '{}'; supported: box, cylinder, sphere, cone, torus, text",
                    other
                ),
            ))
        }
    };

    let geometry = match view.opt("position") {
        Some(position) => {
            let offset = position
                .as_triple()
                .ok_or_else(|| view.invalid("position", "must be [x, y, z]"))?;
            ctx.backend.translate(&geometry, offset)?
        }
        None => geometry,
    };

    let mut metadata = indexmap::IndexMap::new();
    metadata.insert("primitive_type".to_string(), Value::Str(kind.to_string()));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(None, metadata, Some(&overrides));

    let part = Part::new(name, geometry, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(part = name, primitive = kind, "built primitive");
    Ok(())
}

/// Reads the text settings shared by the text primitive, text sketch
/// shapes, and the engrave/emboss operation.
pub(crate) fn text_spec_from(view: &SpecView<'_>) -> Result<TextSpec, BuildError> {
    let text = view.str_field("text")?;
    if text.trim().is_empty() {
        return Err(view.invalid("text", "text cannot be empty"));
    }
    let size = view.positive_f64("size")?;

    let mut spec = TextSpec::new(text, size);
    if let Some(font) = view.opt_str("font")? {
        spec.font = font.to_string();
    }
    spec.font_path = view.opt_str("font_path")?.map(str::to_string);
    spec.style = view.enum_or(
        "style",
        FontStyle::Regular,
        FontStyle::parse,
        "regular, bold, italic, bold-italic",
    )?;
    spec.halign = view.enum_or("halign", HAlign::Left, HAlign::parse, "left, center, right")?;
    spec.valign = view.enum_or(
        "valign",
        VAlign::Baseline,
        VAlign::parse,
        "top, center, baseline, bottom",
    )?;

    let spacing = view.f64_or("spacing", 1.0)?;
    if spacing <= 0.0 {
        return Err(view.invalid("spacing", format!("must be positive, got {}", spacing)));
    }
    spec.spacing = spacing;

    Ok(spec)
}
