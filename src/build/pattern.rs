//! Pattern builder.
//!
//! Emits N clones of one input part, named `name_0 .. name_N-1`, with
//! appearance metadata preserved and pattern bookkeeping attached.
//!
//! Variants:
//! - linear: `direction`, `count`, `spacing`; copy i moves `i * spacing`
//!   along the direction
//! - circular: `count`, `angle` (total sweep, default 360), `axis`,
//!   `center`; copies rotate at equal increments
//! - grid: `directions`, `counts`, `spacings`; copies carry `(row, col)`
//!   metadata

use nalgebra::Vector3;
use tracing::info;

use crate::build::spec::SpecView;
use crate::build::BuildContext;
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::spatial::{resolve_axis, rotate_point};
use crate::value::Value;

/// Builds a pattern operation. `kind` is the pattern variant, already
/// extracted from `type`/`pattern` by the dispatcher.
pub(crate) fn build(
    ctx: &mut BuildContext<'_>,
    name: &str,
    kind: &str,
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

    match kind {
        "linear" => linear(ctx, name, input_name, &view),
        "circular" => circular(ctx, name, input_name, &view),
        "grid" => grid(ctx, name, input_name, &view),
        other => Err(view.invalid(
            "type",
            format!("unknown pattern type '{}'; supported: linear, circular, grid", other),
        )),
    }
}

fn base_metadata(
    ctx: &BuildContext<'_>,
    input_name: &str,
    pattern_type: &str,
    index: usize,
) -> Result<indexmap::IndexMap<String, Value>, BuildError> {
    let source = ctx.registry.get(input_name)?;
    let mut operation_metadata = indexmap::IndexMap::new();
    operation_metadata.insert(
        "operation_type".to_string(),
        Value::Str("pattern".to_string()),
    );
    operation_metadata.insert(
        "pattern_type".to_string(),
        Value::Str(pattern_type.to_string()),
    );
    operation_metadata.insert("pattern_index".to_string(), Value::Int(index as i64));
    operation_metadata.insert("source".to_string(), Value::Str(input_name.to_string()));
    Ok(copy_propagating(
        Some(&source.metadata),
        operation_metadata,
        None,
    ))
}

fn linear(
    ctx: &mut BuildContext<'_>,
    name: &str,
    input_name: &str,
    view: &SpecView<'_>,
) -> Result<(), BuildError> {
    let direction = resolve_axis(view.require("direction")?)
        .map_err(|reason| view.invalid("direction", reason))?;
    let count = view.count_field("count", 1)?;
    let spacing = view.f64_field("spacing")?;

    for index in 0..count {
        let offset = direction * (index as f64 * spacing);
        let copy_name = format!("{}_{}", name, index);
        let metadata = base_metadata(ctx, input_name, "linear", index)?;

        let (geometry, position) = {
            let input = ctx.registry.get(input_name)?;
            let clone = ctx.backend.clone_shape(&input.geometry)?;
            (
                ctx.backend.translate(&clone, [offset.x, offset.y, offset.z])?,
                input.position,
            )
        };

        let mut part = Part::new(copy_name, geometry, metadata, ctx.backend)?;
        part.position = [
            position[0] + offset.x,
            position[1] + offset.y,
            position[2] + offset.z,
        ];
        ctx.registry.add(part)?;
    }

    info!(operation = name, input = input_name, count, "built linear pattern");
    Ok(())
}

fn circular(
    ctx: &mut BuildContext<'_>,
    name: &str,
    input_name: &str,
    view: &SpecView<'_>,
) -> Result<(), BuildError> {
    let count = view.count_field("count", 1)?;
    let total_angle = view.f64_or("angle", 360.0)?;
    let axis = resolve_axis(view.require("axis")?)
        .map_err(|reason| view.invalid("axis", reason))?;
    let center = view.triple_or("center", [0.0; 3])?;

    // A full sweep steps angle/count so the last copy does not land back
    // on the first; a partial sweep ends exactly on the boundary.
    let step = if count <= 1 {
        0.0
    } else if (total_angle - 360.0).abs() < 1e-9 {
        total_angle / count as f64
    } else {
        total_angle / (count - 1) as f64
    };

    for index in 0..count {
        let angle = step * index as f64;
        let copy_name = format!("{}_{}", name, index);
        let mut metadata = base_metadata(ctx, input_name, "circular", index)?;
        metadata.insert("angle".to_string(), Value::Float(angle));

        let axis_end = [center[0] + axis.x, center[1] + axis.y, center[2] + axis.z];
        let (geometry, position) = {
            let input = ctx.registry.get(input_name)?;
            let clone = ctx.backend.clone_shape(&input.geometry)?;
            (
                ctx.backend.rotate(&clone, center, axis_end, angle)?,
                input.position,
            )
        };

        let mut part = Part::new(copy_name, geometry, metadata, ctx.backend)?;
        part.position = rotate_point(position, angle, axis, center);
        ctx.registry.add(part)?;
    }

    info!(
        operation = name,
        input = input_name,
        count,
        sweep = total_angle,
        "built circular pattern"
    );
    Ok(())
}

fn grid(
    ctx: &mut BuildContext<'_>,
    name: &str,
    input_name: &str,
    view: &SpecView<'_>,
) -> Result<(), BuildError> {
    let directions = view.list_field("directions")?;
    if directions.len() != 2 {
        return Err(view.invalid("directions", "grid needs exactly 2 directions"));
    }
    let dir_a = resolve_axis(&directions[0]).map_err(|reason| view.invalid("directions", reason))?;
    let dir_b = resolve_axis(&directions[1]).map_err(|reason| view.invalid("directions", reason))?;

    let counts = view.list_field("counts")?;
    let spacings = view.list_field("spacings")?;
    if counts.len() != 2 || spacings.len() != 2 {
        return Err(view.invalid("counts", "grid needs 2 counts and 2 spacings"));
    }
    let rows = counts[0]
        .as_i64()
        .filter(|&n| n >= 1)
        .ok_or_else(|| view.invalid("counts", "counts must be positive integers"))?
        as usize;
    let cols = counts[1]
        .as_i64()
        .filter(|&n| n >= 1)
        .ok_or_else(|| view.invalid("counts", "counts must be positive integers"))?
        as usize;
    let spacing_a = spacings[0]
        .as_f64()
        .ok_or_else(|| view.invalid("spacings", "spacings must be numbers"))?;
    let spacing_b = spacings[1]
        .as_f64()
        .ok_or_else(|| view.invalid("spacings", "spacings must be numbers"))?;

    let mut index = 0usize;
    for row in 0..rows {
        for col in 0..cols {
            let offset: Vector3<f64> =
                dir_a * (row as f64 * spacing_a) + dir_b * (col as f64 * spacing_b);
            let copy_name = format!("{}_{}", name, index);
            let mut metadata = base_metadata(ctx, input_name, "grid", index)?;
            metadata.insert(
                "grid_position".to_string(),
                Value::List(vec![Value::Int(row as i64), Value::Int(col as i64)]),
            );

            let (geometry, position) = {
                let input = ctx.registry.get(input_name)?;
                let clone = ctx.backend.clone_shape(&input.geometry)?;
                (
                    ctx.backend.translate(&clone, [offset.x, offset.y, offset.z])?,
                    input.position,
                )
            };

            let mut part = Part::new(copy_name, geometry, metadata, ctx.backend)?;
            part.position = [
                position[0] + offset.x,
                position[1] + offset.y,
                position[2] + offset.z,
            ];
            ctx.registry.add(part)?;
            index += 1;
        }
    }

    info!(
        operation = name,
        input = input_name,
        rows,
        cols,
        "built grid pattern"
    );
    Ok(())
}
