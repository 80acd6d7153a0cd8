//! Convex hull builder.
//!
//! Gathers the tessellated vertices of every input part and asks the
//! backend for their convex hull. A single input passes through as a
//! clone. Coplanar point sets are degenerate and rejected.

use nalgebra::Vector3;
use tracing::info;

use crate::build::boolean::expand_part_list;
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::value::Value;

const COPLANAR_EPS: f64 = 1e-9;

/// Builds a hull operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let input_values = view.list_field("inputs")?;
    if input_values.is_empty() {
        return Err(view.invalid("inputs", "hull requires at least 1 input"));
    }
    let inputs = expand_part_list(ctx.registry, input_values, view.path())?;

    let source_metadata = ctx.registry.get(&inputs[0])?.metadata.clone();

    let mut operation_metadata = indexmap::IndexMap::new();
    operation_metadata.insert("operation_type".to_string(), Value::Str("hull".to_string()));
    operation_metadata.insert("source".to_string(), Value::Str(inputs[0].clone()));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(Some(&source_metadata), operation_metadata, Some(&overrides));

    // Single input: the hull of one solid is the solid
    if inputs.len() == 1 {
        let clone = {
            let input = ctx.registry.get(&inputs[0])?;
            ctx.backend.clone_shape(&input.geometry)?
        };
        let mut part = Part::new(name, clone, metadata, ctx.backend)?;
        part.position = ctx.registry.get(&inputs[0])?.position;
        ctx.registry.add(part)?;
        info!(operation = name, input = %inputs[0], "hull of one input passes through");
        return Ok(());
    }

    let mut points = Vec::new();
    for input in &inputs {
        let part = ctx.registry.get(input)?;
        points.extend(ctx.backend.tessellate_vertices(&part.geometry)?);
    }

    if is_coplanar(&points) {
        return Err(view.invalid(
            "inputs",
            "input vertices are coplanar; hull would be degenerate",
        ));
    }

    let solid = ctx.backend.convex_hull(&points)?;
    let part = Part::new(name, solid, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        inputs = inputs.len(),
        points = points.len(),
        "built hull"
    );
    Ok(())
}

/// True when every point lies within `COPLANAR_EPS` of one plane.
fn is_coplanar(points: &[[f64; 3]]) -> bool {
    if points.len() < 4 {
        return true;
    }

    let p0 = Vector3::from(points[0]);

    // Find two independent directions to span a candidate plane
    let mut u = None;
    let mut normal = None;
    for p in &points[1..] {
        let d = Vector3::from(*p) - p0;
        if d.norm() < COPLANAR_EPS {
            continue;
        }
        match u {
            None => u = Some(d),
            Some(first) => {
                let n = first.cross(&d);
                if n.norm() > COPLANAR_EPS {
                    normal = Some(n.normalize());
                    break;
                }
            }
        }
    }

    let Some(normal) = normal else {
        // All points collinear, even more degenerate than coplanar
        return true;
    };

    points
        .iter()
        .all(|p| (Vector3::from(*p) - p0).dot(&normal).abs() < COPLANAR_EPS)
}
