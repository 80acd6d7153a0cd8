//! Reference builder.
//!
//! Computes a [`SpatialRef`] from `{part, face|edge|vertex, at}` and
//! stores it in the named-reference table. The reference's position is
//! also registered as a named point so point expressions can use the
//! reference by name.

use tracing::info;

use crate::backend::FeatureKind;
use crate::build::spec::SpecView;
use crate::build::BuildContext;
use crate::error::BuildError;
use crate::points::PointResolver;
use crate::spatial::{RefKind, SpatialRef};
use crate::value::Value;

/// Builds a reference declaration.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("references.{}", name), &resolved)?;

    let part_name = view.str_field("part")?;

    let (kind, selector) = if let Some(sel) = view.opt_str("face")? {
        (FeatureKind::Face, sel)
    } else if let Some(sel) = view.opt_str("edge")? {
        (FeatureKind::Edge, sel)
    } else if let Some(sel) = view.opt_str("vertex")? {
        (FeatureKind::Vertex, sel)
    } else {
        return Err(view.invalid(
            "part",
            "reference must have one of 'face', 'edge', or 'vertex'",
        ));
    };
    let location = view.opt_str("at")?.unwrap_or("center");

    let spatial_ref = {
        let resolver = PointResolver::new(ctx.registry, ctx.named_points, ctx.backend);
        let feature = resolver.select_feature(part_name, kind, selector, view.path())?;

        let mut point_spec = indexmap::IndexMap::new();
        point_spec.insert("part".to_string(), Value::Str(part_name.to_string()));
        point_spec.insert(
            kind.name().to_string(),
            Value::Str(selector.to_string()),
        );
        point_spec.insert("at".to_string(), Value::Str(location.to_string()));
        let position = resolver.resolve(&Value::Map(point_spec))?;

        match kind {
            FeatureKind::Face => match feature.normal {
                Some(normal) => SpatialRef::with_orientation(position, normal, RefKind::Face),
                None => SpatialRef {
                    kind: RefKind::Face,
                    ..SpatialRef::point(position)
                },
            },
            FeatureKind::Edge => match feature.direction {
                Some(direction) => SpatialRef::with_orientation(position, direction, RefKind::Edge),
                None => SpatialRef {
                    kind: RefKind::Edge,
                    ..SpatialRef::point(position)
                },
            },
            FeatureKind::Vertex => SpatialRef::point(position),
        }
    };

    ctx.named_points
        .insert(name.to_string(), spatial_ref.position_array());
    ctx.references.insert(name.to_string(), spatial_ref);
    info!(
        reference = name,
        part = part_name,
        kind = kind.name(),
        "computed reference"
    );
    Ok(())
}
