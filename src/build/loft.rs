//! Loft builder.
//!
//! Blends between two or more sketch profiles. All profiles must share a
//! base plane; each is instantiated at its declared offset along the plane
//! normal, relative to the first profile. Subtractive shapes in profiles
//! are ignored with a warning.

use tracing::{info, warn};

use crate::backend::LoftSection;
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::Part;
use crate::value::Value;

/// Builds a loft operation.
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let profile_values = view.list_field("profiles")?;
    if profile_values.len() < 2 {
        return Err(view.invalid(
            "profiles",
            format!("loft requires at least 2 profiles, got {}", profile_values.len()),
        ));
    }
    let ruled = view.bool_or("ruled", false)?;

    let mut profiles = Vec::with_capacity(profile_values.len());
    for value in profile_values {
        let profile_name = value
            .as_str()
            .ok_or_else(|| view.invalid("profiles", "profile entries must be sketch names"))?;
        let sketch = ctx
            .sketches
            .get(profile_name)
            .ok_or_else(|| BuildError::MissingReference {
                path: format!("operations.{}.profiles", name),
                name: profile_name.to_string(),
                available: ctx.sketches.keys().cloned().collect(),
            })?;
        profiles.push(sketch.clone());
    }

    let base_plane = profiles[0].plane;
    if profiles.iter().any(|p| p.plane != base_plane) {
        let planes: Vec<&str> = profiles.iter().map(|p| p.plane.name()).collect();
        return Err(view.invalid(
            "profiles",
            format!("all profiles must share one base plane, found: {}", planes.join(", ")),
        ));
    }

    let base_offset = profiles[0].normal_offset();
    let mut sections = Vec::with_capacity(profiles.len());
    for profile in &profiles {
        if profile.subtractive_shapes().count() > 0 {
            warn!(
                operation = name,
                profile = %profile.name,
                "loft ignores subtractive shapes in profiles"
            );
        }
        let shape = profile
            .additive_shapes()
            .next()
            .ok_or_else(|| {
                view.invalid(
                    "profiles",
                    format!("profile '{}' has no additive shapes", profile.name),
                )
            })?
            .clone();
        sections.push(LoftSection {
            shape,
            offset: profile.normal_offset() - base_offset,
        });
    }

    let solid = ctx.backend.loft(&sections, base_plane, ruled)?;

    let mut metadata = indexmap::IndexMap::new();
    metadata.insert("operation_type".to_string(), Value::Str("loft".to_string()));
    metadata.insert(
        "source".to_string(),
        Value::Str(profiles[0].name.clone()),
    );
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(None, metadata, Some(&overrides));

    let part = Part::new(name, solid, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(
        operation = name,
        profiles = profiles.len(),
        ruled,
        "built loft"
    );
    Ok(())
}
