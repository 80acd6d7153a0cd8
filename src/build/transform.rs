//! Transform builder and position tracking.
//!
//! Applies an ordered sequence of atomic transforms to a clone of the
//! input part. Translation updates the tracked position componentwise.
//! Rotation requires an explicit origin - `current` (the tracked position
//! at application time), `initial` (the center at construction), or an
//! absolute triple - and never defaults one; the tracked position follows
//! the same rotation through Rodrigues' formula.

use std::fmt::Write as _;

use tracing::{debug, info};

use crate::backend::{Backend, GeomHandle};
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::{Part, TransformRecord};
use crate::spatial::{resolve_axis, rotate_point};
use crate::value::Value;

/// Tracks geometry and position through a transform sequence.
pub struct TransformTracker {
    geometry: GeomHandle,
    /// Position at construction time
    pub initial_position: [f64; 3],
    /// Position after the transforms applied so far
    pub current_position: [f64; 3],
    history: Vec<TransformRecord>,
}

impl TransformTracker {
    /// Starts tracking from a geometry handle, reading the initial
    /// position from the backend.
    pub fn new(geometry: GeomHandle, backend: &dyn Backend) -> Result<Self, BuildError> {
        let initial = backend.center(&geometry)?;
        Ok(Self {
            geometry,
            initial_position: initial,
            current_position: initial,
            history: Vec::new(),
        })
    }

    /// Starts tracking from a known position instead of querying the
    /// backend (used when the input part already tracks one).
    pub fn with_position(geometry: GeomHandle, position: [f64; 3]) -> Self {
        Self {
            geometry,
            initial_position: position,
            current_position: position,
            history: Vec::new(),
        }
    }

    /// Applies one transform step.
    pub fn apply(
        &mut self,
        backend: &mut dyn Backend,
        step: &Value,
        path: &str,
    ) -> Result<(), BuildError> {
        let view = SpecView::new(path, step)?;
        let kind = view.str_field("type")?;
        let before = self.current_position;

        match kind {
            "translate" => {
                let offset = view.triple_field("offset")?;
                self.geometry = backend.translate(&self.geometry, offset)?;
                self.current_position = [
                    before[0] + offset[0],
                    before[1] + offset[1],
                    before[2] + offset[2],
                ];
            }
            "rotate" => {
                let angle = view.f64_field("angle")?;
                let axis_value = view.require("axis")?;
                let axis = resolve_axis(axis_value)
                    .map_err(|reason| view.invalid("axis", reason))?;

                let origin_value = view.opt("origin").ok_or_else(|| {
                    view.invalid(
                        "origin",
                        "rotate requires an explicit origin: 'current', 'initial', or [x, y, z]",
                    )
                })?;
                let origin = self.resolve_origin(origin_value, &view)?;

                let axis_start = origin;
                let axis_end = [origin[0] + axis.x, origin[1] + axis.y, origin[2] + axis.z];
                self.geometry = backend.rotate(&self.geometry, axis_start, axis_end, angle)?;
                self.current_position = rotate_point(before, angle, axis, origin);
                debug!(
                    angle,
                    origin = ?origin,
                    "rotated; tracked position {:?} -> {:?}",
                    before,
                    self.current_position
                );
            }
            other => {
                return Err(view.invalid(
                    "type",
                    format!("unknown transform type '{}'; supported: translate, rotate", other),
                ))
            }
        }

        self.history.push(TransformRecord {
            kind: kind.to_string(),
            params: step.clone(),
            position_before: before,
            position_after: self.current_position,
        });
        Ok(())
    }

    fn resolve_origin(
        &self,
        origin: &Value,
        view: &SpecView<'_>,
    ) -> Result<[f64; 3], BuildError> {
        if let Some(keyword) = origin.as_str() {
            return match keyword {
                "current" => Ok(self.current_position),
                "initial" => Ok(self.initial_position),
                other => Err(view.invalid(
                    "origin",
                    format!("unknown origin '{}'; use 'current', 'initial', or [x, y, z]", other),
                )),
            };
        }
        origin.as_triple().ok_or_else(|| {
            view.invalid("origin", "origin must be 'current', 'initial', or [x, y, z]")
        })
    }

    /// Consumes the tracker, returning the transformed geometry and the
    /// recorded history.
    pub fn finish(self) -> (GeomHandle, Vec<TransformRecord>) {
        (self.geometry, self.history)
    }

    /// Human-readable summary of the applied transforms.
    pub fn summary(&self) -> String {
        if self.history.is_empty() {
            return "no transforms applied".to_string();
        }
        let mut out = format!("transform sequence ({} steps):\n", self.history.len());
        for (i, record) in self.history.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} {:?} -> {:?}",
                i + 1,
                record.kind,
                record.position_before,
                record.position_after
            );
        }
        out
    }
}

/// Builds a transform operation: a transformed clone of the input part.
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

    let steps = view.list_field("transforms")?;

    let (geometry, position, source_metadata) = {
        let input = ctx.registry.get(input_name)?;
        (
            ctx.backend.clone_shape(&input.geometry)?,
            input.position,
            input.metadata.clone(),
        )
    };

    let mut tracker = TransformTracker::with_position(geometry, position);
    for (index, step) in steps.iter().enumerate() {
        let step_path = format!("{}.transforms.{}", view.path(), index);
        tracker.apply(ctx.backend, step, &step_path)?;
    }
    debug!(operation = name, "{}", tracker.summary());

    let (geometry, history) = tracker.finish();

    let mut operation_metadata = indexmap::IndexMap::new();
    operation_metadata.insert(
        "operation_type".to_string(),
        Value::Str("transform".to_string()),
    );
    operation_metadata.insert("source".to_string(), Value::Str(input_name.to_string()));
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(Some(&source_metadata), operation_metadata, Some(&overrides));

    let mut part = Part::new(name, geometry, metadata, ctx.backend)?;
    let final_position = history
        .last()
        .map(|r| r.position_after)
        .unwrap_or(position);
    part.position = final_position;
    part.history = history;
    ctx.registry.add(part)?;

    info!(operation = name, input = input_name, steps = steps.len(), "built transform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::build::tests::test_context;
    use crate::value_map;

    fn translate_step(dx: f64, dy: f64, dz: f64) -> Value {
        value_map! {
            "type" => "translate",
            "offset" => Value::List(vec![
                Value::Float(dx), Value::Float(dy), Value::Float(dz),
            ]),
        }
    }

    #[test]
    fn test_translate_updates_position() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);

        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![translate_step(5.0, -2.0, 1.0)]),
        };
        super::build(&mut fixture.ctx(), "moved", &spec).unwrap();

        let part = fixture.registry.get("moved").unwrap();
        assert_eq!(part.position, [5.0, -2.0, 1.0]);
        assert_eq!(part.history.len(), 1);
        assert_eq!(part.history[0].position_before, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rotate_requires_origin() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);

        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![value_map! {
                "type" => "rotate", "angle" => 45.0, "axis" => "Z",
            }]),
        };
        let err = super::build(&mut fixture.ctx(), "bad", &spec).unwrap_err();
        assert!(err.to_string().contains("explicit origin"));
    }

    #[test]
    fn test_rotate_about_current_tracks_rodrigues() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);

        // Move to (10, 0, 0), then rotate 90 deg about Z through the origin
        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![
                translate_step(10.0, 0.0, 0.0),
                value_map! {
                    "type" => "rotate", "angle" => 90.0, "axis" => "Z",
                    "origin" => Value::List(vec![
                        Value::Int(0), Value::Int(0), Value::Int(0),
                    ]),
                },
            ]),
        };
        super::build(&mut fixture.ctx(), "swung", &spec).unwrap();

        let part = fixture.registry.get("swung").unwrap();
        assert!((part.position[0] - 0.0).abs() < 1e-6);
        assert!((part.position[1] - 10.0).abs() < 1e-6);
        assert!((part.position[2] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotate_about_current_is_identity_for_position() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);

        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![
                translate_step(3.0, 0.0, 0.0),
                value_map! {
                    "type" => "rotate", "angle" => 90.0, "axis" => "Z",
                    "origin" => "current",
                },
            ]),
        };
        super::build(&mut fixture.ctx(), "spun", &spec).unwrap();

        // Rotating about its own tracked position leaves the position fixed
        let part = fixture.registry.get("spun").unwrap();
        assert!((part.position[0] - 3.0).abs() < 1e-6);
        assert!((part.position[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_preserves_appearance() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
        fixture
            .registry
            .get_mut("base")
            .unwrap()
            .metadata
            .insert("material".to_string(), Value::Str("brass".to_string()));

        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![translate_step(1.0, 0.0, 0.0)]),
        };
        super::build(&mut fixture.ctx(), "moved", &spec).unwrap();

        let part = fixture.registry.get("moved").unwrap();
        assert_eq!(
            part.metadata.get("material"),
            Some(&Value::Str("brass".to_string()))
        );
        assert_eq!(
            part.metadata.get("source"),
            Some(&Value::Str("base".to_string()))
        );
    }

    #[test]
    fn test_unknown_transform_type() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("base", 10.0, 10.0, 10.0, [0.0; 3]);
        let spec = value_map! {
            "input" => "base",
            "transforms" => Value::List(vec![value_map! {"type" => "scale", "factor" => 2.0}]),
        };
        assert!(super::build(&mut fixture.ctx(), "bad", &spec).is_err());
    }
}
