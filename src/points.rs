//! Point expression resolution.
//!
//! A point expression is one of:
//!
//! 1. Absolute coordinates: `[x, y, z]`
//! 2. Offset: `{from: <point>, offset: [dx, dy, dz]}`, recursively resolved
//! 3. Symbolic: a named point, or dot notation
//!    `part.face('>Z').center` with location one of
//!    `center | min | max | start | end`
//! 4. Geometric mapping: `{part: name, face|edge|vertex: selector, at: location}`
//!
//! `start` and `end` are only valid for edges. `center` uses the backend's
//! center for the feature, which itself falls back to the feature's
//! bounding-box center.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::backend::{Backend, Feature, FeatureKind};
use crate::error::PointError;
use crate::part::PartRegistry;
use crate::selector::SelectorResolver;
use crate::value::Value;

fn dot_notation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\w+)\.(face|edge|vertex)\('([^']+)'\)\.(center|min|max|start|end)$")
            .expect("valid regex")
    })
}

/// Resolves point expressions to 3D coordinates.
pub struct PointResolver<'a> {
    registry: &'a PartRegistry,
    named_points: &'a IndexMap<String, [f64; 3]>,
    backend: &'a dyn Backend,
}

impl<'a> PointResolver<'a> {
    /// Creates a resolver over a registry and a named-point table.
    pub fn new(
        registry: &'a PartRegistry,
        named_points: &'a IndexMap<String, [f64; 3]>,
        backend: &'a dyn Backend,
    ) -> Self {
        Self {
            registry,
            named_points,
            backend,
        }
    }

    /// Resolves a point expression to `[x, y, z]`.
    pub fn resolve(&self, spec: &Value) -> Result<[f64; 3], PointError> {
        match spec {
            Value::List(_) => self.resolve_absolute(spec),
            Value::Map(map) => {
                if map.contains_key("from") || map.contains_key("offset") {
                    self.resolve_offset(spec)
                } else if map.contains_key("part") {
                    self.resolve_geometric(spec)
                } else {
                    Err(PointError::BadExpression {
                        expression: spec.to_string(),
                        reason: "expected {from, offset} or {part, face|edge|vertex, at}"
                            .to_string(),
                    })
                }
            }
            Value::Str(s) => {
                if let Some(point) = self.named_points.get(s.as_str()) {
                    debug!(name = %s, "resolved named point");
                    return Ok(*point);
                }
                self.resolve_dot_notation(s)
            }
            other => Err(PointError::BadExpression {
                expression: other.to_string(),
                reason: format!(
                    "expected list, string, or mapping, got {}",
                    other.type_name()
                ),
            }),
        }
    }

    fn resolve_absolute(&self, spec: &Value) -> Result<[f64; 3], PointError> {
        spec.as_triple().ok_or_else(|| PointError::BadExpression {
            expression: spec.to_string(),
            reason: "absolute coordinates must be three numbers".to_string(),
        })
    }

    fn resolve_offset(&self, spec: &Value) -> Result<[f64; 3], PointError> {
        let from = spec.get("from").ok_or_else(|| PointError::BadExpression {
            expression: spec.to_string(),
            reason: "offset specification must have a 'from' key".to_string(),
        })?;
        let offset = spec.get("offset").ok_or_else(|| PointError::BadExpression {
            expression: spec.to_string(),
            reason: "offset specification must have an 'offset' key".to_string(),
        })?;

        let base = self.resolve(from)?;
        let delta = offset.as_triple().ok_or_else(|| PointError::BadExpression {
            expression: offset.to_string(),
            reason: "offset must be three numbers".to_string(),
        })?;

        Ok([base[0] + delta[0], base[1] + delta[1], base[2] + delta[2]])
    }

    fn resolve_dot_notation(&self, expression: &str) -> Result<[f64; 3], PointError> {
        let caps = dot_notation_pattern()
            .captures(expression.trim())
            .ok_or_else(|| PointError::BadExpression {
                expression: expression.to_string(),
                reason: "expected part.feature('selector').location, e.g. beam.face('>Z').center"
                    .to_string(),
            })?;

        let part_name = &caps[1];
        let kind = FeatureKind::parse(&caps[2]).ok_or_else(|| PointError::BadExpression {
            expression: expression.to_string(),
            reason: format!("unknown feature kind '{}'", &caps[2]),
        })?;
        let selector = &caps[3];
        let location = &caps[4];

        let feature = self.select_feature(part_name, kind, selector, expression)?;
        self.feature_location(&feature, kind, location)
    }

    fn resolve_geometric(&self, spec: &Value) -> Result<[f64; 3], PointError> {
        let part_name = spec
            .get("part")
            .and_then(Value::as_str)
            .ok_or_else(|| PointError::BadExpression {
                expression: spec.to_string(),
                reason: "geometric reference must have a 'part' key".to_string(),
            })?;

        let (kind, selector) = if let Some(sel) = spec.get("face").and_then(Value::as_str) {
            (FeatureKind::Face, sel)
        } else if let Some(sel) = spec.get("edge").and_then(Value::as_str) {
            (FeatureKind::Edge, sel)
        } else if let Some(sel) = spec.get("vertex").and_then(Value::as_str) {
            (FeatureKind::Vertex, sel)
        } else {
            return Err(PointError::BadExpression {
                expression: spec.to_string(),
                reason: "geometric reference must have one of 'face', 'edge', or 'vertex'"
                    .to_string(),
            });
        };

        let location = spec
            .get("at")
            .and_then(Value::as_str)
            .unwrap_or("center");

        let feature = self.select_feature(part_name, kind, selector, &spec.to_string())?;
        self.feature_location(&feature, kind, location)
    }

    /// Selects the first feature matching `selector` on the named part.
    pub fn select_feature(
        &self,
        part_name: &str,
        kind: FeatureKind,
        selector: &str,
        expression: &str,
    ) -> Result<Feature, PointError> {
        let part = self
            .registry
            .get(part_name)
            .map_err(|_| PointError::PartNotFound {
                name: part_name.to_string(),
                available: self.registry.names(),
            })?;

        let resolver = SelectorResolver::new(self.backend, &part.geometry);
        let features = resolver.resolve_allow_empty(selector, kind)?;
        features
            .into_iter()
            .next()
            .ok_or_else(|| PointError::NoMatchingFeature {
                expression: expression.to_string(),
            })
    }

    fn feature_location(
        &self,
        feature: &Feature,
        kind: FeatureKind,
        location: &str,
    ) -> Result<[f64; 3], PointError> {
        match location {
            "center" => Ok(feature.center),
            "min" => Ok(feature.bbox.min),
            "max" => Ok(feature.bbox.max),
            "start" | "end" => {
                if kind != FeatureKind::Edge {
                    return Err(PointError::InvalidLocation {
                        location: location.to_string(),
                        reason: format!("only valid for edges, not {}", kind.name()),
                    });
                }
                let point = if location == "start" {
                    feature.start
                } else {
                    feature.end
                };
                point.ok_or_else(|| PointError::InvalidLocation {
                    location: location.to_string(),
                    reason: "edge has no endpoint data".to_string(),
                })
            }
            other => Err(PointError::InvalidLocation {
                location: other.to_string(),
                reason: "expected center, min, max, start, or end".to_string(),
            }),
        }
    }
}
