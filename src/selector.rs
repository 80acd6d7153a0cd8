//! Feature selector algebra.
//!
//! A simple selector is a two-character token, one of `> < | #` followed by
//! an axis letter: `>Z` is the feature with maximum Z, `<Z` minimum, `|Z`
//! parallel to Z, `#Z` perpendicular to Z. Simple selectors are dispatched
//! straight to the backend.
//!
//! Compound selectors combine two simple ones: `not <Z` (complement over
//! all features of the kind), `|Z and >X` (intersection), `>Z or <Z`
//! (union). Exactly one combinator is allowed; the set operations work on
//! backend feature identity, which keeps the algebra independent of any
//! particular kernel.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::backend::{Backend, Feature, FeatureKind, GeomHandle};
use crate::error::SelectorError;
use crate::spatial::Axis;

/// The comparison a simple selector performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorOp {
    /// `>` - maximum coordinate along the axis
    Max,
    /// `<` - minimum coordinate along the axis
    Min,
    /// `|` - parallel to the axis
    Parallel,
    /// `#` - perpendicular to the axis
    Perpendicular,
}

/// A simple two-character selector like `>Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimpleSelector {
    /// The comparison
    pub op: SelectorOp,
    /// The axis
    pub axis: Axis,
}

impl SimpleSelector {
    /// Parses a simple selector token.
    pub fn parse(s: &str) -> Result<SimpleSelector, SelectorError> {
        let invalid = || SelectorError::Invalid {
            selector: s.to_string(),
            reason: "expected format >X, <Y, |Z, #X".to_string(),
        };

        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let op = match chars.next().ok_or_else(invalid)? {
            '>' => SelectorOp::Max,
            '<' => SelectorOp::Min,
            '|' => SelectorOp::Parallel,
            '#' => SelectorOp::Perpendicular,
            _ => return Err(invalid()),
        };
        let axis_char = chars.next().ok_or_else(invalid)?;
        if chars.next().is_some() {
            return Err(invalid());
        }
        let axis = Axis::parse(&axis_char.to_string()).ok_or_else(invalid)?;
        Ok(SimpleSelector { op, axis })
    }
}

impl std::fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            SelectorOp::Max => '>',
            SelectorOp::Min => '<',
            SelectorOp::Parallel => '|',
            SelectorOp::Perpendicular => '#',
        };
        write!(f, "{}{}", op, self.axis.letter())
    }
}

/// A parsed selector expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorExpr {
    /// A simple selector, dispatched to the backend
    Simple(SimpleSelector),
    /// Complement relative to all features of the requested kind
    Not(SimpleSelector),
    /// Set intersection of two simple selectors
    And(SimpleSelector, SimpleSelector),
    /// Set union of two simple selectors
    Or(SimpleSelector, SimpleSelector),
}

fn and_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+and\s+").expect("valid regex"))
}

fn or_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+or\s+").expect("valid regex"))
}

/// Parses a selector string: a simple selector or a single combinator.
pub fn parse(selector: &str) -> Result<SelectorExpr, SelectorError> {
    let trimmed = selector.trim();

    if let Some(inner) = trimmed.strip_prefix("not ") {
        return Ok(SelectorExpr::Not(SimpleSelector::parse(inner)?));
    }

    if and_pattern().is_match(trimmed) {
        let parts: Vec<&str> = and_pattern().split(trimmed).collect();
        if parts.len() != 2 {
            return Err(SelectorError::Invalid {
                selector: selector.to_string(),
                reason: "expected exactly one 'and' operator".to_string(),
            });
        }
        return Ok(SelectorExpr::And(
            SimpleSelector::parse(parts[0])?,
            SimpleSelector::parse(parts[1])?,
        ));
    }

    if or_pattern().is_match(trimmed) {
        let parts: Vec<&str> = or_pattern().split(trimmed).collect();
        if parts.len() != 2 {
            return Err(SelectorError::Invalid {
                selector: selector.to_string(),
                reason: "expected exactly one 'or' operator".to_string(),
            });
        }
        return Ok(SelectorExpr::Or(
            SimpleSelector::parse(parts[0])?,
            SimpleSelector::parse(parts[1])?,
        ));
    }

    Ok(SelectorExpr::Simple(SimpleSelector::parse(trimmed)?))
}

/// Resolves selector strings against one shape's features.
pub struct SelectorResolver<'a> {
    backend: &'a dyn Backend,
    shape: &'a GeomHandle,
}

impl<'a> SelectorResolver<'a> {
    /// Creates a resolver over a shape.
    pub fn new(backend: &'a dyn Backend, shape: &'a GeomHandle) -> Self {
        Self { backend, shape }
    }

    /// Resolves a selector string to the matching features of `kind`.
    ///
    /// Returns an error if the result set is empty.
    pub fn resolve(
        &self,
        selector: &str,
        kind: FeatureKind,
    ) -> Result<Vec<Feature>, SelectorError> {
        let features = self.resolve_allow_empty(selector, kind)?;
        if features.is_empty() {
            return Err(SelectorError::NoMatchingFeature {
                selector: selector.to_string(),
                kind: kind.name().to_string(),
            });
        }
        Ok(features)
    }

    /// Resolves a selector string, allowing an empty result.
    pub fn resolve_allow_empty(
        &self,
        selector: &str,
        kind: FeatureKind,
    ) -> Result<Vec<Feature>, SelectorError> {
        let expr = parse(selector)?;
        let backend_err = |e: crate::error::BackendError| SelectorError::Invalid {
            selector: selector.to_string(),
            reason: e.to_string(),
        };

        match expr {
            SelectorExpr::Simple(simple) => {
                self.select_simple(&simple, kind).map_err(backend_err)
            }
            SelectorExpr::Not(simple) => {
                let all = self.all_features(kind).map_err(backend_err)?;
                let matching: HashSet<_> = self
                    .select_simple(&simple, kind)
                    .map_err(backend_err)?
                    .iter()
                    .map(Feature::key)
                    .collect();
                Ok(all
                    .into_iter()
                    .filter(|f| !matching.contains(&f.key()))
                    .collect())
            }
            SelectorExpr::And(left, right) => {
                let left_features = self.select_simple(&left, kind).map_err(backend_err)?;
                let right_keys: HashSet<_> = self
                    .select_simple(&right, kind)
                    .map_err(backend_err)?
                    .iter()
                    .map(Feature::key)
                    .collect();
                Ok(left_features
                    .into_iter()
                    .filter(|f| right_keys.contains(&f.key()))
                    .collect())
            }
            SelectorExpr::Or(left, right) => {
                let mut result = self.select_simple(&left, kind).map_err(backend_err)?;
                let seen: HashSet<_> = result.iter().map(Feature::key).collect();
                for feature in self.select_simple(&right, kind).map_err(backend_err)? {
                    if !seen.contains(&feature.key()) {
                        result.push(feature);
                    }
                }
                Ok(result)
            }
        }
    }

    fn select_simple(
        &self,
        selector: &SimpleSelector,
        kind: FeatureKind,
    ) -> Result<Vec<Feature>, crate::error::BackendError> {
        match kind {
            FeatureKind::Face => self.backend.select_faces(self.shape, selector),
            FeatureKind::Edge => self.backend.select_edges(self.shape, selector),
            FeatureKind::Vertex => self.backend.select_vertices(self.shape, selector),
        }
    }

    fn all_features(
        &self,
        kind: FeatureKind,
    ) -> Result<Vec<Feature>, crate::error::BackendError> {
        match kind {
            FeatureKind::Face => self.backend.faces(self.shape),
            FeatureKind::Edge => self.backend.edges(self.shape),
            FeatureKind::Vertex => self.backend.vertices(self.shape),
        }
    }
}
