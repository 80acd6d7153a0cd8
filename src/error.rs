//! Error types for Declad.
//!
//! Each subsystem owns a small error enum; [`BuildError`] is the top-level
//! type the orchestrator surfaces, wrapping the subsystem error together with
//! the failing node's id. Errors carry the offending subexpression or field
//! path and, where it helps, the list of known names.
//!
//! When the document-loading collaborator supplies source locations,
//! [`format_with_context`] renders an error with surrounding source lines and
//! a caret at the failing column.

use thiserror::Error;

/// Errors raised while evaluating `${...}` expressions.
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    /// An identifier did not resolve to any parameter.
    #[error("parameter '{name}' not found in expression: {expression}; available parameters: {}", .available.join(", "))]
    UnknownName {
        /// The unresolved identifier
        name: String,
        /// The expression being evaluated
        expression: String,
        /// Parameter names that were in scope
        available: Vec<String>,
    },

    /// The expression failed to tokenize or parse.
    #[error("invalid expression: {expression}: {reason}")]
    InvalidExpression {
        /// The expression text
        expression: String,
        /// What went wrong
        reason: String,
    },

    /// A division or modulo by zero.
    #[error("division by zero in expression: {expression}")]
    DivisionByZero {
        /// The expression text
        expression: String,
    },

    /// Evaluation failed for a semantic reason (bad operand types, arity).
    #[error("error evaluating expression '{expression}': {reason}")]
    Eval {
        /// The expression text
        expression: String,
        /// What went wrong
        reason: String,
    },

    /// A parameter was re-entered while already being resolved.
    #[error("circular reference detected: {cycle}")]
    CircularReference {
        /// Human-readable cycle trace, e.g. `a -> b -> a`
        cycle: String,
    },
}

/// Errors raised while resolving feature selectors.
#[derive(Debug, Clone, Error)]
pub enum SelectorError {
    /// The selector string is not a valid simple selector or combinator.
    #[error("invalid selector '{selector}': {reason}")]
    Invalid {
        /// The selector text
        selector: String,
        /// What went wrong
        reason: String,
    },

    /// The selector evaluated to an empty feature set.
    #[error("selector '{selector}' matched no {kind} features")]
    NoMatchingFeature {
        /// The selector text
        selector: String,
        /// The requested feature kind
        kind: String,
    },
}

/// Errors raised while resolving point expressions.
#[derive(Debug, Clone, Error)]
pub enum PointError {
    /// The referenced part does not exist.
    #[error("part '{name}' not found in registry; available parts: {}", .available.join(", "))]
    PartNotFound {
        /// The missing part name
        name: String,
        /// Names currently registered
        available: Vec<String>,
    },

    /// The selector matched nothing on the part.
    #[error("no matching feature for '{expression}'")]
    NoMatchingFeature {
        /// The failing subexpression
        expression: String,
    },

    /// The requested location is not valid for the feature kind.
    #[error("invalid location '{location}': {reason}")]
    InvalidLocation {
        /// The location token (center/min/max/start/end)
        location: String,
        /// Why it is invalid here
        reason: String,
    },

    /// The point expression itself is malformed.
    #[error("invalid point expression: {expression}: {reason}")]
    BadExpression {
        /// The failing subexpression
        expression: String,
        /// What went wrong
        reason: String,
    },

    /// A nested selector failed.
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Errors raised while constructing sketches and 2D shapes.
#[derive(Debug, Clone, Error)]
pub enum SketchError {
    /// A field failed validation.
    #[error("sketch '{sketch}': {reason}")]
    Invalid {
        /// The sketch name
        sketch: String,
        /// What went wrong
        reason: String,
    },
}

/// Errors raised by the dependency graph.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A node id was inserted twice.
    #[error("node '{id}' already exists in graph")]
    DuplicateNode {
        /// The duplicated node id
        id: String,
    },

    /// An edge endpoint does not exist.
    #[error("node '{id}' not found in graph")]
    UnknownNode {
        /// The missing node id
        id: String,
    },

    /// The graph contains at least one cycle.
    #[error("circular dependency detected: {trace}")]
    CircularDependency {
        /// A readable trace through one cycle, e.g. `a -> b -> a`
        trace: String,
    },
}

/// Errors raised by a geometry backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A geometric operation failed inside the kernel.
    #[error("backend operation failed: {0}")]
    Operation(String),

    /// A handle did not refer to a live shape.
    #[error("unknown geometry handle")]
    UnknownHandle,

    /// An export hook failed on I/O.
    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the part registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A part name was registered twice.
    #[error("part '{name}' already exists in registry")]
    Duplicate {
        /// The colliding name
        name: String,
    },

    /// A part lookup failed.
    #[error("part '{name}' not found; available parts: {}", .available.join(", "))]
    NotFound {
        /// The missing name
        name: String,
        /// Names currently registered
        available: Vec<String>,
    },
}

/// Errors raised while normalizing colors and materials.
#[derive(Debug, Clone, Error)]
pub enum MaterialError {
    /// The material name is not in the built-in table.
    #[error("unknown material '{name}'")]
    UnknownMaterial {
        /// The unmatched material name
        name: String,
    },

    /// The color value could not be parsed.
    #[error("invalid color value: {value}")]
    InvalidColor {
        /// The offending value, rendered
        value: String,
    },
}

/// Errors raised while interpreting the document structure.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    /// The top level of the document is not a mapping.
    #[error("document must be a mapping, got {found}")]
    NotAMapping {
        /// The type that was found
        found: String,
    },

    /// A section has the wrong shape.
    #[error("section '{section}' must be a mapping, got {found}")]
    InvalidSection {
        /// The section name
        section: String,
        /// The type that was found
        found: String,
    },

    /// A declared name violates the naming rules.
    #[error("invalid name '{name}' in section '{section}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// The section it appeared in
        section: String,
        /// Why it is rejected
        reason: String,
    },

    /// The export config has an invalid field.
    #[error("invalid export config: {reason}")]
    InvalidExport {
        /// What went wrong
        reason: String,
    },
}

/// Top-level build error.
///
/// Builders raise the specific variants; the orchestrator wraps whatever a
/// builder raised in [`BuildError::Node`] so every surfaced error names the
/// failing node.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Document structure error.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Expression resolution error.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// Selector resolution error.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Point resolution error.
    #[error(transparent)]
    Point(#[from] PointError),

    /// Sketch construction error.
    #[error(transparent)]
    Sketch(#[from] SketchError),

    /// Dependency graph error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Backend operation error.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Color or material error.
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// A required field is missing or out of range.
    #[error("invalid spec at {path}: {reason}")]
    InvalidSpec {
        /// Dotted field path, e.g. `operations.drilled.subtract`
        path: String,
        /// What went wrong
        reason: String,
    },

    /// An operation references a part, sketch, or parameter that does not
    /// exist.
    #[error("missing reference '{name}' at {path}; available: {}", .available.join(", "))]
    MissingReference {
        /// Dotted field path
        path: String,
        /// The missing name
        name: String,
        /// Names that do exist
        available: Vec<String>,
    },

    /// A wildcard or range expansion matched zero parts.
    #[error("pattern '{pattern}' matched no parts; available parts: {}", .available.join(", "))]
    EmptyExpansion {
        /// The pattern text
        pattern: String,
        /// Names currently registered
        available: Vec<String>,
    },

    /// An error wrapped with the failing node's id.
    #[error("while building '{node}': {source}")]
    Node {
        /// The failing node id (`kind:name`)
        node: String,
        /// The original error
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Wraps this error with the failing node's id. Already-wrapped errors
    /// are left as-is so the innermost node wins.
    pub fn with_node(self, node: &str) -> BuildError {
        match self {
            BuildError::Node { .. } => self,
            other => BuildError::Node {
                node: node.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The node id attached by [`BuildError::with_node`], if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            BuildError::Node { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// Renders an error message with source context and a caret.
///
/// `line` and `column` are 1-indexed. Shows `context_lines` lines on either
/// side of the failing line. The document loader that tracks source
/// locations is an external collaborator; this is the rendering half of
/// that contract.
pub fn format_with_context(
    message: &str,
    source: &str,
    line: usize,
    column: usize,
    filename: Option<&str>,
    context_lines: usize,
) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::new();

    match filename {
        Some(name) => out.push_str(&format!("error in {}:{}:{}\n", name, line, column)),
        None => out.push_str(&format!("error at line {}, column {}\n", line, column)),
    }
    out.push_str(message);
    out.push('\n');

    if line == 0 || line > lines.len() {
        return out;
    }

    let first = line.saturating_sub(context_lines + 1);
    let last = (line + context_lines).min(lines.len());
    let width = format!("{}", last).len();

    for (idx, text) in lines.iter().enumerate().take(last).skip(first) {
        let lineno = idx + 1;
        let marker = if lineno == line { ">" } else { " " };
        out.push_str(&format!("{} {:>width$} | {}\n", marker, lineno, text, width = width));
        if lineno == line && column > 0 {
            let pad = " ".repeat(width + 4 + column.saturating_sub(1));
            out.push_str(&pad);
            out.push_str("^\n");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_node_wraps_once() {
        let err = BuildError::InvalidSpec {
            path: "operations.cut".to_string(),
            reason: "missing 'base'".to_string(),
        };
        let wrapped = err.with_node("operation:cut");
        assert_eq!(wrapped.node(), Some("operation:cut"));

        let rewrapped = wrapped.with_node("operation:other");
        assert_eq!(rewrapped.node(), Some("operation:cut"));
    }

    #[test]
    fn test_error_messages_carry_known_names() {
        let err = RegistryError::NotFound {
            name: "bolt".to_string(),
            available: vec!["plate".to_string(), "nut".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("bolt"));
        assert!(message.contains("plate, nut"));
    }

    #[test]
    fn test_format_with_context_caret() {
        let source = "parameters:\n  width: ten\n  height: 5\n";
        let rendered = format_with_context(
            "invalid expression: ten",
            source,
            2,
            10,
            Some("model.yaml"),
            2,
        );
        assert!(rendered.contains("model.yaml:2:10"));
        assert!(rendered.contains("width: ten"));
        assert!(rendered.contains("^"));
    }
}
