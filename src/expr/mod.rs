//! Parameter expression evaluation.
//!
//! Strings anywhere in a document may embed `${...}` expressions:
//! arithmetic over parameter names with `+ - * / % **`, parentheses, the
//! functions `min, max, abs, sqrt, pow, round, floor, ceil, sin, cos, tan`,
//! and the constant `pi`.
//!
//! # Example
//!
//! ```rust
//! use declad::expr::resolver::ParamResolver;
//! use declad::value::Value;
//! use indexmap::IndexMap;
//!
//! let mut params = IndexMap::new();
//! params.insert("a".to_string(), Value::Int(10));
//! params.insert("b".to_string(), Value::Str("${a * 2}".to_string()));
//!
//! let mut resolver = ParamResolver::new(params);
//! assert_eq!(resolver.parameter("b").unwrap(), Value::Int(20));
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod resolver;

use std::sync::OnceLock;

use regex::Regex;

pub use self::parser::{parse, BinaryOp, Expr};
pub use self::resolver::ParamResolver;

/// The `${...}` occurrence pattern shared by the resolver and the
/// dependency extractor.
pub(crate) fn expr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}

/// Identifier pattern used when harvesting parameter references from
/// expression text that may not parse cleanly.
pub(crate) fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-zA-Z_][a-zA-Z0-9_]*").expect("valid regex"))
}
