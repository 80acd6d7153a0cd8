//! Resolution of `${...}` expressions over a parameter map.
//!
//! Parameters are declared as raw document values, resolved lazily on first
//! demand, and cached. A string that is exactly one `${...}` expression
//! resolves to the expression's value with its runtime type preserved; a
//! string with embedded expressions resolves to a string with each
//! occurrence substituted. Lists and maps resolve element-wise.
//!
//! # Cycle handling
//!
//! The resolver keeps a resolution stack. While parameter `p` is being
//! resolved, `p` is excluded from the evaluation environment, so a circular
//! reference surfaces as an unknown-name error inside the offending
//! expression rather than as infinite recursion. Re-entering a parameter
//! directly reports the cycle trace.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::ExprError;
use crate::expr::{self, eval, parser};
use crate::value::Value;

/// Resolves `${...}` expressions in parameter values.
///
/// ```rust
/// use declad::expr::resolver::ParamResolver;
/// use declad::value::Value;
/// use indexmap::IndexMap;
///
/// let mut params = IndexMap::new();
/// params.insert("width".to_string(), Value::Int(100));
/// params.insert("area".to_string(), Value::Str("${width * width}".to_string()));
///
/// let mut resolver = ParamResolver::new(params);
/// assert_eq!(resolver.parameter("area").unwrap(), Value::Int(10000));
/// ```
#[derive(Debug)]
pub struct ParamResolver {
    raw: IndexMap<String, Value>,
    cache: IndexMap<String, Value>,
    stack: Vec<String>,
}

impl ParamResolver {
    /// Creates a resolver over a raw parameter map.
    pub fn new(parameters: IndexMap<String, Value>) -> Self {
        Self {
            raw: parameters,
            cache: IndexMap::new(),
            stack: Vec::new(),
        }
    }

    /// The declared parameter names, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.raw.keys().cloned().collect()
    }

    /// Declares or replaces a parameter, dropping any cached resolution of
    /// the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.cache.shift_remove(&name);
        self.raw.insert(name, value);
    }

    /// Recursively resolves `${...}` expressions in a value.
    pub fn resolve(&mut self, value: &Value) -> Result<Value, ExprError> {
        match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(value.clone()),
            Value::Str(s) => self.resolve_string(s),
            Value::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve(item)?);
                }
                Ok(Value::List(resolved))
            }
            Value::Map(map) => {
                let mut resolved = IndexMap::with_capacity(map.len());
                for (key, val) in map {
                    resolved.insert(key.clone(), self.resolve(val)?);
                }
                Ok(Value::Map(resolved))
            }
        }
    }

    /// Resolves `${...}` expressions in a string.
    ///
    /// A string that is exactly one expression returns the evaluated value;
    /// mixed text returns a string with each expression substituted.
    fn resolve_string(&mut self, value: &str) -> Result<Value, ExprError> {
        let pattern = expr::expr_pattern();
        let matches: Vec<(usize, usize, String)> = pattern
            .captures_iter(value)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let inner = caps.get(1)?.as_str().trim().to_string();
                Some((whole.start(), whole.end(), inner))
            })
            .collect();

        if matches.is_empty() {
            return Ok(Value::Str(value.to_string()));
        }

        if matches.len() == 1 && matches[0].0 == 0 && matches[0].1 == value.len() {
            return self.evaluate_expression(&matches[0].2);
        }

        // Substitute in reverse order so earlier offsets stay valid.
        let mut result = value.to_string();
        for (start, end, expression) in matches.iter().rev() {
            let evaluated = self.evaluate_expression(expression)?;
            result.replace_range(*start..*end, &evaluated.to_string());
        }
        Ok(Value::Str(result))
    }

    /// Evaluates a single expression (without the `${...}` wrapper).
    fn evaluate_expression(&mut self, expression: &str) -> Result<Value, ExprError> {
        let parsed = parser::parse(expression)?;
        let env = self.environment();
        eval::evaluate(&parsed, &env, expression)
    }

    /// Builds the evaluation environment: every parameter that resolves
    /// without touching the in-flight resolution stack.
    ///
    /// Parameters that cannot be resolved yet are skipped; if an expression
    /// actually needs one of them, evaluation reports it as unknown.
    fn environment(&mut self) -> IndexMap<String, Value> {
        let names: Vec<String> = self.raw.keys().cloned().collect();
        let mut env = IndexMap::with_capacity(names.len());

        for name in names {
            if self.stack.contains(&name) {
                continue;
            }
            if let Some(cached) = self.cache.get(&name) {
                env.insert(name, cached.clone());
                continue;
            }
            match self.parameter(&name) {
                Ok(value) => {
                    env.insert(name, value);
                }
                Err(_) => {
                    // Forward reference that is not resolvable yet; skip it.
                }
            }
        }

        env
    }

    /// Returns the resolved value of a parameter by name, resolving and
    /// caching it on first use.
    pub fn parameter(&mut self, name: &str) -> Result<Value, ExprError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        let Some(raw_value) = self.raw.get(name).cloned() else {
            return Err(ExprError::UnknownName {
                name: name.to_string(),
                expression: name.to_string(),
                available: self.names(),
            });
        };

        if self.stack.iter().any(|n| n == name) {
            let mut trace: Vec<&str> = self.stack.iter().map(String::as_str).collect();
            trace.push(name);
            return Err(ExprError::CircularReference {
                cycle: trace.join(" -> "),
            });
        }

        self.stack.push(name.to_string());
        let resolved = self.resolve(&raw_value);
        self.stack.pop();
        let resolved = resolved?;

        debug!(parameter = name, value = %resolved, "resolved parameter");
        self.cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Resolves every declared parameter and returns the full map.
    pub fn resolve_all(&mut self) -> Result<IndexMap<String, Value>, ExprError> {
        let names = self.names();
        let mut result = IndexMap::with_capacity(names.len());
        for name in names {
            result.insert(name.clone(), self.parameter(&name)?);
        }
        Ok(result)
    }

    /// Resolves a spec value, downgrading unknown names inside embedded
    /// text to a warning. Used for metadata-ish fields where a stray `$`
    /// should not abort a build.
    pub fn resolve_lenient(&mut self, value: &Value) -> Value {
        match self.resolve(value) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(error = %err, "lenient resolution failed, keeping raw value");
                value.clone()
            }
        }
    }
}
