//! Field access over resolved operation specs.
//!
//! Builders read their inputs through [`SpecView`], which turns missing or
//! mistyped fields into `InvalidSpec` errors carrying the dotted field
//! path.

use indexmap::IndexMap;

use crate::error::BuildError;
use crate::value::Value;

/// A typed window onto one declaration's resolved spec.
#[derive(Debug)]
pub(crate) struct SpecView<'a> {
    path: String,
    map: &'a IndexMap<String, Value>,
}

impl<'a> SpecView<'a> {
    /// Wraps a spec value, which must be a mapping.
    pub fn new(path: impl Into<String>, spec: &'a Value) -> Result<SpecView<'a>, BuildError> {
        let path = path.into();
        let map = spec.as_map().ok_or_else(|| BuildError::InvalidSpec {
            path: path.clone(),
            reason: format!("spec must be a mapping, got {}", spec.type_name()),
        })?;
        Ok(SpecView { path, map })
    }

    /// The dotted path of this spec (for error construction).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The underlying map.
    pub fn map(&self) -> &'a IndexMap<String, Value> {
        self.map
    }

    fn field_path(&self, field: &str) -> String {
        format!("{}.{}", self.path, field)
    }

    /// An error at a field of this spec.
    pub fn invalid(&self, field: &str, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidSpec {
            path: self.field_path(field),
            reason: reason.into(),
        }
    }

    /// Optional raw field.
    pub fn opt(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field)
    }

    /// Required raw field.
    pub fn require(&self, field: &str) -> Result<&'a Value, BuildError> {
        self.map.get(field).ok_or_else(|| BuildError::InvalidSpec {
            path: self.field_path(field),
            reason: format!("missing required '{}' field", field),
        })
    }

    /// Required string field.
    pub fn str_field(&self, field: &str) -> Result<&'a str, BuildError> {
        let value = self.require(field)?;
        value
            .as_str()
            .ok_or_else(|| self.invalid(field, format!("must be a string, got {}", value.type_name())))
    }

    /// Optional string field.
    pub fn opt_str(&self, field: &str) -> Result<Option<&'a str>, BuildError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| {
                self.invalid(field, format!("must be a string, got {}", value.type_name()))
            }),
        }
    }

    /// Required numeric field.
    pub fn f64_field(&self, field: &str) -> Result<f64, BuildError> {
        let value = self.require(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.invalid(field, format!("must be a number, got {}", value.type_name())))
    }

    /// Optional numeric field with a default.
    pub fn f64_or(&self, field: &str, default: f64) -> Result<f64, BuildError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| {
                self.invalid(field, format!("must be a number, got {}", value.type_name()))
            }),
        }
    }

    /// Required strictly positive numeric field.
    pub fn positive_f64(&self, field: &str) -> Result<f64, BuildError> {
        let value = self.f64_field(field)?;
        if value <= 0.0 {
            return Err(self.invalid(field, format!("must be positive, got {}", value)));
        }
        Ok(value)
    }

    /// Required integer count field, at least `min`.
    pub fn count_field(&self, field: &str, min: i64) -> Result<usize, BuildError> {
        let value = self.require(field)?;
        let count = value.as_i64().ok_or_else(|| {
            self.invalid(field, format!("must be an integer, got {}", value.type_name()))
        })?;
        if count < min {
            return Err(self.invalid(field, format!("must be at least {}, got {}", min, count)));
        }
        Ok(count as usize)
    }

    /// Optional boolean field with a default.
    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool, BuildError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| {
                self.invalid(field, format!("must be a boolean, got {}", value.type_name()))
            }),
        }
    }

    /// Required list field.
    pub fn list_field(&self, field: &str) -> Result<&'a [Value], BuildError> {
        let value = self.require(field)?;
        value
            .as_list()
            .ok_or_else(|| self.invalid(field, format!("must be a list, got {}", value.type_name())))
    }

    /// Required `[x, y, z]` field.
    pub fn triple_field(&self, field: &str) -> Result<[f64; 3], BuildError> {
        let value = self.require(field)?;
        value
            .as_triple()
            .ok_or_else(|| self.invalid(field, "must be [x, y, z]"))
    }

    /// Optional `[x, y, z]` field with a default.
    pub fn triple_or(&self, field: &str, default: [f64; 3]) -> Result<[f64; 3], BuildError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_triple()
                .ok_or_else(|| self.invalid(field, "must be [x, y, z]")),
        }
    }

    /// Required `[x, y]` field.
    pub fn pair_field(&self, field: &str) -> Result<[f64; 2], BuildError> {
        let value = self.require(field)?;
        value
            .as_pair()
            .ok_or_else(|| self.invalid(field, "must be [x, y]"))
    }

    /// Optional `[x, y]` field with a default.
    pub fn pair_or(&self, field: &str, default: [f64; 2]) -> Result<[f64; 2], BuildError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_pair()
                .ok_or_else(|| self.invalid(field, "must be [x, y]")),
        }
    }

    /// Parses an enumerated string field through `parse`, with a default
    /// when the field is absent.
    pub fn enum_or<T>(
        &self,
        field: &str,
        default: T,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Result<T, BuildError> {
        match self.opt_str(field)? {
            None => Ok(default),
            Some(raw) => parse(raw)
                .ok_or_else(|| self.invalid(field, format!("'{}' is not one of {}", raw, expected))),
        }
    }
}
