//! Metadata propagation rules.
//!
//! Two disjoint key sets: appearance keys propagate from a source part to
//! anything derived from it; operation-specific keys describe how a part
//! was created and never propagate. Explicit user overrides win over both.

use indexmap::IndexMap;

use crate::value::Value;

/// Appearance keys that propagate through operations.
pub const PROPAGATING_KEYS: [&str; 5] = ["color", "material", "transparency", "texture", "finish"];

/// Keys describing a part's creation; these never propagate.
pub const OPERATION_KEYS: [&str; 8] = [
    "primitive_type",
    "source",
    "operation_type",
    "boolean_op",
    "pattern_type",
    "pattern_index",
    "grid_position",
    "angle",
];

/// Merges operation metadata with the propagating keys of a source part.
///
/// Starts from `target` (the operation-specific entries), copies the
/// appearance keys present in `source`, then applies `overrides` last.
pub fn copy_propagating(
    source: Option<&IndexMap<String, Value>>,
    target: IndexMap<String, Value>,
    overrides: Option<&IndexMap<String, Value>>,
) -> IndexMap<String, Value> {
    let mut result = target;

    if let Some(source) = source {
        for key in PROPAGATING_KEYS {
            if let Some(value) = source.get(key) {
                result.insert(key.to_string(), value.clone());
            }
        }
    }

    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            result.insert(key.clone(), value.clone());
        }
    }

    result
}
