//! Boolean operation builder.
//!
//! Union, difference, and intersection over registry parts. Every list of
//! part references supports pattern expansion before validation:
//!
//! - plain names: `"bolt_hole_1"`
//! - wildcards: `"bolt_circle_*"` or `"*_hole"` (numeric-aware suffix sort)
//! - `{pattern: "bolt_circle"}`, shorthand for `bolt_circle_*`
//! - `{range: "bolt_circle[0..5]"}`, each expanded name must exist
//! - `{range: "bolt_circle[*]"}`, same as the wildcard form

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::backend::{BooleanOp, GeomHandle};
use crate::build::spec::SpecView;
use crate::build::{appearance_overrides, BuildContext};
use crate::error::BuildError;
use crate::metadata::copy_propagating;
use crate::part::{Part, PartRegistry};
use crate::value::Value;

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+?)\[(.+?)\]$").expect("valid regex"))
}

fn span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.\.(\d+)$").expect("valid regex"))
}

/// Builds a boolean operation. The variant comes from the `operation`
/// field (`union`, `difference`, `intersection`).
pub(crate) fn build(ctx: &mut BuildContext<'_>, name: &str, spec: &Value) -> Result<(), BuildError> {
    let resolved = ctx.resolver.resolve(spec)?;
    let view = SpecView::new(format!("operations.{}", name), &resolved)?;

    let op_name = view.str_field("operation")?;
    let op = BooleanOp::parse(op_name).ok_or_else(|| {
        view.invalid(
            "operation",
            format!(
                "unknown boolean operation '{}'; supported: union, difference, intersection",
                op_name
            ),
        )
    })?;

    let (geometry, source_name) = match op {
        BooleanOp::Union => {
            let inputs = expanded_inputs(ctx.registry, &view, "inputs", 2)?;
            let geometry = fold_combine(ctx, BooleanOp::Union, &inputs)?;
            // A wildcard first entry has no single source part; appearance
            // then stays default
            let source = plain_first_entry(view.list_field("inputs")?);
            (geometry, source)
        }
        BooleanOp::Intersection => {
            let inputs = expanded_inputs(ctx.registry, &view, "inputs", 2)?;
            let geometry = fold_combine(ctx, BooleanOp::Intersection, &inputs)?;
            // Appearance comes from an explicit `base` only; without one
            // the result keeps default appearance
            let base = view.opt_str("base")?.map(str::to_string);
            (geometry, base)
        }
        BooleanOp::Difference => {
            let base_name = view.str_field("base")?.to_string();
            let subtract = expanded_inputs(ctx.registry, &view, "subtract", 1)?;
            if !ctx.registry.exists(&base_name) {
                return Err(BuildError::MissingReference {
                    path: format!("{}.base", view.path()),
                    name: base_name,
                    available: ctx.registry.names(),
                });
            }

            let mut current = {
                let base = ctx.registry.get(&base_name)?;
                ctx.backend.clone_shape(&base.geometry)?
            };
            for (index, tool_name) in subtract.iter().enumerate() {
                let tool = ctx.registry.get(tool_name)?;
                current = ctx
                    .backend
                    .combine(BooleanOp::Difference, &current, &tool.geometry)?;
                debug!(
                    operation = name,
                    tool = %tool_name,
                    step = index + 1,
                    total = subtract.len(),
                    "subtracted part"
                );
            }
            (current, Some(base_name))
        }
    };

    let source_metadata = source_name
        .as_deref()
        .filter(|source| ctx.registry.exists(source))
        .map(|source| ctx.registry.get(source).map(|p| p.metadata.clone()))
        .transpose()?;

    let mut operation_metadata = indexmap::IndexMap::new();
    operation_metadata.insert("operation_type".to_string(), Value::Str("boolean".to_string()));
    operation_metadata.insert("boolean_op".to_string(), Value::Str(op.name().to_string()));
    if let Some(source) = &source_name {
        operation_metadata.insert("source".to_string(), Value::Str(source.clone()));
    }
    let overrides = appearance_overrides(&view)?;
    let metadata = copy_propagating(source_metadata.as_ref(), operation_metadata, Some(&overrides));

    let part = Part::new(name, geometry, metadata, ctx.backend)?;
    ctx.registry.add(part)?;
    info!(operation = name, boolean = op.name(), "built boolean");
    Ok(())
}

/// Expands a part list field and checks arity and existence.
fn expanded_inputs(
    registry: &PartRegistry,
    view: &SpecView<'_>,
    field: &str,
    min: usize,
) -> Result<Vec<String>, BuildError> {
    let items = view.list_field(field)?;
    let expanded = expand_part_list(registry, items, view.path())?;

    if expanded.len() < min {
        return Err(view.invalid(
            field,
            format!("requires at least {} entries, got {}", min, expanded.len()),
        ));
    }
    for name in &expanded {
        if !registry.exists(name) {
            return Err(BuildError::MissingReference {
                path: format!("{}.{}", view.path(), field),
                name: name.clone(),
                available: registry.names(),
            });
        }
    }
    Ok(expanded)
}

/// Folds a commutative boolean over the inputs, left to right.
fn fold_combine(
    ctx: &mut BuildContext<'_>,
    op: BooleanOp,
    inputs: &[String],
) -> Result<GeomHandle, BuildError> {
    let mut current = {
        let first = ctx.registry.get(&inputs[0])?;
        ctx.backend.clone_shape(&first.geometry)?
    };
    for input_name in &inputs[1..] {
        let next = ctx.registry.get(input_name)?;
        current = ctx.backend.combine(op, &current, &next.geometry)?;
    }
    Ok(current)
}

/// The first entry of a part list when it is a plain (non-wildcard) name.
fn plain_first_entry(items: &[Value]) -> Option<String> {
    match items.first() {
        Some(Value::Str(name)) if !name.contains('*') => Some(name.clone()),
        _ => None,
    }
}

/// Expands pattern references in a part list to concrete part names.
///
/// Plain names pass through unchecked (callers validate existence so they
/// can attach field context); wildcard and range entries must match.
pub(crate) fn expand_part_list(
    registry: &PartRegistry,
    items: &[Value],
    path: &str,
) -> Result<Vec<String>, BuildError> {
    let mut expanded = Vec::new();

    for item in items {
        match item {
            Value::Str(name) => {
                if name.contains('*') {
                    let matches = find_wildcard_matches(registry, name);
                    if matches.is_empty() {
                        return Err(BuildError::EmptyExpansion {
                            pattern: name.clone(),
                            available: registry.names(),
                        });
                    }
                    debug!(pattern = %name, matched = matches.len(), "expanded wildcard");
                    expanded.extend(matches);
                } else {
                    expanded.push(name.clone());
                }
            }
            Value::Map(map) => {
                if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
                    let wildcard = format!("{}_*", pattern);
                    let matches = find_wildcard_matches(registry, &wildcard);
                    if matches.is_empty() {
                        return Err(BuildError::EmptyExpansion {
                            pattern: pattern.to_string(),
                            available: registry.names(),
                        });
                    }
                    expanded.extend(matches);
                } else if let Some(range) = map.get("range").and_then(Value::as_str) {
                    expanded.extend(expand_range(registry, range)?);
                } else {
                    return Err(BuildError::InvalidSpec {
                        path: path.to_string(),
                        reason: format!(
                            "invalid pattern entry {}; expected a 'pattern' or 'range' key",
                            item
                        ),
                    });
                }
            }
            other => {
                return Err(BuildError::InvalidSpec {
                    path: path.to_string(),
                    reason: format!(
                        "part list entries must be names or pattern mappings, got {}",
                        other.type_name()
                    ),
                })
            }
        }
    }

    Ok(expanded)
}

/// Registry names matching `prefix*` or `*suffix`, numeric suffixes first
/// in numeric order.
fn find_wildcard_matches(registry: &PartRegistry, pattern: &str) -> Vec<String> {
    let mut matches: Vec<String> = if let Some(prefix) = pattern.strip_suffix('*') {
        registry
            .names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        registry
            .names()
            .into_iter()
            .filter(|name| name.ends_with(suffix))
            .collect()
    } else {
        return Vec::new();
    };

    let prefix_len = pattern.strip_suffix('*').map(str::len).unwrap_or(0);
    matches.sort_by_key(|name| {
        let tail = &name[prefix_len.min(name.len())..];
        match tail.parse::<u64>() {
            Ok(n) => (0, n, String::new()),
            Err(_) => (1, 0, name.clone()),
        }
    });
    matches
}

/// Expands `name[a..b]` or `name[*]`.
fn expand_range(registry: &PartRegistry, range_spec: &str) -> Result<Vec<String>, BuildError> {
    let caps = range_pattern()
        .captures(range_spec)
        .ok_or_else(|| BuildError::InvalidSpec {
            path: "range".to_string(),
            reason: format!(
                "invalid range syntax '{}'; expected 'name[start..end]' or 'name[*]'",
                range_spec
            ),
        })?;

    let base = &caps[1];
    let bounds = &caps[2];

    if bounds == "*" {
        let matches = find_wildcard_matches(registry, &format!("{}_*", base));
        if matches.is_empty() {
            return Err(BuildError::EmptyExpansion {
                pattern: range_spec.to_string(),
                available: registry.names(),
            });
        }
        return Ok(matches);
    }

    let span = span_pattern()
        .captures(bounds)
        .ok_or_else(|| BuildError::InvalidSpec {
            path: "range".to_string(),
            reason: format!("invalid range bounds '{}'; expected 'start..end' or '*'", bounds),
        })?;
    let start: u64 = span[1].parse().map_err(|_| BuildError::InvalidSpec {
        path: "range".to_string(),
        reason: format!("invalid range start in '{}'", range_spec),
    })?;
    let end: u64 = span[2].parse().map_err(|_| BuildError::InvalidSpec {
        path: "range".to_string(),
        reason: format!("invalid range end in '{}'", range_spec),
    })?;

    if start > end {
        return Err(BuildError::InvalidSpec {
            path: "range".to_string(),
            reason: format!("range start ({}) is after end ({})", start, end),
        });
    }

    let mut names = Vec::with_capacity((end - start + 1) as usize);
    for index in start..=end {
        let name = format!("{}_{}", base, index);
        if !registry.exists(&name) {
            return Err(BuildError::MissingReference {
                path: "range".to_string(),
                name,
                available: registry.names(),
            });
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::build::tests::test_context;
    use crate::value_map;

    fn name_list(names: &[&str]) -> Value {
        Value::List(names.iter().map(|n| Value::Str(n.to_string())).collect())
    }

    fn holes_fixture(backend: &mut MockBackend) -> crate::build::tests::Fixture<'_> {
        let mut fixture = test_context(backend);
        fixture.add_box("plate", 100.0, 100.0, 10.0, [0.0, 0.0, 0.0]);
        for i in 0..6 {
            fixture.add_box(&format!("hole_{}", i), 2.0, 2.0, 12.0, [i as f64 * 10.0, 0.0, 0.0]);
        }
        fixture
    }

    #[test]
    fn test_union_requires_two_inputs() {
        let mut backend = MockBackend::new();
        let mut fixture = holes_fixture(&mut backend);
        let spec = value_map! {"operation" => "union", "inputs" => name_list(&["plate"])};
        assert!(super::build(&mut fixture.ctx(), "u", &spec).is_err());
    }

    #[test]
    fn test_difference_with_wildcard_preserves_base_bounds() {
        let mut backend = MockBackend::new();
        let mut fixture = holes_fixture(&mut backend);
        let spec = value_map! {
            "operation" => "difference",
            "base" => "plate",
            "subtract" => name_list(&["hole_*"]),
        };
        super::build(&mut fixture.ctx(), "drilled", &spec).unwrap();

        let plate_bbox = fixture
            .registry
            .get("plate")
            .unwrap()
            .bounds(fixture.backend)
            .unwrap();
        let drilled_bbox = fixture
            .registry
            .get("drilled")
            .unwrap()
            .bounds(fixture.backend)
            .unwrap();
        assert_eq!(plate_bbox, drilled_bbox);
    }

    #[test]
    fn test_empty_wildcard_lists_registry() {
        let mut backend = MockBackend::new();
        let mut fixture = holes_fixture(&mut backend);
        let spec = value_map! {
            "operation" => "difference",
            "base" => "plate",
            "subtract" => name_list(&["bolt_*"]),
        };
        match super::build(&mut fixture.ctx(), "bad", &spec) {
            Err(BuildError::EmptyExpansion { pattern, available }) => {
                assert_eq!(pattern, "bolt_*");
                assert!(available.contains(&"plate".to_string()));
            }
            other => panic!("expected EmptyExpansion, got {:?}", other),
        }
    }

    #[test]
    fn test_range_expansion() {
        let mut backend = MockBackend::new();
        let fixture = holes_fixture(&mut backend);
        let names = expand_range(&fixture.registry, "hole[1..3]").unwrap();
        assert_eq!(names, vec!["hole_1", "hole_2", "hole_3"]);
    }

    #[test]
    fn test_backwards_range_rejected() {
        let mut backend = MockBackend::new();
        let fixture = holes_fixture(&mut backend);
        assert!(expand_range(&fixture.registry, "hole[4..2]").is_err());
    }

    #[test]
    fn test_range_requires_existing_parts() {
        let mut backend = MockBackend::new();
        let fixture = holes_fixture(&mut backend);
        match expand_range(&fixture.registry, "hole[4..9]") {
            Err(BuildError::MissingReference { name, .. }) => assert_eq!(name, "hole_6"),
            other => panic!("expected MissingReference, got {:?}", other),
        }
    }

    #[test]
    fn test_pattern_dict_expansion() {
        let mut backend = MockBackend::new();
        let fixture = holes_fixture(&mut backend);
        let items = vec![value_map! {"pattern" => "hole"}];
        let names = expand_part_list(&fixture.registry, &items, "op").unwrap();
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "hole_0");
    }

    #[test]
    fn test_numeric_suffix_sort() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        for i in [10, 2, 1, 0] {
            fixture.add_box(&format!("peg_{}", i), 1.0, 1.0, 1.0, [0.0; 3]);
        }
        let names = find_wildcard_matches(&fixture.registry, "peg_*");
        assert_eq!(names, vec!["peg_0", "peg_1", "peg_2", "peg_10"]);
    }

    #[test]
    fn test_union_propagates_first_input_appearance() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("a", 1.0, 1.0, 1.0, [0.0; 3]);
        fixture.add_box("b", 1.0, 1.0, 1.0, [2.0, 0.0, 0.0]);
        fixture
            .registry
            .get_mut("a")
            .unwrap()
            .metadata
            .insert("color".to_string(), Value::Str("red".to_string()));

        let spec = value_map! {"operation" => "union", "inputs" => name_list(&["a", "b"])};
        super::build(&mut fixture.ctx(), "both", &spec).unwrap();

        let part = fixture.registry.get("both").unwrap();
        assert_eq!(part.metadata.get("color"), Some(&Value::Str("red".to_string())));
        assert_eq!(
            part.metadata.get("boolean_op"),
            Some(&Value::Str("union".to_string()))
        );
    }

    #[test]
    fn test_intersection_without_base_keeps_default_appearance() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("a", 2.0, 2.0, 2.0, [0.0; 3]);
        fixture.add_box("b", 2.0, 2.0, 2.0, [0.5, 0.0, 0.0]);
        fixture
            .registry
            .get_mut("a")
            .unwrap()
            .metadata
            .insert("color".to_string(), Value::Str("red".to_string()));

        let spec = value_map! {
            "operation" => "intersection",
            "inputs" => name_list(&["a", "b"]),
        };
        super::build(&mut fixture.ctx(), "overlap", &spec).unwrap();

        // No base field: nothing propagates from the first input
        let part = fixture.registry.get("overlap").unwrap();
        assert_eq!(part.metadata.get("color"), None);
        assert_eq!(part.metadata.get("source"), None);
        assert_eq!(
            part.metadata.get("boolean_op"),
            Some(&Value::Str("intersection".to_string()))
        );
    }

    #[test]
    fn test_intersection_with_explicit_base_propagates() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("a", 2.0, 2.0, 2.0, [0.0; 3]);
        fixture.add_box("b", 2.0, 2.0, 2.0, [0.5, 0.0, 0.0]);
        fixture
            .registry
            .get_mut("a")
            .unwrap()
            .metadata
            .insert("color".to_string(), Value::Str("red".to_string()));

        let spec = value_map! {
            "operation" => "intersection",
            "base" => "a",
            "inputs" => name_list(&["a", "b"]),
        };
        super::build(&mut fixture.ctx(), "overlap", &spec).unwrap();

        let part = fixture.registry.get("overlap").unwrap();
        assert_eq!(part.metadata.get("color"), Some(&Value::Str("red".to_string())));
        assert_eq!(part.metadata.get("source"), Some(&Value::Str("a".to_string())));
    }

    #[test]
    fn test_intersection_of_disjoint_surfaces_backend_error() {
        let mut backend = MockBackend::new();
        let mut fixture = test_context(&mut backend);
        fixture.add_box("a", 1.0, 1.0, 1.0, [0.0; 3]);
        fixture.add_box("b", 1.0, 1.0, 1.0, [10.0, 0.0, 0.0]);
        let spec = value_map! {"operation" => "intersection", "inputs" => name_list(&["a", "b"])};
        let err = super::build(&mut fixture.ctx(), "none", &spec).unwrap_err();
        assert!(matches!(err, BuildError::Backend(_)));
    }
}
