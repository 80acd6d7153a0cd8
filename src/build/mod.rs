//! Build orchestration.
//!
//! [`ModelBuilder`] turns a [`Document`] into a populated part registry:
//! it constructs the dependency graph, rejects cycles, walks the nodes in
//! topological order, and dispatches each one to the builder for its kind.
//! Any builder failure aborts the build, wrapped with the failing node id.
//!
//! A rebuild after a document edit recomputes content hashes, invalidates
//! the changed nodes plus their descendant closure, and re-evaluates only
//! the invalid set.
//!
//! Builds are single-threaded and run to completion; a build is one call
//! that returns a populated registry or an error. The graph's topology
//! would admit running nodes with disjoint ancestor closures in parallel,
//! but nothing requires it - the contract is that results are
//! deterministic either way.

pub(crate) mod boolean;
pub(crate) mod extrude;
pub(crate) mod finishing;
pub(crate) mod hull;
pub(crate) mod loft;
pub(crate) mod pattern;
pub(crate) mod primitive;
pub(crate) mod reference;
pub(crate) mod revolve;
pub(crate) mod sketches;
pub(crate) mod spec;
pub(crate) mod sweep;
pub(crate) mod text_op;
pub(crate) mod transform;

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::document::{Document, ExportFormat};
use crate::error::{BackendError, BuildError};
use crate::expr::ParamResolver;
use crate::graph::{GraphBuilder, ModelGraph, NodeKind};
use crate::material;
use crate::part::PartRegistry;
use crate::sketch::Sketch;
use crate::spatial::SpatialRef;
use crate::value::Value;

use self::spec::SpecView;

pub use self::transform::TransformTracker;

/// Mutable state handed to the component builders.
pub(crate) struct BuildContext<'a> {
    pub backend: &'a mut dyn Backend,
    pub registry: &'a mut PartRegistry,
    pub sketches: &'a mut IndexMap<String, Sketch>,
    pub named_points: &'a mut IndexMap<String, [f64; 3]>,
    pub references: &'a mut IndexMap<String, SpatialRef>,
    pub resolver: &'a mut ParamResolver,
}

/// Reads `color` / `material` / `transparency` spec keys into appearance
/// metadata overrides. A material supplies its color and finish unless the
/// spec sets an explicit color.
pub(crate) fn appearance_overrides(
    view: &SpecView<'_>,
) -> Result<IndexMap<String, Value>, BuildError> {
    let mut overrides = IndexMap::new();

    if let Some(color) = view.opt("color") {
        let rgba = material::parse_color(color)?;
        overrides.insert(
            "color".to_string(),
            Value::List(rgba.iter().map(|c| Value::Float(*c)).collect()),
        );
    }

    if let Some(name) = view.opt_str("material")? {
        let mat = material::lookup(name)?;
        overrides.insert("material".to_string(), Value::Str(name.to_string()));
        overrides.insert(
            "finish".to_string(),
            Value::Str(mat.finish.to_string()),
        );
        if !overrides.contains_key("color") {
            overrides.insert(
                "color".to_string(),
                Value::List(vec![
                    Value::Float(mat.color[0]),
                    Value::Float(mat.color[1]),
                    Value::Float(mat.color[2]),
                    Value::Float(mat.opacity),
                ]),
            );
        }
    }

    if let Some(transparency) = view.opt("transparency") {
        let alpha = transparency
            .as_f64()
            .ok_or_else(|| view.invalid("transparency", "must be a number in 0-1"))?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(view.invalid("transparency", "must be a number in 0-1"));
        }
        overrides.insert("transparency".to_string(), Value::Float(alpha));
    }

    Ok(overrides)
}

/// Drives documents through the dependency graph into geometry.
pub struct ModelBuilder {
    backend: Box<dyn Backend>,
    document: Document,
    graph: ModelGraph,
    registry: PartRegistry,
    sketches: IndexMap<String, Sketch>,
    named_points: IndexMap<String, [f64; 3]>,
    references: IndexMap<String, SpatialRef>,
    resolver: ParamResolver,
}

impl ModelBuilder {
    /// Creates a builder over a backend.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            document: Document::empty(),
            graph: ModelGraph::new(),
            registry: PartRegistry::new(),
            sketches: IndexMap::new(),
            named_points: IndexMap::new(),
            references: IndexMap::new(),
            resolver: ParamResolver::new(IndexMap::new()),
        }
    }

    /// Builds a document from scratch.
    ///
    /// Constructs the DAG (rejecting cycles), then builds every node in
    /// topological order. On failure the error names the failing node.
    pub fn build(&mut self, document: Document) -> Result<(), BuildError> {
        self.graph = GraphBuilder::new().build(&document)?;
        self.registry = PartRegistry::new();
        self.sketches = IndexMap::new();
        self.named_points = IndexMap::new();
        self.references = IndexMap::new();
        self.resolver = ParamResolver::new(document.parameters.clone());
        self.document = document;

        let order = self.graph.topological_sort(None)?;
        info!(nodes = order.len(), "starting build");

        for id in order {
            self.build_node(&id).map_err(|err| err.with_node(&id))?;
            self.graph.mark_valid(&id, None);
        }

        info!(parts = self.registry.len(), "build complete");
        Ok(())
    }

    /// Rebuilds after a document edit.
    ///
    /// Nodes whose content hash is unchanged keep their outputs; changed
    /// and new nodes, plus their descendant closures, are re-evaluated in
    /// topological order. Returns the rebuilt node ids.
    pub fn rebuild(&mut self, document: Document) -> Result<Vec<String>, BuildError> {
        let new_graph = GraphBuilder::new().build(&document)?;

        let mut invalid: HashSet<String> = HashSet::new();
        for node in new_graph.iter() {
            let unchanged = self
                .graph
                .node(&node.id)
                .map(|old| old.hash == node.hash && old.is_valid)
                .unwrap_or(false);
            if !unchanged {
                invalid.insert(node.id.clone());
            }
        }

        // A finishing operation mutates its input in place, so re-running
        // it requires rebuilding that input as well
        for node in new_graph.iter() {
            if invalid.contains(&node.id) && is_finishing_spec(&node.spec) {
                if let Some(input) = node.spec.get("input").and_then(Value::as_str) {
                    for id in [NodeKind::Part.id(input), NodeKind::Operation.id(input)] {
                        if new_graph.contains(&id) {
                            invalid.insert(id);
                        }
                    }
                }
            }
        }

        for id in invalid.clone() {
            invalid.extend(new_graph.descendants(&id));
        }

        // Declarations deleted from the document take their outputs with
        // them
        let removed: Vec<String> = self
            .graph
            .node_ids()
            .into_iter()
            .filter(|id| !new_graph.contains(id))
            .collect();
        for id in &removed {
            self.evict_outputs(id);
        }

        // Carry build stamps over for surviving nodes
        let mut new_graph = new_graph;
        for node_id in new_graph.node_ids() {
            if !invalid.contains(&node_id) {
                let last_built = self.graph.node(&node_id).and_then(|old| old.last_built);
                if let Some(node) = new_graph.node_mut(&node_id) {
                    node.last_built = last_built;
                }
            }
        }
        self.graph = new_graph;
        for id in &invalid {
            self.graph.mark_invalid(id);
        }

        self.resolver = ParamResolver::new(document.parameters.clone());
        self.document = document;

        // Drop stale outputs of the nodes being rebuilt
        for id in &invalid {
            self.evict_outputs(id);
        }

        let order = self.graph.topological_sort(Some(&invalid))?;
        debug!(rebuilding = order.len(), "incremental rebuild");
        for id in &order {
            self.build_node(id).map_err(|err| err.with_node(id))?;
            self.graph.mark_valid(id, None);
        }
        Ok(order)
    }

    fn evict_outputs(&mut self, id: &str) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        let name = node.name.clone();
        match node.kind {
            NodeKind::Part | NodeKind::Operation => {
                let is_pattern = node.is_pattern;
                self.registry.remove(&name);
                if is_pattern {
                    for candidate in self.registry.names() {
                        if is_pattern_output(&candidate, &name) {
                            self.registry.remove(&candidate);
                        }
                    }
                }
            }
            NodeKind::Sketch => {
                self.sketches.shift_remove(&name);
            }
            NodeKind::Reference => {
                self.references.shift_remove(&name);
                self.named_points.shift_remove(&name);
            }
            NodeKind::Parameter => {}
        }
    }

    fn build_node(&mut self, id: &str) -> Result<(), BuildError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| BuildError::MissingReference {
                path: "graph".to_string(),
                name: id.to_string(),
                available: self.graph.node_ids(),
            })?;
        let kind = node.kind;
        let name = node.name.clone();
        let spec = node.spec.clone();
        debug!(node = id, "building node");

        let mut ctx = BuildContext {
            backend: &mut *self.backend,
            registry: &mut self.registry,
            sketches: &mut self.sketches,
            named_points: &mut self.named_points,
            references: &mut self.references,
            resolver: &mut self.resolver,
        };

        match kind {
            NodeKind::Parameter => {
                ctx.resolver.parameter(&name)?;
                Ok(())
            }
            NodeKind::Sketch => sketches::build(&mut ctx, &name, &spec),
            NodeKind::Part => primitive::build(&mut ctx, &name, &spec),
            NodeKind::Operation => dispatch_operation(&mut ctx, &name, &spec),
            NodeKind::Reference => reference::build(&mut ctx, &name, &spec),
        }
    }

    /// The built part registry.
    pub fn registry(&self) -> &PartRegistry {
        &self.registry
    }

    /// The dependency graph of the last build.
    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// The named references computed during the build.
    pub fn references(&self) -> &IndexMap<String, SpatialRef> {
        &self.references
    }

    /// The named points registered during the build.
    pub fn named_points(&self) -> &IndexMap<String, [f64; 3]> {
        &self.named_points
    }

    /// The sketches built from the document.
    pub fn sketches(&self) -> &IndexMap<String, Sketch> {
        &self.sketches
    }

    /// The backend, for direct queries in tests and tooling.
    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Selects the part to export, per the priority rules of the export
    /// config (see [`Document::select_export_part`]).
    pub fn export_part(&self, explicit: Option<&str>) -> Option<String> {
        self.document.select_export_part(&self.registry, explicit)
    }

    /// Exports the selected part in the given format. STL and STEP go
    /// through the backend; 3MF is handled by an external encoder.
    pub fn export(
        &self,
        format: ExportFormat,
        path: &Path,
        explicit: Option<&str>,
    ) -> Result<(), BuildError> {
        let part_name = self.export_part(explicit).ok_or_else(|| {
            BuildError::MissingReference {
                path: "export.default_part".to_string(),
                name: explicit.unwrap_or("<none>").to_string(),
                available: self.registry.names(),
            }
        })?;
        let part = self.registry.get(&part_name)?;
        match format {
            ExportFormat::Stl => self.backend.export_stl(&part.geometry, path)?,
            ExportFormat::Step => self.backend.export_step(&part.geometry, path)?,
            ExportFormat::ThreeMf => {
                return Err(BuildError::Backend(BackendError::Operation(
                    "3mf export is handled by the external encoder".to_string(),
                )))
            }
        }
        info!(part = %part_name, format = format.name(), "exported part");
        Ok(())
    }
}

fn is_finishing_spec(spec: &Value) -> bool {
    matches!(
        spec.get("type").and_then(Value::as_str),
        Some("finishing") | Some("fillet") | Some("chamfer")
    )
}

fn is_pattern_output(candidate: &str, base: &str) -> bool {
    candidate
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('_'))
        .map(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Dispatches an operation spec to its builder by tag.
fn dispatch_operation(
    ctx: &mut BuildContext<'_>,
    name: &str,
    spec: &Value,
) -> Result<(), BuildError> {
    let type_tag = spec.get("type").and_then(Value::as_str);

    match type_tag {
        Some("boolean") => boolean::build(ctx, name, spec),
        Some("transform") => transform::build(ctx, name, spec),
        Some("extrude") => extrude::build(ctx, name, spec),
        Some("revolve") => revolve::build(ctx, name, spec),
        Some("loft") => loft::build(ctx, name, spec),
        Some("hull") => hull::build(ctx, name, spec),
        Some("sweep") => sweep::build(ctx, name, spec),
        Some("text") => text_op::build(ctx, name, spec),
        Some("pattern") => {
            let kind = spec
                .get("pattern")
                .and_then(Value::as_str)
                .ok_or_else(|| BuildError::InvalidSpec {
                    path: format!("operations.{}.pattern", name),
                    reason: "pattern operations need 'pattern: linear|circular|grid'".to_string(),
                })?;
            pattern::build(ctx, name, kind, spec)
        }
        Some(kind) if kind == "linear" || kind == "circular" || kind == "grid" => {
            pattern::build(ctx, name, kind, spec)
        }
        Some("finishing") => {
            let finish = spec
                .get("finish")
                .and_then(Value::as_str)
                .ok_or_else(|| BuildError::InvalidSpec {
                    path: format!("operations.{}.finish", name),
                    reason: "finishing operations need 'finish: fillet|chamfer'".to_string(),
                })?;
            finishing::build(ctx, name, finish, spec)
        }
        Some(finish) if finish == "fillet" || finish == "chamfer" => {
            finishing::build(ctx, name, finish, spec)
        }
        Some(other) => Err(BuildError::InvalidSpec {
            path: format!("operations.{}.type", name),
            reason: format!("unknown operation type '{}'", other),
        }),
        None => {
            // Bare `operation: union|difference|intersection` is boolean
            // shorthand
            if spec.get("operation").is_some() {
                boolean::build(ctx, name, spec)
            } else {
                Err(BuildError::InvalidSpec {
                    path: format!("operations.{}.type", name),
                    reason: "operation must have a 'type' field".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use indexmap::IndexMap;

    use crate::backend::{Backend, MockBackend};
    use crate::expr::ParamResolver;
    use crate::part::{Part, PartRegistry};
    use crate::sketch::Sketch;
    use crate::spatial::SpatialRef;
    use crate::value::Value;

    use super::BuildContext;

    /// Per-test build state over a borrowed mock backend.
    pub(crate) struct Fixture<'b> {
        pub backend: &'b mut MockBackend,
        pub registry: PartRegistry,
        pub sketches: IndexMap<String, Sketch>,
        pub named_points: IndexMap<String, [f64; 3]>,
        pub references: IndexMap<String, SpatialRef>,
        pub resolver: ParamResolver,
    }

    impl<'b> Fixture<'b> {
        /// A build context borrowing all fixture state.
        pub fn ctx(&mut self) -> BuildContext<'_> {
            BuildContext {
                backend: &mut *self.backend,
                registry: &mut self.registry,
                sketches: &mut self.sketches,
                named_points: &mut self.named_points,
                references: &mut self.references,
                resolver: &mut self.resolver,
            }
        }

        /// Declares a parameter for expression resolution.
        pub fn set_parameter(&mut self, name: &str, value: Value) {
            self.resolver.insert(name, value);
        }

        /// Registers a box part at a position.
        pub fn add_box(&mut self, name: &str, w: f64, h: f64, d: f64, position: [f64; 3]) {
            let geometry = self.backend.make_box(w, h, d).unwrap();
            let geometry = if position == [0.0; 3] {
                geometry
            } else {
                self.backend.translate(&geometry, position).unwrap()
            };
            let part = Part::new(name, geometry, IndexMap::new(), self.backend).unwrap();
            self.registry.add(part).unwrap();
        }
    }

    /// Creates an empty fixture over a mock backend.
    pub(crate) fn test_context(backend: &mut MockBackend) -> Fixture<'_> {
        Fixture {
            backend,
            registry: PartRegistry::new(),
            sketches: IndexMap::new(),
            named_points: IndexMap::new(),
            references: IndexMap::new(),
            resolver: ParamResolver::new(IndexMap::new()),
        }
    }
}
