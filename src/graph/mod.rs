//! Dependency graph of model entities.
//!
//! Nodes are typed by kind and identified by `kind:name` strings; edges run
//! from dependency to dependent, so a topological order builds dependencies
//! first and invalidation flows along the edges. Cycles are detected via
//! strongly connected components and rejected with a readable trace.

pub mod builder;
pub mod visualize;

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;

use crate::error::GraphError;
use crate::value::Value;

pub use self::builder::GraphBuilder;

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A named parameter
    Parameter,
    /// A 2D sketch
    Sketch,
    /// A primitive part
    Part,
    /// A derived operation
    Operation,
    /// A named geometric reference
    Reference,
}

impl NodeKind {
    /// The kind name used as the node id prefix.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Parameter => "parameter",
            NodeKind::Sketch => "sketch",
            NodeKind::Part => "part",
            NodeKind::Operation => "operation",
            NodeKind::Reference => "reference",
        }
    }

    /// All kinds, in build-section order.
    pub fn all() -> [NodeKind; 5] {
        [
            NodeKind::Parameter,
            NodeKind::Sketch,
            NodeKind::Part,
            NodeKind::Operation,
            NodeKind::Reference,
        ]
    }

    /// Builds a node id from this kind and a name.
    pub fn id(self, name: &str) -> String {
        format!("{}:{}", self.name(), name)
    }
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Unique id, `kind:name`
    pub id: String,
    /// Node kind
    pub kind: NodeKind,
    /// Short name (the part after the colon)
    pub name: String,
    /// The raw declaration spec
    pub spec: Value,
    /// Content hash of the spec (16 hex chars of SHA-256)
    pub hash: String,
    /// Timestamp of the last successful build
    pub last_built: Option<SystemTime>,
    /// Whether the node's cached result is current
    pub is_valid: bool,
    /// True for pattern operations, which emit multiple parts
    pub is_pattern: bool,
}

impl GraphNode {
    /// Creates a node; the id is derived from kind and name.
    pub fn new(kind: NodeKind, name: impl Into<String>, spec: Value, hash: String) -> GraphNode {
        let name = name.into();
        GraphNode {
            id: kind.id(&name),
            kind,
            name,
            spec,
            hash,
            last_built: None,
            is_valid: true,
            is_pattern: false,
        }
    }
}

/// The dependency graph.
///
/// Wraps a petgraph [`DiGraph`] whose edges run dependency -> dependent,
/// keyed by string node ids, plus the node payloads in declaration order.
#[derive(Debug, Default)]
pub struct ModelGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    nodes: IndexMap<String, GraphNode>,
}

impl ModelGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, rejecting duplicate ids.
    pub fn add_node(&mut self, node: GraphNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode {
                id: node.id.clone(),
            });
        }
        let index = self.graph.add_node(node.id.clone());
        self.indices.insert(node.id.clone(), index);
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Adds a dependency edge: `dependency` must build before `dependent`,
    /// and invalidating `dependency` invalidates `dependent`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<(), GraphError> {
        let dep_index = self.index_of(dependency)?;
        let dependent_index = self.index_of(dependent)?;
        if !self.graph.contains_edge(dep_index, dependent_index) {
            self.graph.add_edge(dep_index, dependent_index, ());
        }
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.indices
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_string() })
    }

    /// True if a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up a node.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Looks up a node mutably.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    /// All node ids in declaration order.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Detects cycles. Returns one id list per strongly connected component
    /// with more than one node (or a self-loop); empty means a valid DAG.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        for component in tarjan_scc(&self.graph) {
            let is_cycle = component.len() > 1
                || (component.len() == 1
                    && self.graph.contains_edge(component[0], component[0]));
            if is_cycle {
                cycles.push(
                    component
                        .iter()
                        .map(|&index| self.graph[index].clone())
                        .collect(),
                );
            }
        }
        cycles
    }

    /// Nodes in build order: every dependency before its dependents.
    ///
    /// With `subset`, only the listed nodes are returned, still in a valid
    /// relative order.
    pub fn topological_sort(
        &self,
        subset: Option<&HashSet<String>>,
    ) -> Result<Vec<String>, GraphError> {
        let order = petgraph::algo::toposort(&self.graph, None).map_err(|cycle| {
            let id = self.graph[cycle.node_id()].clone();
            GraphError::CircularDependency {
                trace: format!("{} -> ... -> {}", id, id),
            }
        })?;

        let ids = order.into_iter().map(|index| self.graph[index].clone());
        Ok(match subset {
            Some(subset) => ids.filter(|id| subset.contains(id)).collect(),
            None => ids.collect(),
        })
    }

    /// Direct dependencies of a node (what it uses).
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependents of a node (what uses it).
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.indices.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// All transitive dependencies (ancestors) of a node.
    pub fn ancestors(&self, id: &str) -> HashSet<String> {
        let Some(&index) = self.indices.get(id) else {
            return HashSet::new();
        };
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, index);
        let mut result = HashSet::new();
        while let Some(node) = bfs.next(reversed) {
            if node != index {
                result.insert(self.graph[node].clone());
            }
        }
        result
    }

    /// All transitive dependents (descendants) of a node: the invalidation
    /// closure.
    pub fn descendants(&self, id: &str) -> HashSet<String> {
        let Some(&index) = self.indices.get(id) else {
            return HashSet::new();
        };
        let mut bfs = Bfs::new(&self.graph, index);
        let mut result = HashSet::new();
        while let Some(node) = bfs.next(&self.graph) {
            if node != index {
                result.insert(self.graph[node].clone());
            }
        }
        result
    }

    /// Marks a node invalid (needs rebuild).
    pub fn mark_invalid(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.is_valid = false;
        }
    }

    /// Marks a node valid, stamping the build time.
    pub fn mark_valid(&mut self, id: &str, timestamp: Option<SystemTime>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.is_valid = true;
            node.last_built = Some(timestamp.unwrap_or_else(SystemTime::now));
        }
    }

    /// Ids of all invalid nodes, in declaration order.
    pub fn invalid_nodes(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| !n.is_valid)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Node counts by kind.
    pub fn counts_by_kind(&self) -> HashMap<NodeKind, usize> {
        let mut counts = HashMap::new();
        for kind in NodeKind::all() {
            counts.insert(kind, 0);
        }
        for node in self.nodes.values() {
            *counts.entry(node.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Longest path length in the DAG (0 for an empty or flat graph).
    pub fn max_depth(&self) -> usize {
        let Ok(order) = self.topological_sort(None) else {
            return 0;
        };
        let mut depth: HashMap<String, usize> = HashMap::new();
        let mut max = 0;
        for id in order {
            let d = self
                .dependencies(&id)
                .iter()
                .map(|dep| depth.get(dep).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            max = max.max(d);
            depth.insert(id, d);
        }
        max
    }

    /// Nodes with no dependencies.
    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|id| self.dependencies(id).is_empty())
            .cloned()
            .collect()
    }

    /// Nodes nothing depends on.
    pub fn leaves(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|id| self.dependents(id).is_empty())
            .cloned()
            .collect()
    }

    /// Iterates nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }
}
