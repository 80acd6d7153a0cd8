//! # Declad - Declarative Parametric CAD Build Engine
//!
//! Declad turns a declarative document - named parameters, 2D sketches, 3D
//! primitives, derived operations, and geometric references - into a set of
//! uniquely named geometric artifacts, built through a CAD kernel hidden
//! behind a backend interface.
//!
//! ## Pipeline
//!
//! ```text
//! document -> dependency graph -> topological order -> builders -> registry
//! ```
//!
//! The engine resolves `${...}` parameter expressions, constructs a typed
//! DAG with content-addressed change tracking and cycle rejection, then
//! dispatches each node to the builder for its kind. Symbolic selectors
//! (`>Z`, `|Z and >X`) and point expressions (`beam.face('>Z').center`)
//! resolve against previously built geometry.
//!
//! ## Quick start
//!
//! ```rust
//! use declad::backend::MockBackend;
//! use declad::build::ModelBuilder;
//! use declad::document::Document;
//! use declad::value::Value;
//!
//! let json: serde_json::Value = serde_json::from_str(r#"{
//!     "parameters": {"size": 20},
//!     "parts": {
//!         "base": {"primitive": "box",
//!                  "width": "${size}", "height": "${size}", "depth": 5}
//!     }
//! }"#).unwrap();
//! let document = Document::from_value(Value::from(json)).unwrap();
//!
//! let mut builder = ModelBuilder::new(Box::new(MockBackend::new()));
//! builder.build(document).unwrap();
//! assert!(builder.registry().exists("base"));
//! ```
//!
//! ## Modules
//!
//! - [`value`]: document value tree and canonical JSON
//! - [`expr`]: expression lexer, parser, evaluator, and parameter resolver
//! - [`backend`]: the geometry capability trait and the recording mock
//! - [`selector`]: feature selector algebra
//! - [`points`]: point expression resolution
//! - [`spatial`]: spatial references, frames, rotation math
//! - [`sketch`]: 2D sketches and shapes
//! - [`part`]: parts and the registry
//! - [`graph`]: the dependency DAG, construction, and visualization
//! - [`build`]: component builders and the orchestrator
//! - [`document`]: document sections and export configuration
//! - [`error`]: the error taxonomy

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod build;
pub mod document;
pub mod error;
pub mod expr;
pub mod graph;
pub mod material;
pub mod metadata;
pub mod part;
pub mod points;
pub mod selector;
pub mod sketch;
pub mod spatial;
pub mod value;

// Re-exports for convenience
pub use backend::{Backend, BooleanOp, BoundingBox, Feature, FeatureKind, GeomHandle, MockBackend};
pub use build::ModelBuilder;
pub use document::{Document, ExportConfig, ExportFormat};
pub use error::{BuildError, ExprError, GraphError, PointError, SelectorError};
pub use expr::ParamResolver;
pub use graph::{GraphBuilder, ModelGraph, NodeKind};
pub use part::{Part, PartRegistry};
pub use points::PointResolver;
pub use selector::{SelectorResolver, SimpleSelector};
pub use sketch::{Plane, Shape2d, ShapeOp, Sketch};
pub use spatial::{Axis, Frame, SpatialRef};
pub use value::Value;

/// Builds a document against a backend and returns the builder holding the
/// resulting registry. The primary one-call entry point.
pub fn build_document(
    document: Document,
    backend: Box<dyn Backend>,
) -> Result<ModelBuilder, BuildError> {
    let mut builder = ModelBuilder::new(backend);
    builder.build(document)?;
    Ok(builder)
}
