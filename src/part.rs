//! Parts and the part registry.
//!
//! A [`Part`] couples a name with an exclusively owned backend geometry
//! handle, a metadata map, a transform history, and a tracked position. The
//! [`PartRegistry`] holds every part built during one build, enforces name
//! uniqueness, and iterates in insertion order.

use indexmap::IndexMap;

use crate::backend::{Backend, BoundingBox, GeomHandle};
use crate::error::{BackendError, RegistryError};
use crate::value::Value;

/// One applied transform, as recorded in a part's history.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    /// Transform kind: `translate` or `rotate`
    pub kind: String,
    /// The resolved transform parameters
    pub params: Value,
    /// Tracked position before the transform
    pub position_before: [f64; 3],
    /// Tracked position after the transform
    pub position_after: [f64; 3],
}

/// A named geometric part.
#[derive(Debug)]
pub struct Part {
    /// Unique name within the registry
    pub name: String,
    /// Backend geometry handle, exclusively owned by this part
    pub geometry: GeomHandle,
    /// Metadata map (appearance and operation bookkeeping)
    pub metadata: IndexMap<String, Value>,
    /// Transforms applied, in order
    pub history: Vec<TransformRecord>,
    /// Tracked position: the center at construction, then updated by
    /// transforms that record a new post-position
    pub position: [f64; 3],
}

impl Part {
    /// Creates a part, initializing the tracked position to the backend's
    /// center of the geometry.
    pub fn new(
        name: impl Into<String>,
        geometry: GeomHandle,
        metadata: IndexMap<String, Value>,
        backend: &dyn Backend,
    ) -> Result<Part, BackendError> {
        let position = backend.center(&geometry)?;
        Ok(Part {
            name: name.into(),
            geometry,
            metadata,
            history: Vec::new(),
            position,
        })
    }

    /// Duplicates this part under a new name. The geometry is cloned
    /// through the backend; metadata, history, and position are copied.
    pub fn clone_as(
        &self,
        new_name: impl Into<String>,
        backend: &mut dyn Backend,
    ) -> Result<Part, BackendError> {
        Ok(Part {
            name: new_name.into(),
            geometry: backend.clone_shape(&self.geometry)?,
            metadata: self.metadata.clone(),
            history: self.history.clone(),
            position: self.position,
        })
    }

    /// The geometry's bounding box.
    pub fn bounds(&self, backend: &dyn Backend) -> Result<BoundingBox, BackendError> {
        backend.bounding_box(&self.geometry)
    }

    /// The geometry's current center.
    pub fn center(&self, backend: &dyn Backend) -> Result<[f64; 3], BackendError> {
        backend.center(&self.geometry)
    }

    /// Appends a transform record and updates the tracked position.
    pub fn record_transform(
        &mut self,
        kind: impl Into<String>,
        params: Value,
        position_after: [f64; 3],
    ) {
        self.history.push(TransformRecord {
            kind: kind.into(),
            params,
            position_before: self.position,
            position_after,
        });
        self.position = position_after;
    }
}

/// Name -> part mapping built during a single build.
#[derive(Debug, Default)]
pub struct PartRegistry {
    parts: IndexMap<String, Part>,
}

impl PartRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a part, rejecting duplicate names.
    pub fn add(&mut self, part: Part) -> Result<(), RegistryError> {
        if self.parts.contains_key(&part.name) {
            return Err(RegistryError::Duplicate {
                name: part.name.clone(),
            });
        }
        self.parts.insert(part.name.clone(), part);
        Ok(())
    }

    /// Looks up a part by name.
    pub fn get(&self, name: &str) -> Result<&Part, RegistryError> {
        self.parts.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Looks up a part mutably.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Part, RegistryError> {
        if !self.parts.contains_key(name) {
            return Err(RegistryError::NotFound {
                name: name.to_string(),
                available: self.names(),
            });
        }
        Ok(&mut self.parts[name])
    }

    /// True if a part with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Removes a part, preserving the relative order of the rest. Returns
    /// the removed part, if any.
    pub fn remove(&mut self, name: &str) -> Option<Part> {
        self.parts.shift_remove(name)
    }

    /// All part names, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.parts.keys().cloned().collect()
    }

    /// Iterates parts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True when no parts have been registered.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
