//! Geometry backend abstraction.
//!
//! The engine never talks to a CAD kernel directly; it depends on the
//! [`Backend`] capability trait. A production backend delegates to a real
//! kernel; [`mock::MockBackend`] models shapes as axis-aligned boxes and
//! records every operation, which is what the test suite runs against.
//!
//! Handles are opaque and exclusively owned: a [`GeomHandle`] is not
//! `Clone`, and duplication goes through [`Backend::clone_shape`].

pub mod mock;

use std::path::Path;

use crate::error::BackendError;
use crate::selector::SimpleSelector;
use crate::sketch::{Plane, Shape2d, TextSpec};

pub use self::mock::MockBackend;

/// Opaque handle to backend-owned geometry.
///
/// Deliberately not `Clone`: a part exclusively owns its handle, and
/// copies must go through the backend so the kernel can duplicate the
/// underlying shape.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GeomHandle(pub(crate) u64);

impl GeomHandle {
    /// The raw id, for diagnostics only.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: [f64; 3],
    /// Maximum corner
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Creates a bounding box from two corners.
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// The center point.
    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Size along each axis.
    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// The smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    /// The overlapping region of both boxes, if any.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min = [
            self.min[0].max(other.min[0]),
            self.min[1].max(other.min[1]),
            self.min[2].max(other.min[2]),
        ];
        let max = [
            self.max[0].min(other.max[0]),
            self.max[1].min(other.max[1]),
            self.max[2].min(other.max[2]),
        ];
        if min[0] <= max[0] && min[1] <= max[1] && min[2] <= max[2] {
            Some(BoundingBox { min, max })
        } else {
            None
        }
    }

    /// The eight corner points.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [b[0], a[1], a[2]],
            [a[0], b[1], a[2]],
            [b[0], b[1], a[2]],
            [a[0], a[1], b[2]],
            [b[0], a[1], b[2]],
            [a[0], b[1], b[2]],
            [b[0], b[1], b[2]],
        ]
    }
}

/// The kind of a geometric feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureKind {
    /// A face
    Face,
    /// An edge
    Edge,
    /// A vertex
    Vertex,
}

impl FeatureKind {
    /// The kind name.
    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Face => "face",
            FeatureKind::Edge => "edge",
            FeatureKind::Vertex => "vertex",
        }
    }

    /// Parses `face`, `edge`, or `vertex`.
    pub fn parse(s: &str) -> Option<FeatureKind> {
        match s {
            "face" => Some(FeatureKind::Face),
            "edge" => Some(FeatureKind::Edge),
            "vertex" => Some(FeatureKind::Vertex),
            _ => None,
        }
    }
}

/// A face, edge, or vertex reported by the backend.
///
/// Identity (for selector set algebra) is the `(kind, id)` pair; the rest
/// is measurement data the resolvers read.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Backend-assigned identity within the owning shape
    pub id: u64,
    /// Feature kind
    pub kind: FeatureKind,
    /// Center point (backend center, falling back to bounding-box center)
    pub center: [f64; 3],
    /// Outward normal, for faces
    pub normal: Option<[f64; 3]>,
    /// Direction, for edges
    pub direction: Option<[f64; 3]>,
    /// Start point, for edges
    pub start: Option<[f64; 3]>,
    /// End point, for edges
    pub end: Option<[f64; 3]>,
    /// Bounding box of the feature
    pub bbox: BoundingBox,
}

impl Feature {
    /// Identity key for set operations.
    pub fn key(&self) -> (FeatureKind, u64) {
        (self.kind, self.id)
    }
}

/// Boolean combination modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Keep material from both shapes
    Union,
    /// Remove the tool from the base
    Difference,
    /// Keep only the overlap
    Intersection,
}

impl BooleanOp {
    /// Parses `union`, `difference`, or `intersection`.
    pub fn parse(s: &str) -> Option<BooleanOp> {
        match s {
            "union" => Some(BooleanOp::Union),
            "difference" => Some(BooleanOp::Difference),
            "intersection" => Some(BooleanOp::Intersection),
            _ => None,
        }
    }

    /// The operation name.
    pub fn name(self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Difference => "difference",
            BooleanOp::Intersection => "intersection",
        }
    }
}

/// A loft section: a profile shape at a height along the plane normal.
#[derive(Debug, Clone, PartialEq)]
pub struct LoftSection {
    /// The profile shape
    pub shape: Shape2d,
    /// Offset along the base plane's normal, relative to the first section
    pub offset: f64,
}

/// Capability contract every geometry backend satisfies.
///
/// The engine holds a `dyn Backend` and never inspects which concrete
/// implementation is present.
pub trait Backend {
    /// Creates an axis-aligned box centered at the origin.
    fn make_box(&mut self, width: f64, height: f64, depth: f64)
        -> Result<GeomHandle, BackendError>;

    /// Creates a cylinder along +Z, centered at the origin.
    fn make_cylinder(&mut self, radius: f64, height: f64) -> Result<GeomHandle, BackendError>;

    /// Creates a sphere centered at the origin.
    fn make_sphere(&mut self, radius: f64) -> Result<GeomHandle, BackendError>;

    /// Creates a cone along +Z with the given base and top radii.
    fn make_cone(
        &mut self,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<GeomHandle, BackendError>;

    /// Creates a torus in the XY plane.
    fn make_torus(&mut self, major_radius: f64, minor_radius: f64)
        -> Result<GeomHandle, BackendError>;

    /// Renders text as a solid of the given extrusion height.
    fn make_text(&mut self, spec: &TextSpec, height: f64) -> Result<GeomHandle, BackendError>;

    /// Combines two shapes.
    fn combine(
        &mut self,
        op: BooleanOp,
        a: &GeomHandle,
        b: &GeomHandle,
    ) -> Result<GeomHandle, BackendError>;

    /// Translates a shape.
    fn translate(&mut self, shape: &GeomHandle, offset: [f64; 3])
        -> Result<GeomHandle, BackendError>;

    /// Rotates a shape about the axis through `axis_start` and `axis_end`.
    fn rotate(
        &mut self,
        shape: &GeomHandle,
        axis_start: [f64; 3],
        axis_end: [f64; 3],
        angle_deg: f64,
    ) -> Result<GeomHandle, BackendError>;

    /// Rounds the given edges.
    fn fillet(
        &mut self,
        shape: &GeomHandle,
        edges: &[Feature],
        radius: f64,
    ) -> Result<GeomHandle, BackendError>;

    /// Bevels the given edges. `length2` gives an asymmetric chamfer.
    fn chamfer(
        &mut self,
        shape: &GeomHandle,
        edges: &[Feature],
        length: f64,
        length2: Option<f64>,
    ) -> Result<GeomHandle, BackendError>;

    /// Extrudes a 2D shape from a plane. Text shapes are constructed at the
    /// full distance directly rather than re-extruded.
    fn extrude(
        &mut self,
        shape: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        distance: f64,
        taper_deg: f64,
    ) -> Result<GeomHandle, BackendError>;

    /// Revolves a 2D shape about `axis` through `axis_origin`.
    fn revolve(
        &mut self,
        shape: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        axis: [f64; 3],
        axis_origin: [f64; 3],
        angle_deg: f64,
    ) -> Result<GeomHandle, BackendError>;

    /// Lofts between profile sections stacked along the plane normal.
    fn loft(
        &mut self,
        sections: &[LoftSection],
        plane: Plane,
        ruled: bool,
    ) -> Result<GeomHandle, BackendError>;

    /// Sweeps a profile along a path.
    fn sweep(
        &mut self,
        profile: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        path: &[[f64; 3]],
    ) -> Result<GeomHandle, BackendError>;

    /// Builds the convex hull of a point cloud.
    fn convex_hull(&mut self, points: &[[f64; 3]]) -> Result<GeomHandle, BackendError>;

    /// All faces of a shape.
    fn faces(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError>;

    /// All edges of a shape.
    fn edges(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError>;

    /// All vertices of a shape.
    fn vertices(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError>;

    /// Faces matching a simple selector.
    fn select_faces(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError>;

    /// Edges matching a simple selector.
    fn select_edges(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError>;

    /// Vertices matching a simple selector.
    fn select_vertices(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError>;

    /// The shape's bounding box.
    fn bounding_box(&self, shape: &GeomHandle) -> Result<BoundingBox, BackendError>;

    /// The shape's center.
    fn center(&self, shape: &GeomHandle) -> Result<[f64; 3], BackendError>;

    /// Vertex positions of a tessellation of the shape.
    fn tessellate_vertices(&self, shape: &GeomHandle) -> Result<Vec<[f64; 3]>, BackendError>;

    /// Duplicates a shape.
    fn clone_shape(&mut self, shape: &GeomHandle) -> Result<GeomHandle, BackendError>;

    /// Writes the shape as STL.
    fn export_stl(&self, shape: &GeomHandle, path: &Path) -> Result<(), BackendError>;

    /// Writes the shape as STEP.
    fn export_step(&self, shape: &GeomHandle, path: &Path) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::new([0.5, -1.0, 0.0], [2.0, 0.5, 3.0]);
        let u = a.union(&b);
        assert_eq!(u.min, [0.0, -1.0, 0.0]);
        assert_eq!(u.max, [2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_bounding_box_intersection() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = BoundingBox::new([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.min, [1.0, 1.0, 1.0]);
        assert_eq!(i.max, [2.0, 2.0, 2.0]);

        let far = BoundingBox::new([10.0, 10.0, 10.0], [11.0, 11.0, 11.0]);
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_bounding_box_center_and_size() {
        let b = BoundingBox::new([-5.0, -5.0, 0.0], [5.0, 5.0, 10.0]);
        assert_eq!(b.center(), [0.0, 0.0, 5.0]);
        assert_eq!(b.size(), [10.0, 10.0, 10.0]);
    }
}
