//! Recording mock backend.
//!
//! Models every shape as an axis-aligned box and derives its faces, edges,
//! and vertices analytically, which is enough to exercise selectors, point
//! resolution, booleans, and metadata flow without a CAD kernel. Every call
//! is appended to an operation log that tests can inspect.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::Vector3;

use crate::backend::{
    Backend, BooleanOp, BoundingBox, Feature, FeatureKind, GeomHandle, LoftSection,
};
use crate::error::BackendError;
use crate::selector::{SelectorOp, SimpleSelector};
use crate::sketch::{Plane, Shape2d, TextSpec};
use crate::spatial::rotate_point;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
struct MockShape {
    bbox: BoundingBox,
    kind: String,
}

/// A backend that tracks bounding boxes and records operations.
#[derive(Debug, Default)]
pub struct MockBackend {
    shapes: HashMap<u64, MockShape>,
    next_id: u64,
    ops: Vec<String>,
}

impl MockBackend {
    /// Creates an empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded operation log.
    pub fn operations(&self) -> &[String] {
        &self.ops
    }

    /// Number of recorded operations whose name starts with `prefix`.
    pub fn count_ops(&self, prefix: &str) -> usize {
        self.ops.iter().filter(|op| op.starts_with(prefix)).count()
    }

    fn insert(&mut self, bbox: BoundingBox, kind: &str) -> GeomHandle {
        self.next_id += 1;
        self.shapes.insert(
            self.next_id,
            MockShape {
                bbox,
                kind: kind.to_string(),
            },
        );
        GeomHandle(self.next_id)
    }

    fn shape(&self, handle: &GeomHandle) -> Result<&MockShape, BackendError> {
        self.shapes.get(&handle.0).ok_or(BackendError::UnknownHandle)
    }

    fn record(&mut self, op: String) {
        self.ops.push(op);
    }

    fn box_faces(bbox: &BoundingBox) -> Vec<Feature> {
        let mut faces = Vec::with_capacity(6);
        let center = bbox.center();
        let mut id = 0;
        for axis in 0..3 {
            for (sign, coord) in [(-1.0, bbox.min[axis]), (1.0, bbox.max[axis])] {
                let mut face_center = center;
                face_center[axis] = coord;
                let mut normal = [0.0; 3];
                normal[axis] = sign;
                let mut min = bbox.min;
                let mut max = bbox.max;
                min[axis] = coord;
                max[axis] = coord;
                faces.push(Feature {
                    id,
                    kind: FeatureKind::Face,
                    center: face_center,
                    normal: Some(normal),
                    direction: None,
                    start: None,
                    end: None,
                    bbox: BoundingBox::new(min, max),
                });
                id += 1;
            }
        }
        faces
    }

    fn box_edges(bbox: &BoundingBox) -> Vec<Feature> {
        let mut edges = Vec::with_capacity(12);
        let mut id = 0;
        for axis in 0..3 {
            let i = (axis + 1) % 3;
            let j = (axis + 2) % 3;
            for &ci in &[bbox.min[i], bbox.max[i]] {
                for &cj in &[bbox.min[j], bbox.max[j]] {
                    let mut start = [0.0; 3];
                    let mut end = [0.0; 3];
                    start[axis] = bbox.min[axis];
                    end[axis] = bbox.max[axis];
                    start[i] = ci;
                    end[i] = ci;
                    start[j] = cj;
                    end[j] = cj;
                    let center = [
                        (start[0] + end[0]) / 2.0,
                        (start[1] + end[1]) / 2.0,
                        (start[2] + end[2]) / 2.0,
                    ];
                    let mut direction = [0.0; 3];
                    direction[axis] = 1.0;
                    edges.push(Feature {
                        id,
                        kind: FeatureKind::Edge,
                        center,
                        normal: None,
                        direction: Some(direction),
                        start: Some(start),
                        end: Some(end),
                        bbox: BoundingBox::new(
                            [
                                start[0].min(end[0]),
                                start[1].min(end[1]),
                                start[2].min(end[2]),
                            ],
                            [
                                start[0].max(end[0]),
                                start[1].max(end[1]),
                                start[2].max(end[2]),
                            ],
                        ),
                    });
                    id += 1;
                }
            }
        }
        edges
    }

    fn box_vertices(bbox: &BoundingBox) -> Vec<Feature> {
        bbox.corners()
            .iter()
            .enumerate()
            .map(|(id, corner)| Feature {
                id: id as u64,
                kind: FeatureKind::Vertex,
                center: *corner,
                normal: None,
                direction: None,
                start: None,
                end: None,
                bbox: BoundingBox::new(*corner, *corner),
            })
            .collect()
    }

    fn filter_by_selector(
        features: Vec<Feature>,
        selector: &SimpleSelector,
        kind: FeatureKind,
    ) -> Vec<Feature> {
        let axis = selector.axis.index();
        let axis_unit = selector.axis.unit_array();

        match (kind, selector.op) {
            (FeatureKind::Face, SelectorOp::Max) | (FeatureKind::Face, SelectorOp::Min) => {
                let sign = if selector.op == SelectorOp::Max { 1.0 } else { -1.0 };
                features
                    .into_iter()
                    .filter(|f| {
                        f.normal
                            .map(|n| (dot(n, axis_unit) - sign).abs() < EPS)
                            .unwrap_or(false)
                    })
                    .collect()
            }
            (FeatureKind::Face, SelectorOp::Parallel) => features
                .into_iter()
                .filter(|f| f.normal.map(|n| dot(n, axis_unit).abs() < EPS).unwrap_or(false))
                .collect(),
            (FeatureKind::Face, SelectorOp::Perpendicular) => features
                .into_iter()
                .filter(|f| {
                    f.normal
                        .map(|n| (dot(n, axis_unit).abs() - 1.0).abs() < EPS)
                        .unwrap_or(false)
                })
                .collect(),
            (FeatureKind::Edge, SelectorOp::Parallel) => features
                .into_iter()
                .filter(|f| {
                    f.direction
                        .map(|d| (dot(d, axis_unit).abs() - 1.0).abs() < EPS)
                        .unwrap_or(false)
                })
                .collect(),
            (FeatureKind::Edge, SelectorOp::Perpendicular) => features
                .into_iter()
                .filter(|f| {
                    f.direction
                        .map(|d| dot(d, axis_unit).abs() < EPS)
                        .unwrap_or(false)
                })
                .collect(),
            (FeatureKind::Edge, SelectorOp::Max)
            | (FeatureKind::Edge, SelectorOp::Min)
            | (FeatureKind::Vertex, SelectorOp::Max)
            | (FeatureKind::Vertex, SelectorOp::Min) => {
                let extremum = features
                    .iter()
                    .map(|f| f.center[axis])
                    .fold(
                        if selector.op == SelectorOp::Max {
                            f64::NEG_INFINITY
                        } else {
                            f64::INFINITY
                        },
                        |acc, v| {
                            if selector.op == SelectorOp::Max {
                                acc.max(v)
                            } else {
                                acc.min(v)
                            }
                        },
                    );
                features
                    .into_iter()
                    .filter(|f| (f.center[axis] - extremum).abs() < EPS)
                    .collect()
            }
            // Parallel/perpendicular are not meaningful for vertices
            (FeatureKind::Vertex, _) => Vec::new(),
        }
    }

    fn shape_world_bounds(shape: &Shape2d, plane: Plane, origin: [f64; 3], heights: [f64; 2]) -> BoundingBox {
        let (min2, max2) = shape.bounds_2d();
        let mut bbox: Option<BoundingBox> = None;
        for p in [min2, max2, [min2[0], max2[1]], [max2[0], min2[1]]] {
            for h in heights {
                let w = plane.to_world(p, h);
                let world = [w[0] + origin[0], w[1] + origin[1], w[2] + origin[2]];
                let point_box = BoundingBox::new(world, world);
                bbox = Some(match bbox {
                    Some(b) => b.union(&point_box),
                    None => point_box,
                });
            }
        }
        bbox.unwrap_or(BoundingBox::new([0.0; 3], [0.0; 3]))
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn points_bbox(points: &[[f64; 3]]) -> Option<BoundingBox> {
    let mut iter = points.iter();
    let first = iter.next()?;
    let mut bbox = BoundingBox::new(*first, *first);
    for p in iter {
        bbox = bbox.union(&BoundingBox::new(*p, *p));
    }
    Some(bbox)
}

impl Backend for MockBackend {
    fn make_box(
        &mut self,
        width: f64,
        height: f64,
        depth: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("make_box({}, {}, {})", width, height, depth));
        Ok(self.insert(
            BoundingBox::new(
                [-width / 2.0, -height / 2.0, -depth / 2.0],
                [width / 2.0, height / 2.0, depth / 2.0],
            ),
            "box",
        ))
    }

    fn make_cylinder(&mut self, radius: f64, height: f64) -> Result<GeomHandle, BackendError> {
        self.record(format!("make_cylinder({}, {})", radius, height));
        Ok(self.insert(
            BoundingBox::new(
                [-radius, -radius, -height / 2.0],
                [radius, radius, height / 2.0],
            ),
            "cylinder",
        ))
    }

    fn make_sphere(&mut self, radius: f64) -> Result<GeomHandle, BackendError> {
        self.record(format!("make_sphere({})", radius));
        Ok(self.insert(
            BoundingBox::new([-radius; 3], [radius; 3]),
            "sphere",
        ))
    }

    fn make_cone(
        &mut self,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!(
            "make_cone({}, {}, {})",
            bottom_radius, top_radius, height
        ));
        let r = bottom_radius.max(top_radius);
        Ok(self.insert(
            BoundingBox::new([-r, -r, -height / 2.0], [r, r, height / 2.0]),
            "cone",
        ))
    }

    fn make_torus(
        &mut self,
        major_radius: f64,
        minor_radius: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("make_torus({}, {})", major_radius, minor_radius));
        let r = major_radius + minor_radius;
        Ok(self.insert(
            BoundingBox::new([-r, -r, -minor_radius], [r, r, minor_radius]),
            "torus",
        ))
    }

    fn make_text(&mut self, spec: &TextSpec, height: f64) -> Result<GeomHandle, BackendError> {
        self.record(format!("make_text({:?}, {})", spec.text, height));
        let shape = Shape2d::Text {
            spec: spec.clone(),
            position: [0.0, 0.0],
            op: crate::sketch::ShapeOp::Add,
        };
        let (min2, max2) = shape.bounds_2d();
        let (z0, z1) = if height >= 0.0 { (0.0, height) } else { (height, 0.0) };
        Ok(self.insert(
            BoundingBox::new([min2[0], min2[1], z0], [max2[0], max2[1], z1]),
            "text",
        ))
    }

    fn combine(
        &mut self,
        op: BooleanOp,
        a: &GeomHandle,
        b: &GeomHandle,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("combine({}, #{}, #{})", op.name(), a.0, b.0));
        let shape_a = self.shape(a)?.clone();
        let shape_b = self.shape(b)?.clone();
        let bbox = match op {
            BooleanOp::Union => shape_a.bbox.union(&shape_b.bbox),
            // Cutting cannot grow the base; the mock keeps its bounds
            BooleanOp::Difference => shape_a.bbox,
            BooleanOp::Intersection => shape_a
                .bbox
                .intersection(&shape_b.bbox)
                .ok_or_else(|| BackendError::Operation("empty intersection".to_string()))?,
        };
        Ok(self.insert(bbox, op.name()))
    }

    fn translate(
        &mut self,
        shape: &GeomHandle,
        offset: [f64; 3],
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!(
            "translate(#{}, [{}, {}, {}])",
            shape.0, offset[0], offset[1], offset[2]
        ));
        let s = self.shape(shape)?.clone();
        let bbox = BoundingBox::new(
            [
                s.bbox.min[0] + offset[0],
                s.bbox.min[1] + offset[1],
                s.bbox.min[2] + offset[2],
            ],
            [
                s.bbox.max[0] + offset[0],
                s.bbox.max[1] + offset[1],
                s.bbox.max[2] + offset[2],
            ],
        );
        Ok(self.insert(bbox, &s.kind))
    }

    fn rotate(
        &mut self,
        shape: &GeomHandle,
        axis_start: [f64; 3],
        axis_end: [f64; 3],
        angle_deg: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("rotate(#{}, {})", shape.0, angle_deg));
        let s = self.shape(shape)?.clone();
        let axis = Vector3::from([
            axis_end[0] - axis_start[0],
            axis_end[1] - axis_start[1],
            axis_end[2] - axis_start[2],
        ]);
        if axis.norm() < EPS {
            return Err(BackendError::Operation(
                "rotation axis has zero length".to_string(),
            ));
        }
        let axis = axis.normalize();
        let rotated: Vec<[f64; 3]> = s
            .bbox
            .corners()
            .iter()
            .map(|corner| rotate_point(*corner, angle_deg, axis, axis_start))
            .collect();
        let bbox = points_bbox(&rotated)
            .ok_or_else(|| BackendError::Operation("empty shape".to_string()))?;
        Ok(self.insert(bbox, &s.kind))
    }

    fn fillet(
        &mut self,
        shape: &GeomHandle,
        edges: &[Feature],
        radius: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("fillet(#{}, {} edges, r={})", shape.0, edges.len(), radius));
        let s = self.shape(shape)?.clone();
        Ok(self.insert(s.bbox, &s.kind))
    }

    fn chamfer(
        &mut self,
        shape: &GeomHandle,
        edges: &[Feature],
        length: f64,
        length2: Option<f64>,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!(
            "chamfer(#{}, {} edges, l={}, l2={:?})",
            shape.0,
            edges.len(),
            length,
            length2
        ));
        let s = self.shape(shape)?.clone();
        Ok(self.insert(s.bbox, &s.kind))
    }

    fn extrude(
        &mut self,
        shape: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        distance: f64,
        taper_deg: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!(
            "extrude({}, {}, d={}, taper={})",
            shape.kind_name(),
            plane.name(),
            distance,
            taper_deg
        ));
        let heights = if distance >= 0.0 { [0.0, distance] } else { [distance, 0.0] };
        let bbox = Self::shape_world_bounds(shape, plane, origin, heights);
        Ok(self.insert(bbox, "extrude"))
    }

    fn revolve(
        &mut self,
        shape: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        axis: [f64; 3],
        axis_origin: [f64; 3],
        angle_deg: f64,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!(
            "revolve({}, {}, angle={})",
            shape.kind_name(),
            plane.name(),
            angle_deg
        ));
        let profile = Self::shape_world_bounds(shape, plane, origin, [0.0, 0.0]);
        let axis_v = Vector3::from(axis);
        if axis_v.norm() < EPS {
            return Err(BackendError::Operation(
                "revolve axis has zero length".to_string(),
            ));
        }
        let axis_v = axis_v.normalize();

        // Sweep the profile corners through the revolution in small steps
        let steps = 24;
        let mut points = Vec::new();
        for corner in profile.corners() {
            for step in 0..=steps {
                let theta = angle_deg * step as f64 / steps as f64;
                points.push(rotate_point(corner, theta, axis_v, axis_origin));
            }
        }
        let bbox = points_bbox(&points)
            .ok_or_else(|| BackendError::Operation("empty profile".to_string()))?;
        Ok(self.insert(bbox, "revolve"))
    }

    fn loft(
        &mut self,
        sections: &[LoftSection],
        plane: Plane,
        ruled: bool,
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("loft({} sections, ruled={})", sections.len(), ruled));
        let mut bbox: Option<BoundingBox> = None;
        for section in sections {
            let section_box = Self::shape_world_bounds(
                &section.shape,
                plane,
                [0.0; 3],
                [section.offset, section.offset],
            );
            bbox = Some(match bbox {
                Some(b) => b.union(&section_box),
                None => section_box,
            });
        }
        let bbox =
            bbox.ok_or_else(|| BackendError::Operation("loft needs sections".to_string()))?;
        Ok(self.insert(bbox, "loft"))
    }

    fn sweep(
        &mut self,
        profile: &Shape2d,
        plane: Plane,
        origin: [f64; 3],
        path: &[[f64; 3]],
    ) -> Result<GeomHandle, BackendError> {
        self.record(format!("sweep({}, {} path points)", profile.kind_name(), path.len()));
        if path.is_empty() {
            return Err(BackendError::Operation("sweep path is empty".to_string()));
        }
        let profile_box = Self::shape_world_bounds(profile, plane, origin, [0.0, 0.0]);
        let mut bbox = profile_box;
        for point in path {
            let shifted = BoundingBox::new(
                [
                    profile_box.min[0] + point[0],
                    profile_box.min[1] + point[1],
                    profile_box.min[2] + point[2],
                ],
                [
                    profile_box.max[0] + point[0],
                    profile_box.max[1] + point[1],
                    profile_box.max[2] + point[2],
                ],
            );
            bbox = bbox.union(&shifted);
        }
        Ok(self.insert(bbox, "sweep"))
    }

    fn convex_hull(&mut self, points: &[[f64; 3]]) -> Result<GeomHandle, BackendError> {
        self.record(format!("convex_hull({} points)", points.len()));
        let bbox = points_bbox(points)
            .ok_or_else(|| BackendError::Operation("hull needs points".to_string()))?;
        Ok(self.insert(bbox, "hull"))
    }

    fn faces(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::box_faces(&self.shape(shape)?.bbox))
    }

    fn edges(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::box_edges(&self.shape(shape)?.bbox))
    }

    fn vertices(&self, shape: &GeomHandle) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::box_vertices(&self.shape(shape)?.bbox))
    }

    fn select_faces(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::filter_by_selector(
            self.faces(shape)?,
            selector,
            FeatureKind::Face,
        ))
    }

    fn select_edges(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::filter_by_selector(
            self.edges(shape)?,
            selector,
            FeatureKind::Edge,
        ))
    }

    fn select_vertices(
        &self,
        shape: &GeomHandle,
        selector: &SimpleSelector,
    ) -> Result<Vec<Feature>, BackendError> {
        Ok(Self::filter_by_selector(
            self.vertices(shape)?,
            selector,
            FeatureKind::Vertex,
        ))
    }

    fn bounding_box(&self, shape: &GeomHandle) -> Result<BoundingBox, BackendError> {
        Ok(self.shape(shape)?.bbox)
    }

    fn center(&self, shape: &GeomHandle) -> Result<[f64; 3], BackendError> {
        Ok(self.shape(shape)?.bbox.center())
    }

    fn tessellate_vertices(&self, shape: &GeomHandle) -> Result<Vec<[f64; 3]>, BackendError> {
        Ok(self.shape(shape)?.bbox.corners().to_vec())
    }

    fn clone_shape(&mut self, shape: &GeomHandle) -> Result<GeomHandle, BackendError> {
        self.record(format!("clone(#{})", shape.0));
        let s = self.shape(shape)?.clone();
        Ok(self.insert(s.bbox, &s.kind))
    }

    fn export_stl(&self, shape: &GeomHandle, path: &Path) -> Result<(), BackendError> {
        self.shape(shape)?;
        tracing::debug!(handle = shape.0, path = %path.display(), "mock stl export");
        Ok(())
    }

    fn export_step(&self, shape: &GeomHandle, path: &Path) -> Result<(), BackendError> {
        self.shape(shape)?;
        tracing::debug!(handle = shape.0, path = %path.display(), "mock step export");
        Ok(())
    }
}
