//! Spatial references and frames.
//!
//! A [`SpatialRef`] is a position with optional orientation data; a
//! [`Frame`] is a full right-handed local coordinate system derived from
//! one. Everything geometric that the engine hands around - reference
//! anchors, face normals, rotation axes - is expressed with these two
//! types.

use nalgebra::{Matrix4, Vector3};

use crate::value::Value;

/// Tolerance below which a vector is treated as zero-length.
const ZERO_TOLERANCE: f64 = 1e-10;

/// A world axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// World X
    X,
    /// World Y
    Y,
    /// World Z
    Z,
}

impl Axis {
    /// Parses `X`, `Y`, or `Z` (case-insensitive).
    pub fn parse(s: &str) -> Option<Axis> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Some(Axis::X),
            "Y" => Some(Axis::Y),
            "Z" => Some(Axis::Z),
            _ => None,
        }
    }

    /// The unit vector of this axis.
    pub fn unit(self) -> Vector3<f64> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }

    /// The unit vector as a plain array.
    pub fn unit_array(self) -> [f64; 3] {
        let v = self.unit();
        [v.x, v.y, v.z]
    }

    /// Component index (0, 1, 2) of this axis.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The axis letter.
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

/// Resolves an axis spec to a normalized direction vector.
///
/// Accepts an axis name (`"X"`, `"Y"`, `"Z"`) or a `[x, y, z]` triple.
/// Zero-length vectors are rejected.
pub fn resolve_axis(value: &Value) -> Result<Vector3<f64>, String> {
    if let Some(s) = value.as_str() {
        return Axis::parse(s)
            .map(Axis::unit)
            .ok_or_else(|| format!("invalid axis '{}': use X, Y, Z, or [x, y, z]", s));
    }
    if let Some(triple) = value.as_triple() {
        let v = Vector3::new(triple[0], triple[1], triple[2]);
        if v.norm() < ZERO_TOLERANCE {
            return Err("axis vector cannot be zero length".to_string());
        }
        return Ok(v.normalize());
    }
    Err(format!(
        "invalid axis specification: {}; use X, Y, Z, or [x, y, z]",
        value
    ))
}

/// Rotates a point about an axis through an origin by Rodrigues' formula.
///
/// `angle_deg` is in degrees; `axis` must be normalized.
pub fn rotate_point(
    point: [f64; 3],
    angle_deg: f64,
    axis: Vector3<f64>,
    origin: [f64; 3],
) -> [f64; 3] {
    let theta = angle_deg.to_radians();
    let p = Vector3::new(point[0], point[1], point[2]) - Vector3::from(origin);

    let cos_theta = theta.cos();
    let sin_theta = theta.sin();

    // p*cos + (u x p)*sin + u*(u . p)*(1 - cos)
    let rotated =
        p * cos_theta + axis.cross(&p) * sin_theta + axis * (axis.dot(&p)) * (1.0 - cos_theta);

    let back = rotated + Vector3::from(origin);
    [back.x, back.y, back.z]
}

/// What a spatial reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A bare location
    Point,
    /// A face (orientation is the normal)
    Face,
    /// An edge (orientation is the direction)
    Edge,
    /// An axis (orientation is the direction)
    Axis,
}

/// Universal spatial reference: a position with optional orientation.
///
/// Orientation and tangent vectors are normalized at construction; a frame
/// derived from a reference without orientation is world-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialRef {
    /// 3D position
    pub position: Vector3<f64>,
    /// Primary direction (normal for faces, direction for edges/axes)
    pub orientation: Option<Vector3<f64>>,
    /// Secondary direction, for edges
    pub tangent: Option<Vector3<f64>>,
    /// Kind tag
    pub kind: RefKind,
}

impl SpatialRef {
    /// Creates a plain point reference.
    pub fn point(position: [f64; 3]) -> Self {
        Self {
            position: Vector3::from(position),
            orientation: None,
            tangent: None,
            kind: RefKind::Point,
        }
    }

    /// Creates a reference with orientation; the vector is normalized, and
    /// a near-zero vector is treated as no orientation.
    pub fn with_orientation(position: [f64; 3], orientation: [f64; 3], kind: RefKind) -> Self {
        Self {
            position: Vector3::from(position),
            orientation: normalize_opt(Vector3::from(orientation)),
            tangent: None,
            kind,
        }
    }

    /// Creates a reference with orientation and tangent.
    pub fn with_tangent(
        position: [f64; 3],
        orientation: [f64; 3],
        tangent: [f64; 3],
        kind: RefKind,
    ) -> Self {
        Self {
            position: Vector3::from(position),
            orientation: normalize_opt(Vector3::from(orientation)),
            tangent: normalize_opt(Vector3::from(tangent)),
            kind,
        }
    }

    /// The local frame of this reference: world-aligned when no orientation
    /// is present, otherwise derived from the normal (and tangent, if any).
    pub fn frame(&self) -> Frame {
        match (self.orientation, self.tangent) {
            (None, _) => Frame {
                origin: self.position,
                x_axis: Vector3::x(),
                y_axis: Vector3::y(),
                z_axis: Vector3::z(),
            },
            (Some(normal), None) => Frame::from_normal(self.position, normal),
            (Some(normal), Some(tangent)) => {
                Frame::from_normal_tangent(self.position, normal, tangent)
            }
        }
    }

    /// Returns a new reference offset from this one.
    ///
    /// With `in_local_frame`, the delta is interpreted in this reference's
    /// frame (only meaningful when an orientation is present); otherwise it
    /// is a world-space offset. Orientation data is inherited.
    pub fn offset(&self, delta: [f64; 3], in_local_frame: bool) -> SpatialRef {
        let world_offset = if in_local_frame && self.orientation.is_some() {
            let frame = self.frame();
            frame.x_axis * delta[0] + frame.y_axis * delta[1] + frame.z_axis * delta[2]
        } else {
            Vector3::from(delta)
        };

        SpatialRef {
            position: self.position + world_offset,
            orientation: self.orientation,
            tangent: self.tangent,
            kind: self.kind,
        }
    }

    /// Position as a plain array.
    pub fn position_array(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }
}

fn normalize_opt(v: Vector3<f64>) -> Option<Vector3<f64>> {
    let norm = v.norm();
    if norm < ZERO_TOLERANCE {
        None
    } else {
        Some(v / norm)
    }
}

/// Local coordinate system: origin plus three orthonormal axes forming a
/// right-handed system.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Origin point
    pub origin: Vector3<f64>,
    /// X axis (normalized)
    pub x_axis: Vector3<f64>,
    /// Y axis (normalized)
    pub y_axis: Vector3<f64>,
    /// Z axis (normalized)
    pub z_axis: Vector3<f64>,
}

impl Frame {
    /// Constructs a frame from an origin and a normal, choosing arbitrary
    /// perpendicular X/Y axes. The normal becomes the Z axis.
    pub fn from_normal(origin: Vector3<f64>, normal: Vector3<f64>) -> Frame {
        let z = normal.normalize();

        // Cross against whichever world axis the normal is not close to
        let reference = if z.z.abs() < 0.9 {
            Vector3::z()
        } else {
            Vector3::x()
        };
        let x = z.cross(&reference).normalize();
        let y = z.cross(&x).normalize();

        Frame {
            origin,
            x_axis: x,
            y_axis: y,
            z_axis: z,
        }
    }

    /// Constructs a frame from origin, normal, and tangent. The tangent is
    /// orthogonalized against the normal (Gram-Schmidt) and becomes X.
    pub fn from_normal_tangent(
        origin: Vector3<f64>,
        normal: Vector3<f64>,
        tangent: Vector3<f64>,
    ) -> Frame {
        let z = normal.normalize();
        let mut x = tangent.normalize();
        x = (x - z * x.dot(&z)).normalize();
        let y = z.cross(&x).normalize();

        Frame {
            origin,
            x_axis: x,
            y_axis: y,
            z_axis: z,
        }
    }

    /// Transforms a local point into world coordinates.
    pub fn to_world(&self, local: [f64; 3]) -> [f64; 3] {
        let world = self.origin
            + self.x_axis * local[0]
            + self.y_axis * local[1]
            + self.z_axis * local[2];
        [world.x, world.y, world.z]
    }

    /// Transforms a world point into this frame's local coordinates.
    pub fn to_local(&self, world: [f64; 3]) -> [f64; 3] {
        let relative = Vector3::from(world) - self.origin;
        [
            relative.dot(&self.x_axis),
            relative.dot(&self.y_axis),
            relative.dot(&self.z_axis),
        ]
    }

    /// The 4x4 homogeneous matrix of this frame: columns are the axes, the
    /// fourth column is the origin.
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new(
            self.x_axis.x,
            self.y_axis.x,
            self.z_axis.x,
            self.origin.x,
            self.x_axis.y,
            self.y_axis.y,
            self.z_axis.y,
            self.origin.y,
            self.x_axis.z,
            self.y_axis.z,
            self.z_axis.z,
            self.origin.z,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Checks that the axes are unit length, mutually perpendicular, and
    /// right-handed, within `tolerance`.
    pub fn is_orthonormal(&self, tolerance: f64) -> bool {
        let unit = (self.x_axis.norm() - 1.0).abs() <= tolerance
            && (self.y_axis.norm() - 1.0).abs() <= tolerance
            && (self.z_axis.norm() - 1.0).abs() <= tolerance;
        let perpendicular = self.x_axis.dot(&self.y_axis).abs() <= tolerance
            && self.y_axis.dot(&self.z_axis).abs() <= tolerance
            && self.z_axis.dot(&self.x_axis).abs() <= tolerance;
        let right_handed = (self.x_axis.cross(&self.y_axis) - self.z_axis).norm() <= tolerance;
        unit && perpendicular && right_handed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn test_from_normal_is_orthonormal() {
        let normals = [
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 1.0],
            [0.3, -0.2, 0.9],
        ];
        for n in normals {
            let frame = Frame::from_normal(Vector3::zeros(), Vector3::from(n));
            assert!(frame.is_orthonormal(TOL), "not orthonormal for {:?}", n);
            assert!((frame.z_axis - Vector3::from(n).normalize()).norm() < TOL);
        }
    }

    #[test]
    fn test_from_normal_tangent_orthogonalizes() {
        let frame = Frame::from_normal_tangent(
            Vector3::zeros(),
            Vector3::z(),
            // Not perpendicular to the normal
            Vector3::new(1.0, 0.0, 0.5),
        );
        assert!(frame.is_orthonormal(TOL));
        assert!((frame.x_axis - Vector3::x()).norm() < TOL);
    }

    #[test]
    fn test_local_world_round_trip() {
        let frame = Frame::from_normal(Vector3::new(10.0, 20.0, 30.0), Vector3::new(1.0, 1.0, 0.0));
        let local = [1.5, -2.0, 4.0];
        let world = frame.to_world(local);
        let back = frame.to_local(world);
        for i in 0..3 {
            assert!((back[i] - local[i]).abs() < TOL);
        }
    }

    #[test]
    fn test_matrix_transforms_origin() {
        let frame = Frame::from_normal(Vector3::new(10.0, 20.0, 30.0), Vector3::z());
        let m = frame.matrix();
        let origin = m * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.x - 10.0).abs() < TOL);
        assert!((origin.y - 20.0).abs() < TOL);
        assert!((origin.z - 30.0).abs() < TOL);
    }

    #[test]
    fn test_spatial_ref_normalizes_orientation() {
        let r = SpatialRef::with_orientation([0.0, 0.0, 0.0], [0.0, 0.0, 5.0], RefKind::Face);
        let orientation = r.orientation.unwrap();
        assert!((orientation.norm() - 1.0).abs() < TOL);
        assert!((orientation - Vector3::z()).norm() < TOL);
    }

    #[test]
    fn test_offset_world_and_local() {
        let face = SpatialRef::with_orientation([0.0, 0.0, 10.0], [0.0, 0.0, 1.0], RefKind::Face);

        let world = face.offset([10.0, 0.0, 0.0], false);
        assert!((world.position - Vector3::new(10.0, 0.0, 10.0)).norm() < TOL);

        // Local Z follows the normal
        let local = face.offset([0.0, 0.0, 2.0], true);
        assert!((local.position - Vector3::new(0.0, 0.0, 12.0)).norm() < TOL);
    }

    #[test]
    fn test_point_ref_frame_is_world_aligned() {
        let frame = SpatialRef::point([1.0, 2.0, 3.0]).frame();
        assert_eq!(frame.x_axis, Vector3::x());
        assert_eq!(frame.y_axis, Vector3::y());
        assert_eq!(frame.z_axis, Vector3::z());
    }

    #[test]
    fn test_rodrigues_quarter_turn() {
        let rotated = rotate_point([1.0, 0.0, 0.0], 90.0, Vector3::z(), [0.0, 0.0, 0.0]);
        assert!((rotated[0] - 0.0).abs() < TOL);
        assert!((rotated[1] - 1.0).abs() < TOL);
        assert!((rotated[2] - 0.0).abs() < TOL);
    }

    #[test]
    fn test_rodrigues_about_offset_origin() {
        let rotated = rotate_point([2.0, 0.0, 0.0], 180.0, Vector3::z(), [1.0, 0.0, 0.0]);
        assert!((rotated[0] - 0.0).abs() < TOL);
        assert!((rotated[1] - 0.0).abs() < TOL);
    }

    #[test]
    fn test_resolve_axis() {
        assert_eq!(
            resolve_axis(&Value::Str("Z".to_string())).unwrap(),
            Vector3::z()
        );
        let diagonal = resolve_axis(&Value::List(vec![
            Value::Int(1),
            Value::Int(1),
            Value::Int(0),
        ]))
        .unwrap();
        assert!((diagonal.norm() - 1.0).abs() < TOL);
        assert!(resolve_axis(&Value::Str("W".to_string())).is_err());
        assert!(resolve_axis(&Value::List(vec![
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
        ]))
        .is_err());
    }
}
