//! 2D sketches.
//!
//! A sketch is a planar profile: an ordered list of shapes on a base plane,
//! each tagged additive or subtractive. Sketches feed the extrude, revolve,
//! and loft builders.

use tracing::debug;

use crate::error::SketchError;

/// The coordinate plane a sketch lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// XY plane (normal +Z)
    Xy,
    /// XZ plane (normal +Y)
    Xz,
    /// YZ plane (normal +X)
    Yz,
}

impl Plane {
    /// Parses `XY`, `XZ`, or `YZ` (case-insensitive).
    pub fn parse(s: &str) -> Option<Plane> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XY" => Some(Plane::Xy),
            "XZ" => Some(Plane::Xz),
            "YZ" => Some(Plane::Yz),
            _ => None,
        }
    }

    /// The plane's normal direction.
    pub fn normal(self) -> [f64; 3] {
        match self {
            Plane::Xy => [0.0, 0.0, 1.0],
            Plane::Xz => [0.0, 1.0, 0.0],
            Plane::Yz => [1.0, 0.0, 0.0],
        }
    }

    /// Index of the coordinate along the plane normal (the "height" of a
    /// sketch origin above the plane).
    pub fn normal_index(self) -> usize {
        match self {
            Plane::Xy => 2,
            Plane::Xz => 1,
            Plane::Yz => 0,
        }
    }

    /// The plane name.
    pub fn name(self) -> &'static str {
        match self {
            Plane::Xy => "XY",
            Plane::Xz => "XZ",
            Plane::Yz => "YZ",
        }
    }

    /// Maps a 2D point on this plane (plus a height along the normal) to
    /// world coordinates.
    pub fn to_world(self, point: [f64; 2], height: f64) -> [f64; 3] {
        match self {
            Plane::Xy => [point[0], point[1], height],
            Plane::Xz => [point[0], height, point[1]],
            Plane::Yz => [height, point[0], point[1]],
        }
    }
}

/// Whether a shape adds or removes material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeOp {
    /// Adds material
    Add,
    /// Removes material
    Subtract,
}

impl ShapeOp {
    /// Parses `add` or `subtract`.
    pub fn parse(s: &str) -> Option<ShapeOp> {
        match s {
            "add" => Some(ShapeOp::Add),
            "subtract" => Some(ShapeOp::Subtract),
            _ => None,
        }
    }
}

/// Font style for text shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    /// Regular weight
    #[default]
    Regular,
    /// Bold
    Bold,
    /// Italic
    Italic,
    /// Bold italic
    BoldItalic,
}

impl FontStyle {
    /// Parses `regular`, `bold`, `italic`, or `bold-italic`.
    pub fn parse(s: &str) -> Option<FontStyle> {
        match s {
            "regular" => Some(FontStyle::Regular),
            "bold" => Some(FontStyle::Bold),
            "italic" => Some(FontStyle::Italic),
            "bold-italic" => Some(FontStyle::BoldItalic),
            _ => None,
        }
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    /// Anchor at the left edge
    #[default]
    Left,
    /// Anchor at the center
    Center,
    /// Anchor at the right edge
    Right,
}

impl HAlign {
    /// Parses `left`, `center`, or `right`.
    pub fn parse(s: &str) -> Option<HAlign> {
        match s {
            "left" => Some(HAlign::Left),
            "center" => Some(HAlign::Center),
            "right" => Some(HAlign::Right),
            _ => None,
        }
    }
}

/// Vertical text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    /// Anchor at the top
    Top,
    /// Anchor at the center
    Center,
    /// Anchor at the text baseline
    #[default]
    Baseline,
    /// Anchor at the bottom
    Bottom,
}

impl VAlign {
    /// Parses `top`, `center`, `baseline`, or `bottom`.
    pub fn parse(s: &str) -> Option<VAlign> {
        match s {
            "top" => Some(VAlign::Top),
            "center" => Some(VAlign::Center),
            "baseline" => Some(VAlign::Baseline),
            "bottom" => Some(VAlign::Bottom),
            _ => None,
        }
    }
}

/// Text rendering settings shared by text shapes, the text primitive, and
/// the engrave/emboss operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    /// The text to render (non-empty)
    pub text: String,
    /// Font size (height units)
    pub size: f64,
    /// Font family name
    pub font: String,
    /// Optional path to a font file
    pub font_path: Option<String>,
    /// Font style
    pub style: FontStyle,
    /// Horizontal alignment
    pub halign: HAlign,
    /// Vertical alignment
    pub valign: VAlign,
    /// Character spacing multiplier
    pub spacing: f64,
}

impl TextSpec {
    /// Creates a text spec with default font settings.
    pub fn new(text: impl Into<String>, size: f64) -> Self {
        Self {
            text: text.into(),
            size,
            font: "Liberation Sans".to_string(),
            font_path: None,
            style: FontStyle::default(),
            halign: HAlign::default(),
            valign: VAlign::default(),
            spacing: 1.0,
        }
    }
}

/// A 2D shape in a sketch.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape2d {
    /// Axis-aligned rectangle
    Rectangle {
        /// Width (positive)
        width: f64,
        /// Height (positive)
        height: f64,
        /// Center point in sketch space
        center: [f64; 2],
        /// Add or subtract
        op: ShapeOp,
    },

    /// Circle
    Circle {
        /// Radius (positive)
        radius: f64,
        /// Center point in sketch space
        center: [f64; 2],
        /// Add or subtract
        op: ShapeOp,
    },

    /// Polygon from points
    Polygon {
        /// Vertices (at least 3)
        points: Vec<[f64; 2]>,
        /// Whether the outline closes back to the first point
        closed: bool,
        /// Add or subtract
        op: ShapeOp,
    },

    /// Text profile. Text geometry is built in 3D by the backend, so the
    /// extrude builder feeds its distance straight into text construction
    /// instead of extruding again.
    Text {
        /// Rendering settings
        spec: TextSpec,
        /// Position in sketch space
        position: [f64; 2],
        /// Add or subtract
        op: ShapeOp,
    },
}

impl Shape2d {
    /// The add/subtract tag.
    pub fn op(&self) -> ShapeOp {
        match self {
            Shape2d::Rectangle { op, .. }
            | Shape2d::Circle { op, .. }
            | Shape2d::Polygon { op, .. }
            | Shape2d::Text { op, .. } => *op,
        }
    }

    /// True for text shapes, which are already 3D when built.
    pub fn is_text(&self) -> bool {
        matches!(self, Shape2d::Text { .. })
    }

    /// The shape kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape2d::Rectangle { .. } => "rectangle",
            Shape2d::Circle { .. } => "circle",
            Shape2d::Polygon { .. } => "polygon",
            Shape2d::Text { .. } => "text",
        }
    }

    /// 2D bounding box of the shape as (min, max) pairs.
    pub fn bounds_2d(&self) -> ([f64; 2], [f64; 2]) {
        match self {
            Shape2d::Rectangle {
                width,
                height,
                center,
                ..
            } => (
                [center[0] - width / 2.0, center[1] - height / 2.0],
                [center[0] + width / 2.0, center[1] + height / 2.0],
            ),
            Shape2d::Circle { radius, center, .. } => (
                [center[0] - radius, center[1] - radius],
                [center[0] + radius, center[1] + radius],
            ),
            Shape2d::Polygon { points, .. } => {
                let mut min = [f64::INFINITY; 2];
                let mut max = [f64::NEG_INFINITY; 2];
                for p in points {
                    for i in 0..2 {
                        min[i] = min[i].min(p[i]);
                        max[i] = max[i].max(p[i]);
                    }
                }
                (min, max)
            }
            Shape2d::Text { spec, position, .. } => {
                // Rough advance-width estimate, good enough for mock
                // geometry and bounding checks
                let width = 0.6 * spec.size * spec.spacing * spec.text.chars().count() as f64;
                let x0 = match spec.halign {
                    HAlign::Left => position[0],
                    HAlign::Center => position[0] - width / 2.0,
                    HAlign::Right => position[0] - width,
                };
                let y0 = match spec.valign {
                    VAlign::Top => position[1] - spec.size,
                    VAlign::Center => position[1] - spec.size / 2.0,
                    VAlign::Baseline | VAlign::Bottom => position[1],
                };
                ([x0, y0], [x0 + width, y0 + spec.size])
            }
        }
    }
}

/// A validated 2D sketch.
#[derive(Debug, Clone, PartialEq)]
pub struct Sketch {
    /// Sketch name
    pub name: String,
    /// Base plane
    pub plane: Plane,
    /// 3D origin of the sketch
    pub origin: [f64; 3],
    /// Shapes in declaration order
    pub shapes: Vec<Shape2d>,
}

impl Sketch {
    /// Creates a sketch, validating that it has at least one shape and at
    /// least one additive shape.
    pub fn new(
        name: impl Into<String>,
        plane: Plane,
        origin: [f64; 3],
        shapes: Vec<Shape2d>,
    ) -> Result<Sketch, SketchError> {
        let name = name.into();

        if shapes.is_empty() {
            return Err(SketchError::Invalid {
                sketch: name,
                reason: "must contain at least one shape".to_string(),
            });
        }
        if !shapes.iter().any(|s| s.op() == ShapeOp::Add) {
            return Err(SketchError::Invalid {
                sketch: name,
                reason: "must have at least one 'add' shape".to_string(),
            });
        }

        debug!(
            sketch = %name,
            plane = plane.name(),
            shapes = shapes.len(),
            "created sketch"
        );

        Ok(Sketch {
            name,
            plane,
            origin,
            shapes,
        })
    }

    /// Additive shapes, in order.
    pub fn additive_shapes(&self) -> impl Iterator<Item = &Shape2d> {
        self.shapes.iter().filter(|s| s.op() == ShapeOp::Add)
    }

    /// Subtractive shapes, in order.
    pub fn subtractive_shapes(&self) -> impl Iterator<Item = &Shape2d> {
        self.shapes.iter().filter(|s| s.op() == ShapeOp::Subtract)
    }

    /// True if any shape is text.
    pub fn has_text(&self) -> bool {
        self.shapes.iter().any(Shape2d::is_text)
    }

    /// Height of the sketch origin along the plane normal.
    pub fn normal_offset(&self) -> f64 {
        self.origin[self.plane.normal_index()]
    }
}
