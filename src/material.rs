//! Built-in materials and color parsing.
//!
//! Specs may carry `color` and `material` keys. Colors normalize to RGBA
//! floats in 0-1; named materials supply a color plus surface properties
//! for exporters and renderers downstream.

use crate::error::MaterialError;
use crate::value::Value;

/// A material definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Material name
    pub name: &'static str,
    /// Base RGB color, 0-1
    pub color: [f64; 3],
    /// Surface finish: matte, satin, glossy, metallic, brushed, polished
    pub finish: &'static str,
    /// 0 = dielectric, 1 = metal
    pub metalness: f64,
    /// 0 = mirror, 1 = rough
    pub roughness: f64,
    /// 0 = transparent, 1 = opaque
    pub opacity: f64,
}

const MATERIALS: [Material; 10] = [
    Material {
        name: "aluminum",
        color: [0.77, 0.78, 0.78],
        finish: "brushed",
        metalness: 1.0,
        roughness: 0.35,
        opacity: 1.0,
    },
    Material {
        name: "steel",
        color: [0.55, 0.56, 0.58],
        finish: "satin",
        metalness: 1.0,
        roughness: 0.45,
        opacity: 1.0,
    },
    Material {
        name: "brass",
        color: [0.78, 0.62, 0.25],
        finish: "polished",
        metalness: 1.0,
        roughness: 0.2,
        opacity: 1.0,
    },
    Material {
        name: "copper",
        color: [0.72, 0.45, 0.2],
        finish: "polished",
        metalness: 1.0,
        roughness: 0.25,
        opacity: 1.0,
    },
    Material {
        name: "pla_white",
        color: [0.95, 0.95, 0.92],
        finish: "matte",
        metalness: 0.0,
        roughness: 0.7,
        opacity: 1.0,
    },
    Material {
        name: "pla_black",
        color: [0.08, 0.08, 0.08],
        finish: "matte",
        metalness: 0.0,
        roughness: 0.7,
        opacity: 1.0,
    },
    Material {
        name: "petg_clear",
        color: [0.9, 0.93, 0.95],
        finish: "glossy",
        metalness: 0.0,
        roughness: 0.1,
        opacity: 0.35,
    },
    Material {
        name: "abs_gray",
        color: [0.5, 0.5, 0.52],
        finish: "satin",
        metalness: 0.0,
        roughness: 0.6,
        opacity: 1.0,
    },
    Material {
        name: "wood_oak",
        color: [0.65, 0.5, 0.32],
        finish: "satin",
        metalness: 0.0,
        roughness: 0.8,
        opacity: 1.0,
    },
    Material {
        name: "rubber",
        color: [0.12, 0.12, 0.12],
        finish: "matte",
        metalness: 0.0,
        roughness: 0.95,
        opacity: 1.0,
    },
];

/// Looks up a built-in material by name.
pub fn lookup(name: &str) -> Result<&'static Material, MaterialError> {
    MATERIALS
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| MaterialError::UnknownMaterial {
            name: name.to_string(),
        })
}

/// Names of all built-in materials.
pub fn names() -> Vec<&'static str> {
    MATERIALS.iter().map(|m| m.name).collect()
}

const NAMED_COLORS: [(&str, [f64; 3]); 12] = [
    ("black", [0.0, 0.0, 0.0]),
    ("white", [1.0, 1.0, 1.0]),
    ("red", [1.0, 0.0, 0.0]),
    ("green", [0.0, 1.0, 0.0]),
    ("blue", [0.0, 0.0, 1.0]),
    ("yellow", [1.0, 1.0, 0.0]),
    ("cyan", [0.0, 1.0, 1.0]),
    ("magenta", [1.0, 0.0, 1.0]),
    ("orange", [1.0, 0.65, 0.0]),
    ("purple", [0.5, 0.0, 0.5]),
    ("gray", [0.5, 0.5, 0.5]),
    ("silver", [0.75, 0.75, 0.75]),
];

/// Parses a color value to RGBA floats in 0-1.
///
/// Accepts a named color, `#rrggbb` / `#rrggbbaa` hex, or a 3/4-element
/// list of floats in 0-1 or ints in 0-255.
pub fn parse_color(value: &Value) -> Result<[f64; 4], MaterialError> {
    let invalid = || MaterialError::InvalidColor {
        value: value.to_string(),
    };

    match value {
        Value::Str(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix('#') {
                return parse_hex(hex).ok_or_else(invalid);
            }
            let lowered = s.to_ascii_lowercase();
            NAMED_COLORS
                .iter()
                .find(|(name, _)| *name == lowered)
                .map(|(_, rgb)| [rgb[0], rgb[1], rgb[2], 1.0])
                .ok_or_else(invalid)
        }
        Value::List(items) if items.len() == 3 || items.len() == 4 => {
            let mut channels = [0.0f64; 4];
            channels[3] = 1.0;
            let all_int = items.iter().all(|v| matches!(v, Value::Int(_)));
            let scale_255 = all_int && items.iter().any(|v| matches!(v, Value::Int(n) if *n > 1));
            for (i, item) in items.iter().enumerate() {
                let raw = item.as_f64().ok_or_else(invalid)?;
                let channel = if scale_255 { raw / 255.0 } else { raw };
                if !(0.0..=1.0).contains(&channel) {
                    return Err(invalid());
                }
                channels[i] = channel;
            }
            Ok(channels)
        }
        _ => Err(invalid()),
    }
}

fn parse_hex(hex: &str) -> Option<[f64; 4]> {
    let bytes = match hex.len() {
        6 => 3,
        8 => 4,
        _ => return None,
    };
    let mut channels = [0.0f64; 4];
    channels[3] = 1.0;
    for i in 0..bytes {
        let chunk = hex.get(i * 2..i * 2 + 2)?;
        let parsed = u8::from_str_radix(chunk, 16).ok()?;
        channels[i] = parsed as f64 / 255.0;
    }
    Some(channels)
}
