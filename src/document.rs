//! Document model.
//!
//! A document is a pre-parsed nested mapping with the top-level sections
//! `parameters`, `sketches`, `parts`, `operations`, `references`, and
//! `export`. All sections are optional; an empty document builds an empty
//! registry. Names may be arbitrary strings except that `:` is reserved
//! for node ids.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::DocumentError;
use crate::part::PartRegistry;
use crate::value::Value;

const SECTIONS: [&str; 6] = [
    "parameters",
    "sketches",
    "parts",
    "operations",
    "references",
    "export",
];

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// STL triangle mesh
    Stl,
    /// STEP boundary representation
    Step,
    /// 3MF package
    ThreeMf,
}

impl ExportFormat {
    /// Parses `stl`, `step`, or `3mf`.
    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s.to_ascii_lowercase().as_str() {
            "stl" => Some(ExportFormat::Stl),
            "step" => Some(ExportFormat::Step),
            "3mf" => Some(ExportFormat::ThreeMf),
            _ => None,
        }
    }

    /// The format name.
    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Stl => "stl",
            ExportFormat::Step => "step",
            ExportFormat::ThreeMf => "3mf",
        }
    }
}

/// The `export:` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportConfig {
    /// Preferred part to export
    pub default_part: Option<String>,
    /// Formats to emit
    pub formats: Vec<ExportFormat>,
    /// Color handling mode passed through to exporters
    pub color_mode: Option<String>,
    /// Fallback color passed through to exporters
    pub default_color: Option<Value>,
}

impl ExportConfig {
    fn from_value(value: &Value) -> Result<ExportConfig, DocumentError> {
        let map = value.as_map().ok_or_else(|| DocumentError::InvalidExport {
            reason: format!("export must be a mapping, got {}", value.type_name()),
        })?;

        let mut config = ExportConfig::default();

        if let Some(part) = map.get("default_part") {
            config.default_part = Some(
                part.as_str()
                    .ok_or_else(|| DocumentError::InvalidExport {
                        reason: format!("default_part must be a string, got {}", part.type_name()),
                    })?
                    .to_string(),
            );
        }

        if let Some(formats) = map.get("formats") {
            let items = formats.as_list().ok_or_else(|| DocumentError::InvalidExport {
                reason: "formats must be a list".to_string(),
            })?;
            for item in items {
                let name = item.as_str().ok_or_else(|| DocumentError::InvalidExport {
                    reason: format!("format entries must be strings, got {}", item.type_name()),
                })?;
                let format =
                    ExportFormat::parse(name).ok_or_else(|| DocumentError::InvalidExport {
                        reason: format!("unsupported format '{}'; use stl, step, or 3mf", name),
                    })?;
                config.formats.push(format);
            }
        }

        config.color_mode = map
            .get("color_mode")
            .and_then(Value::as_str)
            .map(str::to_string);
        config.default_color = map.get("default_color").cloned();

        Ok(config)
    }
}

/// A parsed document: the five declaration sections plus export config.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Parameter declarations
    pub parameters: IndexMap<String, Value>,
    /// Sketch declarations
    pub sketches: IndexMap<String, Value>,
    /// Part declarations
    pub parts: IndexMap<String, Value>,
    /// Operation declarations
    pub operations: IndexMap<String, Value>,
    /// Reference declarations
    pub references: IndexMap<String, Value>,
    /// Export configuration
    pub export: ExportConfig,
}

impl Document {
    /// An empty document.
    pub fn empty() -> Document {
        Document::default()
    }

    /// Interprets a pre-parsed value as a document.
    pub fn from_value(value: Value) -> Result<Document, DocumentError> {
        let map = match value {
            Value::Map(map) => map,
            Value::Null => return Ok(Document::empty()),
            other => {
                return Err(DocumentError::NotAMapping {
                    found: other.type_name().to_string(),
                })
            }
        };

        for key in map.keys() {
            if !SECTIONS.contains(&key.as_str()) {
                warn!(section = %key, "ignoring unknown top-level section");
            }
        }

        let mut document = Document::empty();
        document.parameters = section(&map, "parameters")?;
        document.sketches = section(&map, "sketches")?;
        document.parts = section(&map, "parts")?;
        document.operations = section(&map, "operations")?;
        document.references = section(&map, "references")?;

        if let Some(export) = map.get("export") {
            document.export = ExportConfig::from_value(export)?;
        }

        Ok(document)
    }

    /// True when no declarations are present.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
            && self.sketches.is_empty()
            && self.parts.is_empty()
            && self.operations.is_empty()
            && self.references.is_empty()
    }

    /// Selects the part to export.
    ///
    /// Priority: an explicit caller-provided name, then
    /// `export.default_part`, then the last declared operation, then the
    /// first declared part. Entries that name nothing in the registry fall
    /// through to the next priority, which matters for finishing-only
    /// documents (the operation mutates its input instead of creating a
    /// part) and for pattern operations (which emit `name_0 ...` instead of
    /// `name`).
    pub fn select_export_part(
        &self,
        registry: &PartRegistry,
        explicit: Option<&str>,
    ) -> Option<String> {
        if let Some(name) = explicit {
            if registry.exists(name) {
                return Some(name.to_string());
            }
        }

        if let Some(name) = &self.export.default_part {
            if registry.exists(name) {
                return Some(name.clone());
            }
        }

        for name in self.operations.keys().rev() {
            if registry.exists(name) {
                return Some(name.clone());
            }
            // A finishing operation's output is its input part
            if let Some(input) = self
                .operations
                .get(name)
                .and_then(|spec| spec.get("input"))
                .and_then(Value::as_str)
            {
                if registry.exists(input) {
                    return Some(input.to_string());
                }
            }
        }

        for name in self.parts.keys() {
            if registry.exists(name) {
                return Some(name.clone());
            }
        }

        None
    }
}

fn section(
    map: &IndexMap<String, Value>,
    name: &str,
) -> Result<IndexMap<String, Value>, DocumentError> {
    let Some(value) = map.get(name) else {
        return Ok(IndexMap::new());
    };

    let entries = match value {
        Value::Map(entries) => entries.clone(),
        Value::Null => IndexMap::new(),
        other => {
            return Err(DocumentError::InvalidSection {
                section: name.to_string(),
                found: other.type_name().to_string(),
            })
        }
    };

    for key in entries.keys() {
        if key.contains(':') {
            return Err(DocumentError::InvalidName {
                name: key.clone(),
                section: name.to_string(),
                reason: "names must not contain ':'".to_string(),
            });
        }
        if key.is_empty() {
            return Err(DocumentError::InvalidName {
                name: key.clone(),
                section: name.to_string(),
                reason: "names must not be empty".to_string(),
            });
        }
    }

    Ok(entries)
}
