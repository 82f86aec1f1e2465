//! Normalized drawing primitives and the loaded document.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::style::Style;
use crate::transform::{self, Matrix};
use crate::Polyline;

/// Which source element a polyline primitive was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PolylineOrigin {
    Path,
    Polyline,
    Polygon,
    Rect { rx: Option<f64>, ry: Option<f64> },
}

impl PolylineOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolylineOrigin::Path => "path",
            PolylineOrigin::Polyline => "polyline",
            PolylineOrigin::Polygon => "polygon",
            PolylineOrigin::Rect { .. } => "rect",
        }
    }
}

/// A run of text anchored at the primitive's single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Lines are separated by `\n`.
    pub content: String,
    /// Raw `text-anchor` value.
    pub anchor: Option<String>,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f64,
    pub font_family: Option<String>,
    /// Uniform scale of the accumulated transform, applied to the font size.
    pub scale: f64,
}

/// Kind-specific data of a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Line,
    Polyline { closed: bool, origin: PolylineOrigin },
    Circle { radius_x: f64, radius_y: f64 },
    Ellipse { radius_x: f64, radius_y: f64 },
    Text(TextRun),
}

/// One drawing element in absolute drawing coordinates (millimeters, Y up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub shape: Shape,
    pub points: Polyline,
    pub style: Style,
    /// Distinct class names, inherited classes first.
    pub classes: Vec<String>,
    pub id: Option<String>,
    /// Raw attributes of the source element.
    pub attributes: BTreeMap<String, String>,
}

impl Primitive {
    pub fn new(shape: Shape, points: Polyline) -> Self {
        Self {
            shape,
            points,
            style: Style::new(),
            classes: Vec::new(),
            id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.shape {
            Shape::Line => "line",
            Shape::Polyline { .. } => "polyline",
            Shape::Circle { .. } => "circle",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Text(_) => "text",
        }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|class| class == name)
    }

    /// Human readable name for log lines: `kind#id`, `kind(a.b)` or `kind`.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => format!("{}#{}", self.kind(), id),
            _ if !self.classes.is_empty() => format!("{}({})", self.kind(), self.classes.join(".")),
            _ => self.kind().to_string(),
        }
    }

    /// Map this primitive through `matrix`, keeping radii, text rotation
    /// and text scale consistent with the mapped geometry.
    pub fn transformed(&self, matrix: &Matrix) -> Primitive {
        let points = matrix.apply(&self.points);
        let shape = match &self.shape {
            Shape::Circle { radius_x, radius_y } | Shape::Ellipse { radius_x, radius_y } => {
                let center = self.points.first().copied().unwrap_or_else(|| (0.0, 0.0).into());
                let mapped = matrix.point(center);
                let rx = mapped.distance_to(matrix.point((center.x + radius_x, center.y).into()));
                let ry = mapped.distance_to(matrix.point((center.x, center.y + radius_y).into()));
                match self.shape {
                    Shape::Circle { .. } => Shape::Circle { radius_x: rx, radius_y: ry },
                    _ => Shape::Ellipse { radius_x: rx, radius_y: ry },
                }
            }
            Shape::Text(run) => {
                let angle = run.rotation.to_radians();
                let direction = matrix.vector((angle.cos(), angle.sin()).into());
                Shape::Text(TextRun {
                    rotation: direction.y.atan2(direction.x).to_degrees(),
                    scale: run.scale * matrix.scale_factor(),
                    ..run.clone()
                })
            }
            other => other.clone(),
        };
        Primitive {
            shape,
            points,
            ..self.clone()
        }
    }
}

/// View-box rectangle in user units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn new(min_x: f64, min_y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Parse a `viewBox` attribute. `None` unless it holds four numbers.
    pub fn parse(value: &str) -> Option<Self> {
        match transform::parse_numbers(value)?.as_slice() {
            &[min_x, min_y, width, height] => Some(Self::new(min_x, min_y, width, height)),
            _ => None,
        }
    }
}

/// A loaded SVG drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    pub width_mm: f64,
    pub height_mm: f64,
    pub view_box: ViewBox,
    pub scale_x: f64,
    pub scale_y: f64,
    pub primitives: Vec<Primitive>,
    pub warnings: Vec<String>,
}

impl Document {
    /// Distinct class names over all primitives, sorted.
    pub fn collect_classes(&self) -> Vec<String> {
        let classes: BTreeSet<&String> = self.primitives.iter().flat_map(|p| &p.classes).collect();
        classes.into_iter().cloned().collect()
    }

    pub fn summary(&self) -> DocumentSummary {
        let mut entity_counts = BTreeMap::new();
        for primitive in &self.primitives {
            *entity_counts.entry(primitive.kind().to_string()).or_insert(0) += 1;
        }
        DocumentSummary {
            path: self.path.clone(),
            entity_counts,
            total_entities: self.primitives.len(),
            warnings: self.warnings.clone(),
            known_classes: self.collect_classes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub path: PathBuf,
    pub entity_counts: BTreeMap<String, usize>,
    pub total_entities: usize,
    pub warnings: Vec<String>,
    pub known_classes: Vec<String>,
}

impl DocumentSummary {
    /// `circle: 2, line: 5`, sorted by kind.
    pub fn format_counts(&self) -> String {
        self.entity_counts
            .iter()
            .map(|(kind, count)| format!("{}: {}", kind, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} elements ({})",
            self.path.display(),
            self.total_entities,
            self.format_counts()
        )
    }
}

/// Append the classes of `current` that `inherited` does not already hold.
pub fn merge_classes(inherited: &[String], current: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(inherited.len() + current.len());
    for class in inherited.iter().chain(current) {
        if !merged.contains(class) {
            merged.push(class.clone());
        }
    }
    merged
}
