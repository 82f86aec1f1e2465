//! The drawing interface entity synthesis writes into.

use std::path::Path;

use crate::color::ColorSpec;
use crate::error::SinkError;
use crate::mapping::LayerAttributes;
use crate::units;
use crate::CoordinatePair;

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Left,
    Center,
    Right,
}

impl TextAnchor {
    /// Map an SVG `text-anchor` value; anything unknown is left aligned.
    pub fn from_svg(anchor: Option<&str>) -> Self {
        match anchor.map(|a| a.trim().to_ascii_lowercase()).as_deref() {
            Some("middle") | Some("center") => TextAnchor::Center,
            Some("end") | Some("right") => TextAnchor::Right,
            _ => TextAnchor::Left,
        }
    }
}

/// Per-entity properties.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityAttributes {
    pub layer: String,
    pub color: ColorSpec,
    pub linetype: String,
    /// Hundredths of a millimeter.
    pub lineweight: Option<i16>,
}

impl From<&LayerAttributes> for EntityAttributes {
    fn from(attributes: &LayerAttributes) -> Self {
        Self {
            layer: attributes.layer.clone(),
            color: attributes.color,
            linetype: attributes.linetype.clone(),
            lineweight: attributes.lineweight_mm.map(units::lineweight_to_hundredths),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HatchFill {
    Solid,
    Pattern { name: String, scale: f64, angle: f64 },
}

/// A CAD drawing under construction.
///
/// Entity methods expect the entity's layer to exist already; callers use
/// [`ensure_layer`](DrawingSink::ensure_layer) first.
pub trait DrawingSink {
    /// Create `name` unless it exists. Existing layers are left untouched.
    fn ensure_layer(
        &mut self,
        name: &str,
        color: ColorSpec,
        linetype: &str,
        lineweight: Option<i16>,
    ) -> Result<(), SinkError>;

    fn add_line(
        &mut self,
        start: CoordinatePair,
        end: CoordinatePair,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    fn add_polyline(
        &mut self,
        points: &[CoordinatePair],
        closed: bool,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    /// Fill the closed `boundary` ring. Fails with
    /// [`SinkError::UnknownPattern`] for a pattern name the sink lacks.
    fn add_hatch(
        &mut self,
        boundary: &[CoordinatePair],
        fill: &HatchFill,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    fn add_circle(
        &mut self,
        center: CoordinatePair,
        radius: f64,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    /// `major_axis` is relative to `center`; `ratio` is minor over major.
    fn add_ellipse(
        &mut self,
        center: CoordinatePair,
        major_axis: CoordinatePair,
        ratio: f64,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    #[allow(clippy::too_many_arguments)]
    fn add_text(
        &mut self,
        content: &str,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        anchor: TextAnchor,
        style: &str,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    /// Multi-line text; lines are separated by `\n`.
    fn add_paragraph(
        &mut self,
        content: &str,
        position: CoordinatePair,
        height: f64,
        rotation: f64,
        style: &str,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError>;

    /// Register a text style and return the name entities should use.
    fn ensure_text_style(&mut self, name: &str, font: Option<&str>) -> Result<String, SinkError>;

    fn save(&self, path: &Path) -> Result<(), SinkError>;
}
