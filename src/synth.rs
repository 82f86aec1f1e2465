//! Turn resolved primitives into sink entities.

use std::collections::HashMap;

use log::{debug, warn};

use crate::color::{normalize_color, ColorSpec};
use crate::error::SinkError;
use crate::mapping::{LayerAttributes, MappingResolver, DEFAULT_STYLE_NAME, MATERIAL_PREFIX};
use crate::primitive::{Primitive, Shape, TextRun};
use crate::sink::{DrawingSink, EntityAttributes, HatchFill, TextAnchor};
use crate::style::is_no_paint;
use crate::units;
use crate::CoordinatePair;

/// Relative tolerance under which two radii count as equal.
pub const RADIUS_TOLERANCE: f64 = 1e-3;

/// Text height when `font-size` is missing or not positive.
pub const DEFAULT_TEXT_HEIGHT: f64 = 3.5;

/// Strokes at most this wide do not plot.
const NEGLIGIBLE_STROKE_WIDTH: f64 = 0.1;

const PROJECTION_CLASS: &str = "projection";
const CUT_CLASS: &str = "cut";

fn is_close(a: f64, b: f64, relative: f64) -> bool {
    (a - b).abs() <= relative * a.abs().max(b.abs())
}

fn has_material(primitive: &Primitive) -> bool {
    primitive
        .classes
        .iter()
        .any(|class| class.starts_with(MATERIAL_PREFIX))
}

/// Writes primitives into a [`DrawingSink`].
///
/// Text styles registered with the sink are remembered for the lifetime of
/// the synthesizer, so use one synthesizer per conversion run.
pub struct EntitySynthesizer<'a> {
    resolver: &'a MappingResolver,
    text_styles: HashMap<String, String>,
    log_messages: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> EntitySynthesizer<'a> {
    pub fn new(resolver: &'a MappingResolver) -> Self {
        Self {
            resolver,
            text_styles: HashMap::new(),
            log_messages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// One line per entity written, in order.
    pub fn log_messages(&self) -> &[String] {
        &self.log_messages
    }

    /// Fallbacks taken while writing (for example an unknown hatch pattern).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// `(log_messages, warnings)`
    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.log_messages, self.warnings)
    }

    fn log(&mut self, message: String) {
        debug!("{}", message);
        self.log_messages.push(message);
    }

    /// Write the entities for `primitive` on the layer described by
    /// `layer`, which must already exist in `sink`. Returns the number of
    /// entities written.
    pub fn write<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        primitive: &Primitive,
        layer: &LayerAttributes,
    ) -> Result<usize, SinkError> {
        let attributes = EntityAttributes::from(layer);
        match &primitive.shape {
            Shape::Line => self.write_line(sink, primitive, &attributes),
            Shape::Polyline { closed, .. } => {
                self.write_polyline(sink, primitive, *closed, &attributes)
            }
            Shape::Circle { radius_x, radius_y } => {
                let center = center_of(primitive)?;
                if is_close(*radius_x, *radius_y, RADIUS_TOLERANCE) {
                    sink.add_circle(center, *radius_x, &attributes)?;
                    self.log(format!("CIRCLE r={:.3}", radius_x));
                    Ok(1)
                } else {
                    self.write_ellipse(sink, center, *radius_x, *radius_y, &attributes)
                }
            }
            Shape::Ellipse { radius_x, radius_y } => {
                let center = center_of(primitive)?;
                self.write_ellipse(sink, center, *radius_x, *radius_y, &attributes)
            }
            Shape::Text(run) => self.write_text(sink, primitive, run, &attributes),
        }
    }

    fn write_line<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        primitive: &Primitive,
        attributes: &EntityAttributes,
    ) -> Result<usize, SinkError> {
        match primitive.points.as_slice() {
            [start, end] => {
                sink.add_line(*start, *end, attributes)?;
                self.log(format!("LINE: {} -> {}", primitive.label(), attributes.layer));
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn write_polyline<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        primitive: &Primitive,
        closed: bool,
        attributes: &EntityAttributes,
    ) -> Result<usize, SinkError> {
        let points = &primitive.points;
        if points.len() < 2 {
            return Ok(0);
        }
        let style = &primitive.style;
        let has_fill = closed && !is_no_paint(style.fill());
        let material = has_material(primitive);
        let negligible_stroke = style.has_negligible_stroke(NEGLIGIBLE_STROKE_WIDTH);

        if !closed && material && primitive.has_class(PROJECTION_CLASS) && negligible_stroke {
            debug!("write_polyline: skipping projection line {}", primitive.label());
            return Ok(0);
        }

        let mut written = 0;
        if has_fill {
            self.write_hatch(sink, primitive, attributes)?;
            written += 1;
            if material && !primitive.has_class(CUT_CLASS) && negligible_stroke {
                debug!("write_polyline: hatch only for {}", primitive.label());
                return Ok(written);
            }
        }

        let outline = match points.as_slice() {
            [first, .., last] if closed && first == last => &points[..points.len() - 1],
            _ => &points[..],
        };
        sink.add_polyline(outline, closed, attributes)?;
        self.log(format!(
            "LWPOLYLINE({}): {} -> {} closed={}",
            outline.len(),
            primitive.label(),
            attributes.layer,
            closed
        ));
        Ok(written + 1)
    }

    fn write_hatch<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        primitive: &Primitive,
        attributes: &EntityAttributes,
    ) -> Result<(), SinkError> {
        let style = &primitive.style;
        let pattern = self.resolver.pattern_for(style);
        let color = pattern
            .as_ref()
            .and_then(|pattern| pattern.color)
            .or_else(|| style.fill().map(|fill| normalize_color(fill, attributes.color)))
            .unwrap_or(attributes.color);
        let hatch_attributes = EntityAttributes {
            color,
            ..attributes.clone()
        };
        let fill = match &pattern {
            Some(pattern) if !pattern.solid => HatchFill::Pattern {
                name: pattern.name.clone(),
                scale: pattern.scale,
                angle: pattern.angle,
            },
            _ => HatchFill::Solid,
        };

        match sink.add_hatch(&primitive.points, &fill, &hatch_attributes) {
            Err(SinkError::UnknownPattern(name)) => {
                let warning = format!(
                    "Warning: unknown hatch pattern {} for {}, using a solid fill",
                    name,
                    primitive.label()
                );
                warn!("{}", warning);
                self.warnings.push(warning);
                sink.add_hatch(&primitive.points, &HatchFill::Solid, &hatch_attributes)?;
            }
            other => other?,
        }
        self.log(format!("HATCH: {} -> {}", primitive.label(), attributes.layer));
        Ok(())
    }

    fn write_ellipse<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        center: CoordinatePair,
        radius_x: f64,
        radius_y: f64,
        attributes: &EntityAttributes,
    ) -> Result<usize, SinkError> {
        let ratio = if radius_x == 0.0 { 1.0 } else { radius_y / radius_x };
        sink.add_ellipse(center, CoordinatePair::new(radius_x, 0.0), ratio, attributes)?;
        self.log(format!("ELLIPSE rx={:.3} ry={:.3}", radius_x, radius_y));
        Ok(1)
    }

    fn write_text<S: DrawingSink + ?Sized>(
        &mut self,
        sink: &mut S,
        primitive: &Primitive,
        run: &TextRun,
        attributes: &EntityAttributes,
    ) -> Result<usize, SinkError> {
        if run.content.is_empty() {
            return Ok(0);
        }
        let position = center_of(primitive)?;
        let font_size = primitive
            .style
            .font_size()
            .filter(|size| *size > 0.0)
            .unwrap_or(DEFAULT_TEXT_HEIGHT);
        // Sizes with an absolute unit are already in drawing millimeters.
        let absolute = primitive
            .style
            .get("font-size")
            .map_or(false, units::has_absolute_unit);
        let scale = if !absolute && run.scale.is_finite() && run.scale > 0.0 {
            run.scale
        } else {
            1.0
        };
        let height = font_size * scale;
        let family = run
            .font_family
            .as_deref()
            .or_else(|| primitive.style.font_family());
        let style = self.text_style(sink, family);

        let preview: String = run.content.chars().take(20).collect();
        if run.content.contains('\n') {
            sink.add_paragraph(&run.content, position, height, run.rotation, &style, attributes)?;
            self.log(format!("MTEXT '{}' h={:.2}", preview, height));
        } else {
            let anchor = TextAnchor::from_svg(run.anchor.as_deref());
            sink.add_text(
                &run.content,
                position,
                height,
                run.rotation,
                anchor,
                &style,
                attributes,
            )?;
            self.log(format!("TEXT '{}' h={:.2}", preview, height));
        }
        Ok(1)
    }

    /// Style name for a font family, registering it with the sink once.
    fn text_style<S: DrawingSink + ?Sized>(&mut self, sink: &mut S, family: Option<&str>) -> String {
        let spec = self.resolver.font_for(family);
        if let Some(name) = self.text_styles.get(&spec.name) {
            return name.clone();
        }
        let name = match sink.ensure_text_style(&spec.name, spec.font.as_deref()) {
            Ok(name) => name,
            Err(e) => {
                warn!("text_style: {}, using {}", e, DEFAULT_STYLE_NAME);
                DEFAULT_STYLE_NAME.to_string()
            }
        };
        self.text_styles.insert(spec.name, name.clone());
        name
    }
}

fn center_of(primitive: &Primitive) -> Result<CoordinatePair, SinkError> {
    primitive
        .points
        .first()
        .copied()
        .ok_or_else(|| SinkError::Degenerate(format!("{} has no position", primitive.label())))
}
