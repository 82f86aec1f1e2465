//! Walk an SVG tree and produce flat primitives in drawing coordinates.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::dom::{self, Element};
use crate::error::Error;
use crate::path::{self, MAX_SEGMENT_LENGTH, MIN_SAMPLES};
use crate::primitive::{merge_classes, Document, PolylineOrigin, Primitive, Shape, TextRun, ViewBox};
use crate::simplify::simplify_polyline;
use crate::style::{Style, StyleCascade};
use crate::transform::{self, Matrix};
use crate::units;
use crate::{CoordinatePair, Polyline};

/// Primitives and warnings produced by one element.
type Built = (Vec<Primitive>, Vec<String>);

/// Accumulated per-branch state handed to the primitive constructors.
struct Context<'a> {
    element: &'a Element,
    transform: Matrix,
    style: &'a Style,
    classes: &'a [String],
}

impl<'a> Context<'a> {
    fn id(&self) -> &str {
        self.element.id().unwrap_or("-")
    }

    fn primitive(&self, shape: Shape, points: Polyline) -> Primitive {
        Primitive {
            shape,
            points,
            style: self.style.clone(),
            classes: self.classes.to_vec(),
            id: self.element.id().map(str::to_string),
            attributes: self.element.attributes.clone(),
        }
    }

    /// Numeric attribute, zero when absent.
    fn number(&self, name: &str) -> Result<f64, String> {
        match self.element.attr(name).map(str::trim) {
            None | Some("") => Ok(0.0),
            Some(value) => value.parse::<f64>().map_err(|_| {
                format!(
                    "Warning: could not parse {} attribute {}={:?} (id={})",
                    self.element.tag,
                    name,
                    value,
                    self.id()
                )
            }),
        }
    }
}

/// Loads SVG documents. A loader can be reused; every [`load`](Loader::load)
/// call tracks its own set of documents in progress.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    stylesheets: Vec<String>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add external style-sheet text, applied before any `<style>` element.
    pub fn with_stylesheet(mut self, text: impl Into<String>) -> Self {
        self.add_stylesheet(text);
        self
    }

    pub fn add_stylesheet(&mut self, text: impl Into<String>) {
        self.stylesheets.push(text.into());
    }

    /// Load the SVG file at `path`, including embedded SVG images.
    ///
    /// Only a circular reference between files is fatal. Any other problem
    /// with a single element ends up in [`Document::warnings`].
    pub fn load(&self, path: &Path) -> Result<Document, Error> {
        let mut visited = HashSet::new();
        let document = self.load_file(path, &mut visited)?;
        info!(
            "Loaded {:?}: {} primitives, {} warnings",
            document.path,
            document.primitives.len(),
            document.warnings.len()
        );
        Ok(document)
    }

    /// Load SVG source held in memory. `path` names the document and is the
    /// base for relative image references.
    pub fn load_str(&self, svg: &str, path: &Path) -> Result<Document, Error> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut visited = HashSet::new();
        visited.insert(key.clone());
        self.load_source(svg, &key, &mut visited)
    }

    fn load_file(&self, path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Document, Error> {
        let absolute = path.canonicalize().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !visited.insert(absolute.clone()) {
            return Err(Error::CircularReference(absolute));
        }
        trace!("load_file: {:?}", absolute);
        let result = fs::read_to_string(&absolute)
            .map_err(|source| Error::Io {
                path: absolute.clone(),
                source,
            })
            .and_then(|svg| self.load_source(&svg, &absolute, visited));
        visited.remove(&absolute);
        result
    }

    fn load_source(
        &self,
        svg: &str,
        path: &Path,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Document, Error> {
        let root = dom::parse_document(svg)?;

        let width_attr = root.attr("width").and_then(units::parse_length);
        let height_attr = root.attr("height").and_then(units::parse_length);
        let view_box = root
            .attr("viewBox")
            .and_then(ViewBox::parse)
            .unwrap_or_else(|| {
                ViewBox::new(
                    0.0,
                    0.0,
                    nonzero(width_attr).unwrap_or(1.0),
                    nonzero(height_attr).unwrap_or(1.0),
                )
            });
        let width_mm = nonzero(width_attr).unwrap_or(view_box.width);
        let height_mm = nonzero(height_attr).unwrap_or(view_box.height);
        let scale_x = if view_box.width == 0.0 { 1.0 } else { width_mm / view_box.width };
        let scale_y = if view_box.height == 0.0 { 1.0 } else { height_mm / view_box.height };

        let mut cascade = StyleCascade::new();
        for sheet in &self.stylesheets {
            cascade.add_stylesheet(sheet);
        }
        root.walk(&mut |element| {
            if element.tag == "style" {
                cascade.add_stylesheet(&element.text_content());
            }
        });

        let mut document = Document {
            path: path.to_path_buf(),
            width_mm,
            height_mm,
            view_box,
            scale_x,
            scale_y,
            primitives: Vec::new(),
            warnings: Vec::new(),
        };

        let root_transform = Matrix::document_root(&view_box, scale_x, scale_y);
        let mut stack: Vec<(&Element, Matrix, Style, Vec<String>)> =
            vec![(&root, root_transform, Style::new(), Vec::new())];
        while let Some((element, inherited_transform, inherited_style, inherited_classes)) =
            stack.pop()
        {
            if matches!(element.tag.as_str(), "defs" | "metadata") {
                continue;
            }
            trace!("load_source: <{}>", element.tag);

            let transform = match element.attr("transform") {
                Some(list) => inherited_transform * Matrix::parse(list),
                None => inherited_transform,
            };
            let style = inherited_style.merged(&cascade.resolve(element, None));
            let classes = merge_classes(&inherited_classes, &element.classes());

            if matches!(element.tag.as_str(), "svg" | "g" | "a") {
                for child in element.child_elements().collect::<Vec<_>>().into_iter().rev() {
                    stack.push((child, transform, style.clone(), classes.clone()));
                }
                continue;
            }

            let context = Context {
                element,
                transform,
                style: &style,
                classes: &classes,
            };
            let (primitives, warnings) = match element.tag.as_str() {
                "line" => build_line(&context),
                "polyline" => build_polyline(&context, false),
                "polygon" => build_polyline(&context, true),
                "rect" => build_rect(&context),
                "circle" => build_circle(&context),
                "ellipse" => build_ellipse(&context),
                "path" => build_path(&context),
                "text" => build_text(&context),
                "image" => self.build_image(&context, &document.path, visited)?,
                _ => continue,
            };
            for primitive in &primitives {
                debug!("load_source: {} with {} points", primitive.label(), primitive.points.len());
            }
            for warning in &warnings {
                warn!("{}", warning);
            }
            document.primitives.extend(primitives);
            document.warnings.extend(warnings);
        }

        Ok(document)
    }

    fn build_image(
        &self,
        context: &Context,
        document_path: &Path,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Built, Error> {
        let element = context.element;
        let href = match image_href(element) {
            Some(href) => href,
            None => return Ok((vec![], vec![])),
        };
        let reference = match svg_reference(href) {
            Some(reference) => reference,
            None => {
                trace!("build_image: ignoring reference {:?}", href);
                return Ok((vec![], vec![]));
            }
        };
        let base_dir = document_path.parent().unwrap_or_else(|| Path::new("."));
        let candidate = match resolve_reference_path(base_dir, &reference) {
            Some(candidate) => candidate,
            None => {
                return Ok((
                    vec![],
                    vec![format!("Warning: referenced SVG file not found ({})", href)],
                ))
            }
        };

        let embedded = match self.load_file(&candidate, visited) {
            Ok(embedded) => embedded,
            Err(e @ Error::CircularReference(_)) => return Err(e),
            Err(e) => {
                return Ok((
                    vec![],
                    vec![format!(
                        "Warning: could not load referenced SVG ({}): {}",
                        candidate.display(),
                        e
                    )],
                ))
            }
        };

        let x = units::parse_length_or_zero(element.attr("x"));
        let y = units::parse_length_or_zero(element.attr("y"));
        let width = units::parse_length_or_zero(element.attr("width"));
        let height = units::parse_length_or_zero(element.attr("height"));
        let base_width = nonzero(Some(embedded.width_mm)).unwrap_or(1.0);
        let base_height = nonzero(Some(embedded.height_mm)).unwrap_or(1.0);
        let target_width = nonzero(Some(width)).unwrap_or(base_width);
        let target_height = nonzero(Some(height)).unwrap_or(base_height);

        // Embedded primitives are already in Y-up millimeters; turn them back
        // into a Y-down frame before placing them.
        let unflip = Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, embedded.height_mm);
        let placement = context.transform
            * Matrix::translate(x, y)
            * Matrix::scale(target_width / base_width, target_height / base_height)
            * unflip;

        let primitives: Vec<Primitive> = embedded
            .primitives
            .iter()
            .map(|primitive| {
                let mut placed = primitive.transformed(&placement);
                placed.classes = merge_classes(context.classes, &primitive.classes);
                placed
            })
            .collect();

        let name = candidate
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut warnings = vec![format!(
            "Note: embedded SVG '{}' contributed {} elements",
            name,
            primitives.len()
        )];
        warnings.extend(
            embedded
                .warnings
                .iter()
                .map(|warning| format!("{}: {}", name, warning)),
        );
        Ok((primitives, warnings))
    }
}

fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn build_line(context: &Context) -> Built {
    let coords = ["x1", "y1", "x2", "y2"]
        .iter()
        .map(|name| context.number(name))
        .collect::<Result<Vec<f64>, String>>();
    match coords {
        Ok(c) => {
            let points = context
                .transform
                .apply(&[(c[0], c[1]).into(), (c[2], c[3]).into()]);
            (vec![context.primitive(Shape::Line, points)], vec![])
        }
        Err(warning) => (vec![], vec![warning]),
    }
}

/// Parse a `points` attribute. A trailing odd coordinate is dropped and
/// non-numeric pairs are skipped.
pub fn parse_points(value: &str) -> Polyline {
    let tokens: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .collect();
    tokens
        .chunks_exact(2)
        .filter_map(|pair| match (pair[0].parse::<f64>(), pair[1].parse::<f64>()) {
            (Ok(x), Ok(y)) => Some(CoordinatePair::new(x, y)),
            _ => None,
        })
        .collect()
}

fn build_polyline(context: &Context, closed: bool) -> Built {
    let mut points = parse_points(context.element.attr("points").unwrap_or(""));
    if points.is_empty() {
        return (vec![], vec![]);
    }
    if closed && points.first() != points.last() {
        points.push(points[0]);
    }
    let transformed = context.transform.apply(&points);
    let shape = Shape::Polyline {
        closed,
        origin: if closed {
            PolylineOrigin::Polygon
        } else {
            PolylineOrigin::Polyline
        },
    };
    (
        vec![context.primitive(shape, simplify_polyline(&transformed, closed))],
        vec![],
    )
}

fn build_rect(context: &Context) -> Built {
    let dims = ["x", "y", "width", "height"]
        .iter()
        .map(|name| context.number(name))
        .collect::<Result<Vec<f64>, String>>();
    let (x, y, width, height) = match dims {
        Ok(d) => (d[0], d[1], d[2], d[3]),
        Err(warning) => return (vec![], vec![warning]),
    };
    let corners: Polyline = vec![
        (x, y).into(),
        (x + width, y).into(),
        (x + width, y + height).into(),
        (x, y + height).into(),
        (x, y).into(),
    ];
    let radius = |name| context.element.attr(name).and_then(units::parse_length);
    let shape = Shape::Polyline {
        closed: true,
        origin: PolylineOrigin::Rect {
            rx: radius("rx"),
            ry: radius("ry"),
        },
    };
    (
        vec![context.primitive(shape, context.transform.apply(&corners))],
        vec![],
    )
}

/// Transform a center and its two axis end points, returning the mapped
/// center and radii.
fn mapped_radii(context: &Context, cx: f64, cy: f64, rx: f64, ry: f64) -> (CoordinatePair, f64, f64) {
    let m = &context.transform;
    let center = m.point((cx, cy).into());
    let radius_x = center.distance_to(m.point((cx + rx, cy).into()));
    let radius_y = center.distance_to(m.point((cx, cy + ry).into()));
    (center, radius_x, radius_y)
}

fn build_circle(context: &Context) -> Built {
    let values = ["cx", "cy", "r"]
        .iter()
        .map(|name| context.number(name))
        .collect::<Result<Vec<f64>, String>>();
    match values {
        Ok(v) => {
            let (center, radius_x, radius_y) = mapped_radii(context, v[0], v[1], v[2], v[2]);
            let shape = Shape::Circle { radius_x, radius_y };
            (vec![context.primitive(shape, vec![center])], vec![])
        }
        Err(warning) => (vec![], vec![warning]),
    }
}

fn build_ellipse(context: &Context) -> Built {
    let values = ["cx", "cy", "rx", "ry"]
        .iter()
        .map(|name| context.number(name))
        .collect::<Result<Vec<f64>, String>>();
    match values {
        Ok(v) => {
            let (center, radius_x, radius_y) = mapped_radii(context, v[0], v[1], v[2], v[3]);
            let shape = Shape::Ellipse { radius_x, radius_y };
            (vec![context.primitive(shape, vec![center])], vec![])
        }
        Err(warning) => (vec![], vec![warning]),
    }
}

fn build_path(context: &Context) -> Built {
    let data = match context.element.attr("d") {
        Some(data) if !data.trim().is_empty() => data,
        _ => return (vec![], vec![]),
    };
    let (polylines, mut warnings) = path::flatten_path(data, MAX_SEGMENT_LENGTH, MIN_SAMPLES);
    let primitives: Vec<Primitive> = polylines
        .into_iter()
        .map(|polyline| {
            let transformed = context.transform.apply(&polyline.points);
            let shape = Shape::Polyline {
                closed: polyline.closed,
                origin: PolylineOrigin::Path,
            };
            context.primitive(shape, simplify_polyline(&transformed, polyline.closed))
        })
        .collect();

    if primitives.len() > 1 {
        warnings.push(format!(
            "Note: path (id={}) was split into {} polylines",
            context.id(),
            primitives.len()
        ));
    } else if primitives.is_empty() && warnings.is_empty() {
        warnings.push(format!(
            "Warning: path (id={}) produced no geometry",
            context.id()
        ));
    }
    (primitives, warnings)
}

/// Text of a `<text>` element: one line per non-empty `<tspan>`, else all
/// descendant text with whitespace collapsed.
pub fn extract_text(element: &Element) -> String {
    let lines: Vec<String> = element
        .child_elements()
        .filter(|child| child.tag == "tspan")
        .map(|tspan| tspan.text_content().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if !lines.is_empty() {
        return lines.join("\n");
    }
    element
        .text_content()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_text(context: &Context) -> Built {
    let content = extract_text(context.element);
    if content.is_empty() {
        return (vec![], vec![]);
    }
    // `x`/`y` may hold per-glyph lists; the first value anchors the run.
    let coordinate = |name| {
        let value = context.element.attr(name).unwrap_or("");
        match transform::parse_numbers(value) {
            Some(numbers) => Ok(numbers.first().copied().unwrap_or(0.0)),
            None => Err(format!(
                "Warning: could not parse text attribute {}={:?} (id={})",
                name,
                value,
                context.id()
            )),
        }
    };
    let (x, y) = match (coordinate("x"), coordinate("y")) {
        (Ok(x), Ok(y)) => (x, y),
        (Err(warning), _) | (_, Err(warning)) => return (vec![], vec![warning]),
    };
    let anchor = context
        .element
        .attr("text-anchor")
        .or_else(|| context.style.text_anchor())
        .map(str::to_string);
    let run = TextRun {
        content,
        anchor,
        rotation: context.transform.x_axis_angle(),
        font_family: context.style.font_family().map(str::to_string),
        scale: context.transform.scale_factor(),
    };
    let position = context.transform.point((x, y).into());
    (vec![context.primitive(Shape::Text(run), vec![position])], vec![])
}

fn image_href(element: &Element) -> Option<&str> {
    element
        .attr("xlink:href")
        .or_else(|| element.attr("href"))
        .or_else(|| {
            element
                .attributes
                .iter()
                .find(|(key, _)| key.ends_with(":href"))
                .map(|(_, value)| value.as_str())
        })
        .map(str::trim)
        .filter(|href| !href.is_empty())
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let byte = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// File path named by an image reference, or `None` for data URIs,
/// non-file URLs and references to anything but SVG files.
fn svg_reference(href: &str) -> Option<String> {
    if href.starts_with("data:") {
        return None;
    }
    let decoded = percent_decode(href);
    let path = match decoded.find("://") {
        Some(index) => {
            if !decoded[..index].eq_ignore_ascii_case("file") {
                return None;
            }
            decoded[index + 3..].to_string()
        }
        None => match decoded.find(':') {
            // A single letter before the colon is a drive, not a scheme.
            Some(index) if index > 1 && !decoded.starts_with("file:") => return None,
            Some(_) if decoded.starts_with("file:") => decoded[5..].to_string(),
            _ => decoded,
        },
    };
    let path = path
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .replace('\\', "/");
    if path.to_ascii_lowercase().contains(".svg") {
        Some(path)
    } else {
        None
    }
}

/// Resolve a reference against the referencing document's directory,
/// falling back to the bare file name in that directory.
fn resolve_reference_path(base_dir: &Path, reference: &str) -> Option<PathBuf> {
    let path = Path::new(reference);
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    if candidate.exists() {
        return Some(candidate);
    }
    let fallback = base_dir.join(path.file_name()?);
    if fallback.exists() {
        Some(fallback)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn load(svg: &str) -> Document {
        let _ = env_logger::try_init();
        Loader::new().load_str(svg, Path::new("test.svg")).unwrap()
    }

    fn assert_point(actual: CoordinatePair, expected: (f64, f64)) {
        assert!(
            (actual.x - expected.0).abs() < 1e-9 && (actual.y - expected.1).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_document_sizing_and_flip() {
        let document = load(
            r#"<svg width="200mm" height="100mm" viewBox="0 0 400 200">
                <line x1="0" y1="0" x2="400" y2="200"/>
            </svg>"#,
        );
        assert_eq!(document.width_mm, 200.0);
        assert_eq!(document.scale_x, 0.5);
        assert_eq!(document.scale_y, 0.5);
        let line = &document.primitives[0];
        assert_eq!(line.kind(), "line");
        assert_point(line.points[0], (0.0, 100.0));
        assert_point(line.points[1], (200.0, 0.0));
    }

    #[test]
    fn test_missing_viewbox_defaults_to_size() {
        let document = load(r#"<svg width="50" height="20"><line x2="10"/></svg>"#);
        assert_eq!(document.view_box, ViewBox::new(0.0, 0.0, 50.0, 20.0));
        assert_eq!(document.scale_x, 1.0);
        assert_point(document.primitives[0].points[1], (10.0, 20.0));
    }

    #[test]
    fn test_document_order_and_inheritance() {
        let document = load(
            r#"<svg viewBox="0 0 100 100" width="100" height="100">
                <style>.wall { stroke: #FF0000 }</style>
                <g class="IfcWall wall" transform="translate(10,0)" stroke-width="0.5">
                    <line id="first" class="cut wall" x1="0" y1="0" x2="1" y2="0"/>
                    <g style="stroke: #00FF00"><line id="second" x2="1"/></g>
                </g>
                <defs><line id="hidden" x2="1"/></defs>
                <unknown/>
                <line id="third" x2="1"/>
            </svg>"#,
        );
        let ids: Vec<_> = document
            .primitives
            .iter()
            .map(|p| p.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert!(document.warnings.is_empty());

        let first = &document.primitives[0];
        assert_eq!(first.classes, vec!["IfcWall", "wall", "cut"]);
        assert_eq!(first.style.stroke(), Some("#FF0000"));
        assert_eq!(first.style.stroke_width(), Some(0.5));
        assert_point(first.points[0], (10.0, 100.0));

        let second = &document.primitives[1];
        assert_eq!(second.style.stroke(), Some("#00FF00"));
        assert_eq!(second.classes, vec!["IfcWall", "wall"]);
        assert!(document.primitives[2].classes.is_empty());
    }

    #[test]
    fn test_malformed_attribute_is_a_warning() {
        let document = load(
            r#"<svg width="10" height="10"><rect id="r" width="abc"/><circle r="1"/></svg>"#,
        );
        assert_eq!(document.primitives.len(), 1);
        assert_eq!(document.warnings.len(), 1);
        assert!(document.warnings[0].contains("id=r"));
    }

    #[test]
    fn test_circle_vs_ellipse_radii() {
        let document = load(
            r#"<svg width="100" height="100">
                <circle cx="10" cy="10" r="5"/>
                <circle cx="10" cy="10" r="5" transform="scale(1,2)"/>
            </svg>"#,
        );
        assert_eq!(
            document.primitives[0].shape,
            Shape::Circle {
                radius_x: 5.0,
                radius_y: 5.0
            }
        );
        assert_eq!(
            document.primitives[1].shape,
            Shape::Circle {
                radius_x: 5.0,
                radius_y: 10.0
            }
        );
    }

    #[test]
    fn test_rect_and_polygon() {
        let document = load(
            r#"<svg width="100" height="100" viewBox="0 0 100 100">
                <rect x="1" y="1" width="2" height="3" rx="0.5"/>
                <polygon points="0,0 10,0 10,10 5"/>
                <polyline points="0 0, 5 0, 10 0, x y, 10 10"/>
            </svg>"#,
        );
        let rect = &document.primitives[0];
        assert_eq!(rect.points.len(), 5);
        assert_eq!(rect.points.first(), rect.points.last());
        assert_eq!(
            rect.shape,
            Shape::Polyline {
                closed: true,
                origin: PolylineOrigin::Rect {
                    rx: Some(0.5),
                    ry: None
                }
            }
        );
        let polygon = &document.primitives[1];
        assert_eq!(polygon.points.len(), 4);
        assert_eq!(polygon.points.first(), polygon.points.last());
        let polyline = &document.primitives[2];
        assert_eq!(polyline.points.len(), 3);
    }

    #[test]
    fn test_path_split_note() {
        let document = load(
            r#"<svg width="100" height="100"><path id="p" d="M 0,0 L 10,0 M 20,20 L 30,20"/></svg>"#,
        );
        assert_eq!(document.primitives.len(), 2);
        assert_eq!(document.warnings.len(), 1);
        assert!(document.warnings[0].contains("2 polylines"));
    }

    #[test]
    fn test_bad_path_is_a_warning() {
        let document = load(r#"<svg width="100" height="100"><path d="M 0,0 L foo"/></svg>"#);
        assert!(document.primitives.is_empty());
        assert_eq!(document.warnings.len(), 1);
    }

    #[test]
    fn test_text_content_and_anchor() {
        let document = load(
            r#"<svg width="100" height="100" viewBox="0 0 100 100">
                <text x="10" y="20" style="text-anchor: middle; font-family: Arial">
                    <tspan>First</tspan><tspan> </tspan><tspan>Second</tspan>
                </text>
                <text x="1 2 3" y="5" text-anchor="end">  spaced
                    out  </text>
                <text x="0" y="0"></text>
            </svg>"#,
        );
        assert_eq!(document.primitives.len(), 2);
        match &document.primitives[0].shape {
            Shape::Text(run) => {
                assert_eq!(run.content, "First\nSecond");
                assert_eq!(run.anchor.as_deref(), Some("middle"));
                assert_eq!(run.font_family.as_deref(), Some("Arial"));
                assert_eq!(run.scale, 1.0);
            }
            other => panic!("unexpected shape {:?}", other),
        }
        assert_point(document.primitives[0].points[0], (10.0, 80.0));
        match &document.primitives[1].shape {
            Shape::Text(run) => {
                assert_eq!(run.content, "spaced out");
                assert_eq!(run.anchor.as_deref(), Some("end"));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_external_stylesheet_precedes_style_elements() {
        let loader = Loader::new().with_stylesheet(".a { stroke: #111111; fill: #222222 }");
        let document = loader
            .load_str(
                r#"<svg width="10" height="10">
                    <style>.a { stroke: #333333 }</style>
                    <line class="a" x2="1"/>
                </svg>"#,
                Path::new("test.svg"),
            )
            .unwrap();
        let style = &document.primitives[0].style;
        assert_eq!(style.stroke(), Some("#333333"));
        assert_eq!(style.fill(), Some("#222222"));
    }

    #[test]
    fn test_svg_reference() {
        assert_eq!(svg_reference("data:image/svg+xml;base64,AAAA"), None);
        assert_eq!(svg_reference("https://example.com/a.svg"), None);
        assert_eq!(svg_reference("photo.png"), None);
        assert_eq!(svg_reference("parts/door%20a.svg#x"), Some("parts/door a.svg".into()));
        assert_eq!(svg_reference("file:///tmp/a.svg"), Some("/tmp/a.svg".into()));
        assert_eq!(svg_reference("C:\\plans\\a.svg"), Some("C:/plans/a.svg".into()));
    }

    #[test]
    fn test_embedded_document() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "part.svg",
            r#"<svg width="10" height="10" viewBox="0 0 10 10">
                <line class="part" x1="0" y1="0" x2="10" y2="0"/>
                <rect width="bad"/>
            </svg>"#,
        );
        let main = write_file(
            dir.path(),
            "main.svg",
            r#"<svg width="100" height="100" viewBox="0 0 100 100"
                    xmlns:xlink="http://www.w3.org/1999/xlink">
                <image class="IfcDoor" x="20" y="30" width="20" height="20" xlink:href="part.svg"/>
                <image href="missing.svg"/>
            </svg>"#,
        );
        let document = Loader::new().load(&main).unwrap();
        assert_eq!(document.primitives.len(), 1);
        let line = &document.primitives[0];
        assert_eq!(line.classes, vec!["IfcDoor", "part"]);
        // Top edge of the part, placed at (20, 30) and scaled by 2, in a
        // Y-up drawing 100 high.
        assert_point(line.points[0], (20.0, 70.0));
        assert_point(line.points[1], (40.0, 70.0));

        assert_eq!(document.warnings.len(), 3);
        assert!(document.warnings[0].contains("1 elements"));
        assert!(document.warnings[1].starts_with("part.svg: "));
        assert!(document.warnings[2].contains("missing.svg"));
    }

    #[test]
    fn test_circular_reference_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(
            dir.path(),
            "a.svg",
            r#"<svg width="10" height="10"><line x2="1"/><image href="b.svg"/></svg>"#,
        );
        write_file(
            dir.path(),
            "b.svg",
            r#"<svg width="10" height="10"><image href="a.svg"/></svg>"#,
        );
        match Loader::new().load(&a) {
            Err(Error::CircularReference(path)) => assert!(path.ends_with("a.svg")),
            other => panic!("expected a circular reference, got {:?}", other),
        }
    }

    #[test]
    fn test_same_file_embedded_twice_is_not_circular() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "part.svg", r#"<svg width="1" height="1"><line x2="1"/></svg>"#);
        let main = write_file(
            dir.path(),
            "main.svg",
            r#"<svg width="10" height="10"><image href="part.svg"/><image href="part.svg"/></svg>"#,
        );
        let document = Loader::new().load(&main).unwrap();
        assert_eq!(document.primitives.len(), 2);
    }
}
