//! Flatten SVG path data into polylines.
//!
//! Straight segments contribute only their end point. Curved segments
//! (cubic, quadratic, elliptical arc) are sampled uniformly in their own
//! parameter space, with a resolution derived from the segment length.
//! Curve evaluation is done with the [Lyon](https://github.com/nical/lyon)
//! geometry types.

use std::mem;

use log::trace;
use lyon_geom::euclid::{Point2D, Vector2D};
use lyon_geom::{Angle, Arc, ArcFlags, CubicBezierSegment, QuadraticBezierSegment, SvgArc};
use svgtypes::{PathParser, PathSegment};

use crate::error::Error;
use crate::{CoordinatePair, Polyline};

/// Maximum distance (in path units) between two samples of a curve.
pub const MAX_SEGMENT_LENGTH: f64 = 0.5;

/// Lower bound on the number of samples of a curve longer than
/// [`MAX_SEGMENT_LENGTH`].
pub const MIN_SAMPLES: usize = 8;

/// Sub-path end points closer than this are considered closed.
const CLOSE_EPSILON: f64 = 1e-9;

/// Chords used to estimate the length of a curved segment.
const LENGTH_CHORDS: usize = 32;

/// One continuous sub-path after sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineApproximation {
    pub points: Polyline,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Line(CoordinatePair, CoordinatePair),
    Cubic(CubicBezierSegment<f64>),
    Quadratic(QuadraticBezierSegment<f64>),
    Arc(Arc<f64>),
}

impl Segment {
    fn is_straight(&self) -> bool {
        matches!(self, Segment::Line(..))
    }

    fn sample(&self, t: f64) -> CoordinatePair {
        let p = match self {
            Segment::Line(from, to) => {
                return CoordinatePair::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
            }
            Segment::Cubic(curve) => curve.sample(t),
            Segment::Quadratic(curve) => curve.sample(t),
            Segment::Arc(arc) => arc.sample(t),
        };
        CoordinatePair::new(p.x, p.y)
    }

    fn end(&self) -> CoordinatePair {
        self.sample(1.0)
    }

    fn length(&self) -> f64 {
        match self {
            Segment::Line(from, to) => from.distance_to(*to),
            _ => {
                let mut length = 0.0;
                let mut prev = self.sample(0.0);
                for step in 1..=LENGTH_CHORDS {
                    let next = self.sample(step as f64 / LENGTH_CHORDS as f64);
                    length += prev.distance_to(next);
                    prev = next;
                }
                length
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Subpath {
    start: CoordinatePair,
    segments: Vec<Segment>,
}

impl Subpath {
    fn length(&self) -> f64 {
        self.segments.iter().map(Segment::length).sum()
    }

    fn end(&self) -> CoordinatePair {
        self.segments.last().map_or(self.start, Segment::end)
    }

    fn is_closed(&self) -> bool {
        !self.segments.is_empty() && self.start.distance_to(self.end()) <= CLOSE_EPSILON
    }
}

/// Path builder state, tracking the current point and the reflected control
/// points needed by the smooth curve commands.
#[derive(Debug)]
struct CurrentLine {
    /// Start of the sub-path being built, if any.
    start: Option<CoordinatePair>,

    /// The current point. Persists across sub-paths so that a relative
    /// `MoveTo` can be resolved.
    current: CoordinatePair,

    segments: Vec<Segment>,

    /// Second control point of the previous cubic segment.
    prev_cubic_ctrl: Option<CoordinatePair>,

    /// Control point of the previous quadratic segment.
    prev_quad_ctrl: Option<CoordinatePair>,
}

impl CurrentLine {
    fn new() -> Self {
        Self {
            start: None,
            current: CoordinatePair::new(0.0, 0.0),
            segments: Vec::new(),
            prev_cubic_ctrl: None,
            prev_quad_ctrl: None,
        }
    }

    fn resolve(&self, abs: bool, x: f64, y: f64) -> CoordinatePair {
        if abs {
            CoordinatePair::new(x, y)
        } else {
            CoordinatePair::new(self.current.x + x, self.current.y + y)
        }
    }

    fn require_start(&self) -> Result<CoordinatePair, String> {
        self.start
            .ok_or_else(|| "Invalid state: drawing command without a preceding MoveTo".to_string())
    }

    fn push(&mut self, segment: Segment) {
        self.current = segment.end();
        self.segments.push(segment);
    }

    fn line_to(&mut self, to: CoordinatePair) -> Result<(), String> {
        self.require_start()?;
        self.push(Segment::Line(self.current, to));
        Ok(())
    }

    fn cubic_to(
        &mut self,
        ctrl1: CoordinatePair,
        ctrl2: CoordinatePair,
        to: CoordinatePair,
    ) -> Result<(), String> {
        self.require_start()?;
        let curve = CubicBezierSegment {
            from: Point2D::new(self.current.x, self.current.y),
            ctrl1: Point2D::new(ctrl1.x, ctrl1.y),
            ctrl2: Point2D::new(ctrl2.x, ctrl2.y),
            to: Point2D::new(to.x, to.y),
        };
        self.push(Segment::Cubic(curve));
        self.prev_cubic_ctrl = Some(ctrl2);
        Ok(())
    }

    fn quadratic_to(&mut self, ctrl: CoordinatePair, to: CoordinatePair) -> Result<(), String> {
        self.require_start()?;
        let curve = QuadraticBezierSegment {
            from: Point2D::new(self.current.x, self.current.y),
            ctrl: Point2D::new(ctrl.x, ctrl.y),
            to: Point2D::new(to.x, to.y),
        };
        self.push(Segment::Quadratic(curve));
        self.prev_quad_ctrl = Some(ctrl);
        Ok(())
    }

    /// Mirror a control point along the current point.
    fn reflect(&self, ctrl: Option<CoordinatePair>) -> CoordinatePair {
        match ctrl {
            Some(ctrl) => CoordinatePair::new(
                2.0 * self.current.x - ctrl.x,
                2.0 * self.current.y - ctrl.y,
            ),
            None => self.current,
        }
    }

    /// Close the sub-path with a straight segment back to its start.
    fn close(&mut self, subpaths: &mut Vec<Subpath>) -> Result<(), String> {
        let start = self.require_start()?;
        if self.current.distance_to(start) > CLOSE_EPSILON {
            self.push(Segment::Line(self.current, start));
        } else if let Some(Segment::Line(_, to)) = self.segments.last_mut() {
            // Snap the final point so the closure test is exact.
            *to = start;
        }
        self.current = start;
        self.finish(subpaths);
        // Drawing may continue from the start point without a new MoveTo.
        self.start = Some(start);
        Ok(())
    }

    /// Store the sub-path being built, if it has any segments.
    fn finish(&mut self, subpaths: &mut Vec<Subpath>) {
        let segments = mem::take(&mut self.segments);
        if let (Some(start), false) = (self.start.take(), segments.is_empty()) {
            subpaths.push(Subpath { start, segments });
        }
    }
}

fn parse_path(expr: &str) -> Result<Vec<Subpath>, Error> {
    trace!("parse_path");
    let mut subpaths = Vec::new();
    let mut line = CurrentLine::new();

    for segment in PathParser::from(expr) {
        let segment =
            segment.map_err(|e| Error::PathParse(format!("Could not parse path segment: {}", e)))?;
        parse_path_segment(&segment, &mut line, &mut subpaths).map_err(Error::PathParse)?;
    }
    line.finish(&mut subpaths);

    Ok(subpaths)
}

#[allow(clippy::similar_names)]
fn parse_path_segment(
    segment: &PathSegment,
    line: &mut CurrentLine,
    subpaths: &mut Vec<Subpath>,
) -> Result<(), String> {
    let mut cubic_ctrl = None;
    let mut quad_ctrl = None;
    match *segment {
        PathSegment::MoveTo { abs, x, y } => {
            trace!("parse_path_segment: MoveTo");
            line.finish(subpaths);
            let to = line.resolve(abs, x, y);
            line.start = Some(to);
            line.current = to;
        }
        PathSegment::LineTo { abs, x, y } => {
            trace!("parse_path_segment: LineTo");
            let to = line.resolve(abs, x, y);
            line.line_to(to)?;
        }
        PathSegment::HorizontalLineTo { abs, x } => {
            trace!("parse_path_segment: HorizontalLineTo");
            let to = if abs {
                CoordinatePair::new(x, line.current.y)
            } else {
                CoordinatePair::new(line.current.x + x, line.current.y)
            };
            line.line_to(to)?;
        }
        PathSegment::VerticalLineTo { abs, y } => {
            trace!("parse_path_segment: VerticalLineTo");
            let to = if abs {
                CoordinatePair::new(line.current.x, y)
            } else {
                CoordinatePair::new(line.current.x, line.current.y + y)
            };
            line.line_to(to)?;
        }
        PathSegment::CurveTo {
            abs,
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        } => {
            trace!("parse_path_segment: CurveTo");
            let ctrl1 = line.resolve(abs, x1, y1);
            let ctrl2 = line.resolve(abs, x2, y2);
            let to = line.resolve(abs, x, y);
            line.cubic_to(ctrl1, ctrl2, to)?;
            cubic_ctrl = Some(ctrl2);
        }
        PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
            trace!("parse_path_segment: SmoothCurveTo");
            // Without a preceding cubic the first control point is the
            // current point.
            let ctrl1 = line.reflect(line.prev_cubic_ctrl);
            let ctrl2 = line.resolve(abs, x2, y2);
            let to = line.resolve(abs, x, y);
            line.cubic_to(ctrl1, ctrl2, to)?;
            cubic_ctrl = Some(ctrl2);
        }
        PathSegment::Quadratic { abs, x1, y1, x, y } => {
            trace!("parse_path_segment: Quadratic");
            let ctrl = line.resolve(abs, x1, y1);
            let to = line.resolve(abs, x, y);
            line.quadratic_to(ctrl, to)?;
            quad_ctrl = Some(ctrl);
        }
        PathSegment::SmoothQuadratic { abs, x, y } => {
            trace!("parse_path_segment: SmoothQuadratic");
            let ctrl = line.reflect(line.prev_quad_ctrl);
            let to = line.resolve(abs, x, y);
            line.quadratic_to(ctrl, to)?;
            quad_ctrl = Some(ctrl);
        }
        PathSegment::EllipticalArc {
            abs,
            rx,
            ry,
            x_axis_rotation,
            large_arc,
            sweep,
            x,
            y,
        } => {
            trace!("parse_path_segment: EllipticalArc");
            line.require_start()?;
            let to = line.resolve(abs, x, y);
            let arc = SvgArc {
                from: Point2D::new(line.current.x, line.current.y),
                to: Point2D::new(to.x, to.y),
                radii: Vector2D::new(rx.abs(), ry.abs()),
                x_rotation: Angle::degrees(x_axis_rotation),
                flags: ArcFlags { large_arc, sweep },
            };
            if arc.is_straight_line() {
                line.line_to(to)?;
            } else {
                line.push(Segment::Arc(arc.to_arc()));
                // Pin the current point; the parametric end drifts slightly.
                line.current = to;
            }
        }
        PathSegment::ClosePath { .. } => {
            trace!("parse_path_segment: ClosePath");
            line.close(subpaths)?;
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(format!("Unsupported path segment: {:?}", other));
        }
    }
    line.prev_cubic_ctrl = cubic_ctrl;
    line.prev_quad_ctrl = quad_ctrl;
    Ok(())
}

fn sample_subpath(subpath: &Subpath, max_segment_length: f64, min_samples: usize) -> Polyline {
    let mut points = vec![subpath.start];
    for segment in &subpath.segments {
        let length = segment.length();
        if length == 0.0 {
            continue;
        }
        if segment.is_straight() {
            points.push(segment.end());
            continue;
        }
        let mut steps = ((length / max_segment_length).ceil() as usize + 1).max(1);
        if length > max_segment_length {
            steps = steps.max(min_samples);
        }
        for step in 1..=steps {
            let t = (step as f64 / steps as f64).min(1.0);
            points.push(segment.sample(t));
        }
    }
    points
}

/// Flatten a path description into one polyline per non-empty sub-path.
///
/// Never fails: a parse error yields no polylines and a warning.
pub fn flatten_path(
    data: &str,
    max_segment_length: f64,
    min_samples: usize,
) -> (Vec<PolylineApproximation>, Vec<String>) {
    let subpaths = match parse_path(data) {
        Ok(subpaths) => subpaths,
        Err(e) => return (Vec::new(), vec![format!("Warning: could not parse path: {}", e)]),
    };

    let polylines: Vec<PolylineApproximation> = subpaths
        .iter()
        .filter(|subpath| subpath.length() > 0.0)
        .map(|subpath| PolylineApproximation {
            points: sample_subpath(subpath, max_segment_length, min_samples),
            closed: subpath.is_closed(),
        })
        .collect();

    let mut warnings = Vec::new();
    if polylines.is_empty() {
        warnings.push("Warning: path is empty or uses an unsupported form".to_string());
    }
    trace!("flatten_path: {} polylines", polylines.len());
    (polylines, warnings)
}
