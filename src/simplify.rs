//! Angular polyline simplification.
//!
//! A vertex is dropped when the direction change at that vertex does not
//! exceed the angle tolerance. Vertices next to very short segments are
//! always kept, so small details such as rounded corners survive.

use crate::{CoordinatePair, Polyline};

/// Default turn-angle tolerance in degrees.
pub const DEFAULT_ANGLE_TOLERANCE: f64 = 0.5;

/// Segments shorter than this mark their end points as significant.
pub const DEFAULT_MIN_SEGMENT: f64 = 0.05;

/// Turn angle in degrees at `curr`, or 180 when either adjacent segment is
/// shorter than `min_segment`.
fn turn_angle(
    prev: CoordinatePair,
    curr: CoordinatePair,
    next: CoordinatePair,
    min_segment: f64,
) -> f64 {
    let (v1x, v1y) = (curr.x - prev.x, curr.y - prev.y);
    let (v2x, v2y) = (next.x - curr.x, next.y - curr.y);
    let len1 = v1x.hypot(v1y);
    let len2 = v2x.hypot(v2y);
    if len1 < min_segment || len2 < min_segment || len1 == 0.0 || len2 == 0.0 {
        return 180.0;
    }
    let cos = ((v1x * v2x + v1y * v2y) / (len1 * len2)).max(-1.0).min(1.0);
    cos.acos().to_degrees()
}

/// Simplify with [`DEFAULT_ANGLE_TOLERANCE`] and [`DEFAULT_MIN_SEGMENT`].
pub fn simplify_polyline(points: &[CoordinatePair], closed: bool) -> Polyline {
    simplify_polyline_with(points, closed, DEFAULT_ANGLE_TOLERANCE, DEFAULT_MIN_SEGMENT)
}

/// Drop vertices whose turn angle is at or below `angle_tolerance`.
///
/// Open polylines keep both end points. Closed polylines are evaluated
/// cyclically (a duplicated closing point is ignored), keep their first
/// point and are re-closed on output. Inputs with fewer than three points
/// are returned unchanged.
pub fn simplify_polyline_with(
    points: &[CoordinatePair],
    closed: bool,
    angle_tolerance: f64,
    min_segment: f64,
) -> Polyline {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut simplified = Polyline::with_capacity(points.len());
    if closed {
        let core = if points[0] == points[points.len() - 1] {
            &points[..points.len() - 1]
        } else {
            points
        };
        let total = core.len();
        simplified.push(core[0]);
        for i in 1..total {
            let angle = turn_angle(core[i - 1], core[i], core[(i + 1) % total], min_segment);
            if angle > angle_tolerance {
                simplified.push(core[i]);
            }
        }
        if simplified[0] != simplified[simplified.len() - 1] || simplified.len() == 1 {
            simplified.push(simplified[0]);
        }
    } else {
        simplified.push(points[0]);
        for window in points.windows(3) {
            if turn_angle(window[0], window[1], window[2], min_segment) > angle_tolerance {
                simplified.push(window[1]);
            }
        }
        simplified.push(points[points.len() - 1]);
    }
    simplified
}
