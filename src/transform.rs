//! 2D affine transforms.
//!
//! A [`Matrix`] stores the six meaningful entries of a homogeneous 3×3
//! matrix:
//!
//! ```text
//! | a c e |
//! | b d f |
//! | 0 0 1 |
//! ```
//!
//! Composition follows the SVG convention: in `transform="A B"` the point
//! is first mapped by `B`, then by `A`, which is the product `A * B`.

use std::ops::Mul;

use log::trace;

use crate::CoordinatePair;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation about the origin (clockwise on screen,
    /// where Y grows downward).
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Rotation about a pivot: translate to origin, rotate, translate back.
    pub fn rotate_about(degrees: f64, cx: f64, cy: f64) -> Self {
        Self::translate(cx, cy) * Self::rotate(degrees) * Self::translate(-cx, -cy)
    }

    pub fn skew_x(degrees: f64) -> Self {
        Self::new(1.0, 0.0, degrees.to_radians().tan(), 1.0, 0.0, 0.0)
    }

    pub fn skew_y(degrees: f64) -> Self {
        Self::new(1.0, degrees.to_radians().tan(), 0.0, 1.0, 0.0, 0.0)
    }

    /// Map view-box coordinates to physical millimeters with the Y axis
    /// flipped (SVG grows downward, DXF grows upward).
    pub fn document_root(view_box: &crate::ViewBox, scale_x: f64, scale_y: f64) -> Self {
        Self::new(
            scale_x,
            0.0,
            0.0,
            -scale_y,
            -view_box.min_x * scale_x,
            (view_box.min_y + view_box.height) * scale_y,
        )
    }

    /// Apply `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn point(&self, p: CoordinatePair) -> CoordinatePair {
        CoordinatePair::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Map a direction vector, ignoring the translation.
    pub fn vector(&self, v: CoordinatePair) -> CoordinatePair {
        CoordinatePair::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    pub fn apply(&self, points: &[CoordinatePair]) -> Vec<CoordinatePair> {
        points.iter().map(|p| self.point(*p)).collect()
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Uniform scale approximation, `sqrt(|det|)`.
    pub fn scale_factor(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// Angle of the transformed X axis in degrees.
    pub fn x_axis_angle(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }

    /// Parse an SVG transform list such as `translate(10 5) rotate(30)`.
    ///
    /// Unknown or malformed commands contribute the identity.
    pub fn parse(list: &str) -> Self {
        let mut matrix = Self::identity();
        let mut rest = list.trim();
        while let Some(open) = rest.find('(') {
            let name = rest[..open]
                .trim_matches(|c: char| c.is_whitespace() || c == ',')
                .to_ascii_lowercase();
            let close = match rest[open..].find(')') {
                Some(offset) => open + offset,
                None => break,
            };
            let args = parse_numbers(&rest[open + 1..close]);
            trace!("Matrix::parse: {}({:?})", name, args);
            if let Some(args) = args {
                matrix = matrix * Self::for_command(&name, &args);
            }
            rest = &rest[close + 1..];
        }
        matrix
    }

    fn for_command(name: &str, args: &[f64]) -> Self {
        match (name, args) {
            ("matrix", &[a, b, c, d, e, f]) => Self::new(a, b, c, d, e, f),
            ("translate", &[tx]) => Self::translate(tx, 0.0),
            ("translate", &[tx, ty, ..]) => Self::translate(tx, ty),
            ("scale", &[s]) => Self::scale(s, s),
            ("scale", &[sx, sy, ..]) => Self::scale(sx, sy),
            ("rotate", &[angle, cx, cy]) => Self::rotate_about(angle, cx, cy),
            ("rotate", &[angle, ..]) => Self::rotate(angle),
            ("skewx", &[angle, ..]) => Self::skew_x(angle),
            ("skewy", &[angle, ..]) => Self::skew_y(angle),
            _ => Self::identity(),
        }
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        self.compose(&rhs)
    }
}

/// Split a space/comma separated number list. `None` if any token is not a
/// number.
pub(crate) fn parse_numbers(value: &str) -> Option<Vec<f64>> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<f64>().ok())
        .collect()
}
