// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The 2x3 affine matrices carried by every xform.
//!
//! `x' = a*x + b*y + c` and `y' = d*x + e*y + f`.  The columns are
//! the X axis `(a, d)`, the Y axis `(b, e)` and the origin `(c, f)`.

use std::f64::consts::PI;

/// Rounds to six decimal places.
#[inline]
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// `x' = a x + b y + c`, `y' = d x + e y + f`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine2D {
    /// X axis, x.
    pub a: f64,
    /// Y axis, x.
    pub b: f64,
    /// Origin, x.
    pub c: f64,
    /// X axis, y.
    pub d: f64,
    /// Y axis, y.
    pub e: f64,
    /// Origin, y.
    pub f: f64,
}

/// One column of an affine matrix in polar form.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PolarColumn {
    /// Radians.
    pub angle: f64,
    /// Column length.
    pub magnitude: f64,
}

impl Default for Affine2D {
    fn default() -> Self {
        Affine2D::identity()
    }
}

impl Affine2D {
    /// Coefficients in the order `a b c d e f`.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Affine2D { a, b, c, d, e, f }
    }

    /// The identity map.
    pub fn identity() -> Self {
        Affine2D::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// All coefficients zero.
    pub fn zero() -> Self {
        Affine2D::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Exact comparison against the identity.
    pub fn is_identity(&self) -> bool {
        *self == Affine2D::identity()
    }

    /// Maps a point.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    /// The `(a, d)` column.
    pub fn x_axis(&self) -> (f64, f64) {
        (self.a, self.d)
    }

    /// The `(b, e)` column.
    pub fn y_axis(&self) -> (f64, f64) {
        (self.b, self.e)
    }

    /// The `(c, f)` translation.
    pub fn origin(&self) -> (f64, f64) {
        (self.c, self.f)
    }

    /// Replaces the `(a, d)` column.
    pub fn set_x_axis(&mut self, (x, y): (f64, f64)) {
        self.a = x;
        self.d = y;
    }

    /// Replaces the `(b, e)` column.
    pub fn set_y_axis(&mut self, (x, y): (f64, f64)) {
        self.b = x;
        self.e = y;
    }

    /// Replaces the translation.
    pub fn set_origin(&mut self, (x, y): (f64, f64)) {
        self.c = x;
        self.f = y;
    }

    /// Rotates the linear part by `degrees`, leaving the origin alone.
    pub fn rotate(&mut self, degrees: f64) {
        let (s, c) = (degrees * PI / 180.0).sin_cos();
        let (xa, ya) = (self.x_axis(), self.y_axis());
        self.set_x_axis((c * xa.0 - s * xa.1, s * xa.0 + c * xa.1));
        self.set_y_axis((c * ya.0 - s * ya.1, s * ya.0 + c * ya.1));
    }

    /// Rotates the origin about (0, 0) by `degrees`.
    pub fn rotate_trans(&mut self, degrees: f64) {
        let (s, c) = (degrees * PI / 180.0).sin_cos();
        let (x, y) = self.origin();
        self.set_origin((c * x - s * y, s * x + c * y));
    }

    /// Scales the linear part.
    pub fn scale(&mut self, amount: f64) {
        self.a *= amount;
        self.b *= amount;
        self.d *= amount;
        self.e *= amount;
    }

    /// Moves the origin by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.c += dx;
        self.f += dy;
    }

    /// Area scale of the linear part.
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// The X and Y columns in polar form.  A zero-length column gets
    /// an angle of zero.
    pub fn polar_columns(&self) -> [PolarColumn; 2] {
        let polar = |(x, y): (f64, f64)| {
            let magnitude = (x * x + y * y).sqrt();
            let angle = if magnitude == 0.0 { 0.0 } else { y.atan2(x) };
            PolarColumn { angle, magnitude }
        };
        [polar(self.x_axis()), polar(self.y_axis())]
    }

    /// Inverse of `polar_columns` plus an origin.
    pub fn from_polar(columns: &[PolarColumn; 2], origin: (f64, f64)) -> Self {
        let mut affine = Affine2D::zero();
        let (s0, c0) = columns[0].angle.sin_cos();
        let (s1, c1) = columns[1].angle.sin_cos();
        affine.set_x_axis((columns[0].magnitude * c0, columns[0].magnitude * s0));
        affine.set_y_axis((columns[1].magnitude * c1, columns[1].magnitude * s1));
        affine.set_origin(origin);
        affine
    }

    /// Every coefficient multiplied by `k`.
    pub fn scaled_all(&self, k: f64) -> Self {
        Affine2D::new(
            self.a * k,
            self.b * k,
            self.c * k,
            self.d * k,
            self.e * k,
            self.f * k,
        )
    }

    /// Coefficient-wise sum.
    pub fn add(&self, other: &Affine2D) -> Self {
        Affine2D::new(
            self.a + other.a,
            self.b + other.b,
            self.c + other.c,
            self.d + other.d,
            self.e + other.e,
            self.f + other.f,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn identity_leaves_points_alone() {
        let id = Affine2D::identity();
        assert!(id.is_identity());
        assert_eq!(id.apply(3.5, -2.0), (3.5, -2.0));
    }

    #[test]
    fn apply_uses_row_convention() {
        let m = Affine2D::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.apply(1.0, 1.0), (6.0, 15.0));
    }

    #[test]
    fn rotate_quarter_turn() {
        let mut m = Affine2D::identity();
        m.rotate(90.0);
        let (x, y) = m.apply(1.0, 0.0);
        assert!(close(x, 0.0) && close(y, 1.0));
        assert_eq!(m.origin(), (0.0, 0.0));
    }

    #[test]
    fn polar_round_trip() {
        let m = Affine2D::new(0.3, -0.7, 0.25, 0.9, 0.1, -1.5);
        let back = Affine2D::from_polar(&m.polar_columns(), m.origin());
        assert!(close(m.a, back.a) && close(m.b, back.b) && close(m.c, back.c));
        assert!(close(m.d, back.d) && close(m.e, back.e) && close(m.f, back.f));
    }

    #[test]
    fn zero_column_has_zero_angle() {
        let m = Affine2D::zero();
        let cols = m.polar_columns();
        assert_eq!(cols[0].angle, 0.0);
        assert_eq!(cols[1].magnitude, 0.0);
    }

    #[test]
    fn round6_rounds() {
        assert_eq!(round6(0.70710678), 0.707107);
        assert_eq!(round6(-0.70710678), -0.707107);
    }

    #[test]
    fn translation_moves_only_the_origin() {
        let mut m = Affine2D::new(2.0, 1.0, 1.0, 0.0, 3.0, 0.0);
        assert_eq!(m.determinant(), 6.0);
        m.translate(0.5, -1.0);
        assert_eq!(m.origin(), (1.5, -1.0));
        m.rotate_trans(90.0);
        let (x, y) = m.origin();
        assert!(close(x, 1.0) && close(y, 1.5));
        assert_eq!(m.determinant(), 6.0);
    }
}
