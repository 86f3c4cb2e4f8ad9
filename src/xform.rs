// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Xforms: one weighted, nonlinear map in the mixture.
//!
//! An xform is a pre-affine matrix, an ordered list of variations, an
//! optional post-affine matrix and the coloring parameters.  Its xaos
//! row scales the probability of jumping from this xform to each of
//! the others; an empty row means "uniform", i.e. every entry is 1.

use crate::affine::Affine2D;
use crate::isaac::IsaacRng;
use crate::iterator::Point;
use crate::variation::{IterHelper, VarKind, Variation, VariationId};
use std::f64::consts::PI;

/// Coordinates beyond this magnitude count as bad values.
pub const BAD_VALUE_THRESHOLD: f64 = 1e10;

/// True for NaN, infinity or anything past `BAD_VALUE_THRESHOLD`.
#[inline]
pub fn is_bad_value(v: f64) -> bool {
    !(v.abs() <= BAD_VALUE_THRESHOLD)
}

/// Periodic shapes used by motion elements.  All have period 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionFunc {
    /// `sin(2πt)`.
    Sin,
    /// Triangle wave between -1 and 1.
    Triangle,
    /// `(1 - cos 2πt) / 2`.
    Hill,
    /// Sawtooth between -1 and 1.
    Saw,
}

impl MotionFunc {
    /// Value at `t`.
    pub fn eval(self, t: f64) -> f64 {
        let fr = t - t.floor();
        match self {
            MotionFunc::Sin => (2.0 * PI * t).sin(),
            MotionFunc::Triangle => {
                if fr < 0.25 {
                    4.0 * fr
                } else if fr < 0.75 {
                    2.0 - 4.0 * fr
                } else {
                    4.0 * fr - 4.0
                }
            }
            MotionFunc::Hill => (1.0 - (2.0 * PI * t).cos()) * 0.5,
            MotionFunc::Saw => 2.0 * fr - 1.0,
        }
    }
}

/// Per-xform periodic animation.  Every delta is added to the xform,
/// scaled by `function(frequency * blend)`.
#[derive(Clone, Debug, PartialEq)]
pub struct XformMotion {
    /// Cycles per unit of blend.
    pub frequency: f64,
    /// Wave shape.
    pub function: MotionFunc,
    /// Weight delta.
    pub weight: f64,
    /// Color index delta.
    pub color_x: f64,
    /// Color speed delta.
    pub color_speed: f64,
    /// Opacity delta.
    pub opacity: f64,
    /// Affine delta.
    pub affine: Affine2D,
    /// Post affine delta.
    pub post: Affine2D,
    /// Variation weight deltas.
    pub variations: Vec<(VariationId, VarKind, f64)>,
}

impl XformMotion {
    /// A motion element with every delta zero.
    pub fn new(frequency: f64, function: MotionFunc) -> Self {
        XformMotion {
            frequency,
            function,
            weight: 0.0,
            color_x: 0.0,
            color_speed: 0.0,
            opacity: 0.0,
            affine: Affine2D::zero(),
            post: Affine2D::zero(),
            variations: Vec::new(),
        }
    }
}

/// One function of the iterated function system.
#[derive(Clone, Debug, PartialEq)]
pub struct Xform {
    /// Label carried through interpolation.
    pub name: String,
    /// Selection weight.  Weights across a genome need not sum to 1.
    pub weight: f64,
    /// Palette position this xform pulls the color towards.
    pub color_x: f64,
    /// How strongly the color moves towards `color_x`.
    pub color_speed: f64,
    /// Chance that a sample from this xform is plotted.
    pub opacity: f64,
    /// Non-zero when the xform takes part in rotation animation.
    pub animate: f64,
    /// Applied before the variations.
    pub affine: Affine2D,
    /// Applied after the variations; identity when unused.
    pub post: Affine2D,
    /// Periodic animation elements.
    pub motion: Vec<XformMotion>,
    variations: Vec<Variation>,
    xaos: Vec<f64>,
}

impl Default for Xform {
    fn default() -> Self {
        Xform::new()
    }
}

impl Xform {
    /// An identity xform with no variations.
    pub fn new() -> Self {
        Xform {
            name: String::new(),
            weight: 1.0,
            color_x: 0.0,
            color_speed: 0.5,
            opacity: 1.0,
            animate: 1.0,
            affine: Affine2D::identity(),
            post: Affine2D::identity(),
            motion: Vec::new(),
            variations: Vec::new(),
            xaos: Vec::new(),
        }
    }

    /// Defaults for a final xform: never selected, does not drift the color.
    pub fn new_final() -> Self {
        Xform {
            weight: 0.0,
            color_speed: 0.0,
            animate: 0.0,
            ..Xform::new()
        }
    }

    /// Builder form of `add_variation`.
    pub fn with_variation(mut self, var: Variation) -> Self {
        self.add_variation(var);
        self
    }

    /// Builder form that replaces the affine.
    pub fn with_affine(mut self, affine: Affine2D) -> Self {
        self.affine = affine;
        self
    }

    /// The variations in evaluation order.
    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    /// The variations, mutably.
    pub fn variations_mut(&mut self) -> &mut [Variation] {
        &mut self.variations
    }

    /// Number of variations in all slots.
    pub fn variation_count(&self) -> usize {
        self.variations.len()
    }

    /// Adds `var`, replacing any variation with the same id in the same
    /// slot.  Pre variations stay ahead of regular ones, post ones last.
    pub fn add_variation(&mut self, var: Variation) {
        match self.variations.iter_mut().find(|v| v.same_slot(&var)) {
            Some(existing) => *existing = var,
            None => {
                self.variations.push(var);
                self.variations.sort_by_key(|v| v.kind().index());
            }
        }
    }

    /// Removes a variation; false if absent.
    pub fn remove_variation(&mut self, id: VariationId, kind: VarKind) -> bool {
        let before = self.variations.len();
        self.variations
            .retain(|v| !(v.id() == id && v.kind() == kind));
        self.variations.len() != before
    }

    /// A variation by base function and slot.
    pub fn variation(&self, id: VariationId, kind: VarKind) -> Option<&Variation> {
        self.variations
            .iter()
            .find(|v| v.id() == id && v.kind() == kind)
    }

    /// Mutable form of `variation`.
    pub fn variation_mut(&mut self, id: VariationId, kind: VarKind) -> Option<&mut Variation> {
        self.variations
            .iter_mut()
            .find(|v| v.id() == id && v.kind() == kind)
    }

    /// Removes every variation.
    pub fn clear_variations(&mut self) {
        self.variations.clear();
    }

    /// Sum of the regular variation weights.
    pub fn total_variation_weight(&self) -> f64 {
        self.variations
            .iter()
            .filter(|v| v.kind() == VarKind::Regular)
            .map(|v| v.weight)
            .sum()
    }

    /// Whether any variation writes the color index.
    pub fn has_direct_color(&self) -> bool {
        self.variations.iter().any(|v| v.is_direct_color())
    }

    /// Whether the post affine is not the identity.
    pub fn has_post(&self) -> bool {
        !self.post.is_identity()
    }

    /// Transition weight towards xform `i`; 1 when unset.
    pub fn xaos(&self, i: usize) -> f64 {
        self.xaos.get(i).cloned().unwrap_or(1.0)
    }

    /// Sets the transition weight towards xform `i`.
    pub fn set_xaos(&mut self, i: usize, value: f64) {
        if i >= self.xaos.len() {
            self.xaos.resize(i + 1, 1.0);
        }
        self.xaos[i] = value;
    }

    /// The explicitly stored entries; missing ones are 1.
    pub fn xaos_row(&self) -> &[f64] {
        &self.xaos
    }

    /// Whether any xaos entry differs from 1.
    pub fn xaos_present(&self) -> bool {
        self.xaos.iter().any(|v| *v != 1.0)
    }

    /// Drops every xaos entry.
    pub fn clear_xaos(&mut self) {
        self.xaos.clear();
    }

    /// Keeps only the first `len` xaos entries.
    pub fn truncate_xaos(&mut self, len: usize) {
        self.xaos.truncate(len);
    }

    /// Drops the entry for xform `i`, shifting the later ones down.
    pub fn remove_xaos_column(&mut self, i: usize) {
        if i < self.xaos.len() {
            self.xaos.remove(i);
        }
    }

    /// Runs the point through this xform.  Returns true when the
    /// result is a bad value; `out` is written either way.
    #[inline]
    pub fn apply(&self, p: &Point, out: &mut Point, rng: &mut IsaacRng) -> bool {
        let color = self.color_speed * self.color_x + (1.0 - self.color_speed) * p.color;
        let (tx, ty) = self.affine.apply(p.x, p.y);
        let mut h = IterHelper::new(tx, ty, p.z, color);

        for var in self.variations.iter().filter(|v| v.kind() == VarKind::Pre) {
            let (x, y, z) = var.eval(&mut h, rng);
            h.set_input(x, y, z);
        }

        let mut summed = false;
        let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
        for var in self.variations.iter().filter(|v| v.kind() == VarKind::Regular) {
            let (vx, vy, vz) = var.eval(&mut h, rng);
            x += vx;
            y += vy;
            z += vz;
            summed = true;
        }
        if !summed {
            x = h.x;
            y = h.y;
            z = h.z;
        }

        for var in self.variations.iter().filter(|v| v.kind() == VarKind::Post) {
            h.set_input(x, y, z);
            let r = var.eval(&mut h, rng);
            x = r.0;
            y = r.1;
            z = r.2;
        }

        if self.has_post() {
            let (px, py) = self.post.apply(x, y);
            x = px;
            y = py;
        }

        out.x = x;
        out.y = y;
        out.z = z;
        out.color = h.color;
        out.opacity = self.opacity;

        is_bad_value(x) || is_bad_value(y) || is_bad_value(z)
    }

    /// A copy with every motion element applied at `blend`.  The copy
    /// carries no motion of its own.
    pub fn with_motion(&self, blend: f64) -> Xform {
        let mut xf = self.clone();
        xf.motion.clear();
        for m in &self.motion {
            let k = m.function.eval(m.frequency * blend);
            xf.weight += m.weight * k;
            xf.color_x += m.color_x * k;
            xf.color_speed += m.color_speed * k;
            xf.opacity += m.opacity * k;
            xf.affine = xf.affine.add(&m.affine.scaled_all(k));
            xf.post = xf.post.add(&m.post.scaled_all(k));
            for &(id, kind, delta) in &m.variations {
                if let Some(var) = xf.variation_mut(id, kind) {
                    var.weight += delta * k;
                }
            }
        }
        xf.weight = xf.weight.max(0.0);
        xf.color_x = num::clamp(xf.color_x, 0.0, 1.0);
        xf.color_speed = num::clamp(xf.color_speed, -1.0, 1.0);
        xf.opacity = num::clamp(xf.opacity, 0.0, 1.0);
        xf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, color: f64) -> Point {
        Point {
            x,
            y,
            z: 0.0,
            color,
            opacity: 1.0,
        }
    }

    #[test]
    fn linear_identity_keeps_the_point() {
        let xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
        let mut out = Point::default();
        let bad = xf.apply(&point(0.25, -0.5, 0.0), &mut out, &mut IsaacRng::new());
        assert!(!bad);
        assert_eq!((out.x, out.y), (0.25, -0.5));
    }

    #[test]
    fn color_moves_towards_the_xform_color() {
        let mut xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
        xf.color_x = 1.0;
        xf.color_speed = 0.25;
        let mut out = Point::default();
        xf.apply(&point(0.0, 0.0, 0.0), &mut out, &mut IsaacRng::new());
        assert!((out.color - 0.25).abs() < 1e-12);

        xf.color_speed = 0.0;
        xf.apply(&point(0.0, 0.0, 0.6), &mut out, &mut IsaacRng::new());
        assert!((out.color - 0.6).abs() < 1e-12);
    }

    #[test]
    fn affines_are_applied_around_the_variations() {
        let mut xf = Xform::new()
            .with_variation(Variation::new(VariationId::Linear, 2.0))
            .with_affine(Affine2D::new(1.0, 0.0, 1.0, 0.0, 1.0, 0.0));
        xf.post = Affine2D::new(1.0, 0.0, 0.0, 0.0, 1.0, -3.0);
        let mut out = Point::default();
        xf.apply(&point(1.0, 1.0, 0.0), &mut out, &mut IsaacRng::new());
        assert_eq!((out.x, out.y), (4.0, -1.0));
    }

    #[test]
    fn pre_variations_feed_regular_ones() {
        let xf = Xform::new()
            .with_variation(Variation::new(VariationId::Linear, 1.0))
            .with_variation(Variation::with_kind(VariationId::Linear, VarKind::Pre, 3.0));
        assert_eq!(xf.variations()[0].kind(), VarKind::Pre);
        let mut out = Point::default();
        xf.apply(&point(1.0, 2.0, 0.0), &mut out, &mut IsaacRng::new());
        assert_eq!((out.x, out.y), (3.0, 6.0));
    }

    #[test]
    fn no_regular_variations_passes_through() {
        let xf = Xform::new().with_affine(Affine2D::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0));
        let mut out = Point::default();
        xf.apply(&point(1.0, 1.0, 0.0), &mut out, &mut IsaacRng::new());
        assert_eq!((out.x, out.y), (2.0, 2.0));
    }

    #[test]
    fn huge_values_are_bad() {
        let xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1e12));
        let mut out = Point::default();
        assert!(xf.apply(&point(1.0, 1.0, 0.0), &mut out, &mut IsaacRng::new()));
        assert!(is_bad_value(std::f64::NAN));
        assert!(!is_bad_value(-5.0));
    }

    #[test]
    fn runaway_depth_is_bad() {
        let xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
        let mut out = Point::default();
        let mut deep = point(0.5, 0.5, 0.0);
        deep.z = 1e11;
        assert!(xf.apply(&deep, &mut out, &mut IsaacRng::new()));
        deep.z = std::f64::NAN;
        assert!(xf.apply(&deep, &mut out, &mut IsaacRng::new()));
        deep.z = -2.0;
        assert!(!xf.apply(&deep, &mut out, &mut IsaacRng::new()));
    }

    #[test]
    fn adding_the_same_variation_replaces_it() {
        let mut xf = Xform::new();
        xf.add_variation(Variation::new(VariationId::Swirl, 1.0));
        xf.add_variation(Variation::new(VariationId::Swirl, 0.3));
        assert_eq!(xf.variation_count(), 1);
        assert_eq!(xf.variations()[0].weight, 0.3);
        assert!(xf.remove_variation(VariationId::Swirl, VarKind::Regular));
        assert!(!xf.remove_variation(VariationId::Swirl, VarKind::Regular));
    }

    #[test]
    fn xaos_defaults_to_one() {
        let mut xf = Xform::new();
        assert_eq!(xf.xaos(5), 1.0);
        assert!(!xf.xaos_present());
        xf.set_xaos(2, 0.0);
        assert_eq!(xf.xaos(1), 1.0);
        assert_eq!(xf.xaos(2), 0.0);
        assert!(xf.xaos_present());
        xf.clear_xaos();
        assert!(!xf.xaos_present());
    }

    #[test]
    fn motion_offsets_by_function_value() {
        let mut xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
        let mut m = XformMotion::new(1.0, MotionFunc::Saw);
        m.weight = 0.5;
        m.variations.push((VariationId::Linear, VarKind::Regular, 1.0));
        xf.motion.push(m);
        let moved = xf.with_motion(0.75);
        assert!((moved.weight - 1.25).abs() < 1e-12);
        assert!((moved.variations()[0].weight - 1.5).abs() < 1e-12);
        assert!(moved.motion.is_empty());
    }

    #[test]
    fn motion_functions_have_unit_period() {
        for f in &[MotionFunc::Sin, MotionFunc::Triangle, MotionFunc::Hill, MotionFunc::Saw] {
            assert!((f.eval(0.3) - f.eval(1.3)).abs() < 1e-9);
        }
        assert!((MotionFunc::Triangle.eval(0.25) - 1.0).abs() < 1e-12);
        assert!((MotionFunc::Hill.eval(0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn regular_weight_ignores_pre_and_post() {
        let mut xf = Xform::new()
            .with_variation(Variation::new(VariationId::Linear, 0.5))
            .with_variation(Variation::new(VariationId::Swirl, 0.25));
        xf.add_variation(Variation::with_kind(VariationId::Spherical, VarKind::Post, 2.0));
        assert_eq!(xf.total_variation_weight(), 0.75);
        assert!(!xf.has_direct_color());
        xf.add_variation(Variation::new(VariationId::DcLinear, 1.0));
        assert!(xf.has_direct_color());
    }

    #[test]
    fn xaos_columns_shift_and_truncate() {
        let mut xf = Xform::new();
        for (i, v) in [0.0, 2.0, 3.0].iter().enumerate() {
            xf.set_xaos(i, *v);
        }
        xf.remove_xaos_column(0);
        assert_eq!(xf.xaos_row(), &[2.0, 3.0]);
        xf.truncate_xaos(1);
        assert_eq!(xf.xaos_row(), &[2.0]);
        assert_eq!(xf.xaos(1), 1.0);
    }
}
