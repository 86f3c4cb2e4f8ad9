// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Variations: the nonlinear functions an xform sums over.
//!
//! A variation is identified by its base function (`VariationId`)
//! and the slot it occupies in the xform (`VarKind`).  Pre
//! variations rewrite the affine-transformed point before the
//! regular variations see it, regular variations are summed, and
//! post variations rewrite the summed result.  The three slots give
//! the `pre_` / `post_` name families.
//!
//! Parametric variations carry a fixed list of named parameters.
//! Some of those are derived ("precalculated") from the others and
//! are recomputed by `Variation::precalc`; they are never edited or
//! interpolated directly.

use crate::isaac::IsaacRng;
use num::Complex;
use std::f64::consts::PI;

/// Guards divisions by quantities that can reach zero.
pub const EPS: f64 = 1e-10;

/// Which slot of the xform a variation occupies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Applied to the affine output before the regular variations.
    Pre,
    /// Summed into the xform's output.
    Regular,
    /// Applied after the post affine.
    Post,
}

impl VarKind {
    /// Name prefix in flame files.
    pub fn prefix(self) -> &'static str {
        match self {
            VarKind::Pre => "pre_",
            VarKind::Regular => "",
            VarKind::Post => "post_",
        }
    }

    /// Position in `pre`, regular, `post` order.
    pub fn index(self) -> usize {
        match self {
            VarKind::Pre => 0,
            VarKind::Regular => 1,
            VarKind::Post => 2,
        }
    }
}

macro_rules! variation_ids {
    ($($id:ident => $name:literal),* $(,)*) => {
        /// The base variation functions.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum VariationId {
            $(#[doc = $name] $id),*
        }

        impl VariationId {
            /// Every base variation, in numeric id order.
            pub const ALL: &'static [VariationId] = &[$(VariationId::$id),*];

            /// Name without a slot prefix.
            pub fn base_name(self) -> &'static str {
                match self {
                    $(VariationId::$id => $name),*
                }
            }
        }
    };
}

variation_ids! {
    Linear => "linear",
    Sinusoidal => "sinusoidal",
    Spherical => "spherical",
    Swirl => "swirl",
    Horseshoe => "horseshoe",
    Polar => "polar",
    Handkerchief => "handkerchief",
    Heart => "heart",
    Disc => "disc",
    Spiral => "spiral",
    Hyperbolic => "hyperbolic",
    Diamond => "diamond",
    Ex => "ex",
    Julia => "julia",
    Bent => "bent",
    Fisheye => "fisheye",
    Exponential => "exponential",
    Power => "power",
    Cosine => "cosine",
    Bubble => "bubble",
    Cylinder => "cylinder",
    Eyefish => "eyefish",
    Blur => "blur",
    GaussianBlur => "gaussian_blur",
    Tangent => "tangent",
    Square => "square",
    Cross => "cross",
    Noise => "noise",
    Linear3D => "linear3D",
    Butterfly => "butterfly",
    Hemisphere => "hemisphere",
    Blob => "blob",
    Pdj => "pdj",
    Fan2 => "fan2",
    Rings2 => "rings2",
    Perspective => "perspective",
    Julian => "julian",
    JuliaScope => "juliascope",
    RadialBlur => "radial_blur",
    Pie => "pie",
    Ngon => "ngon",
    Curl => "curl",
    Rectangles => "rectangles",
    Wedge => "wedge",
    Waves2 => "waves2",
    Splits => "splits",
    DcLinear => "dc_linear",
}

impl VariationId {
    /// Numeric id in flam3 order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of `base_name`.
    pub fn from_base_name(name: &str) -> Option<VariationId> {
        VariationId::ALL
            .iter()
            .cloned()
            .find(|id| id.base_name() == name)
    }

    /// Direct-color variations write the color index themselves.
    pub fn is_direct_color(self) -> bool {
        self == VariationId::DcLinear
    }

    fn default_params(self) -> Vec<Param> {
        use self::VariationId::*;
        match self {
            Blob => vec![
                Param::real("blob_high", 1.0),
                Param::real("blob_low", 0.0),
                Param::real("blob_waves", 1.0),
            ],
            Pdj => vec![
                Param::real("pdj_a", 0.0),
                Param::real("pdj_b", 0.0),
                Param::real("pdj_c", 0.0),
                Param::real("pdj_d", 0.0),
            ],
            Fan2 => vec![Param::real("fan2_x", 0.0), Param::real("fan2_y", 0.0)],
            Rings2 => vec![Param::real("rings2_val", 0.0), Param::derived("rings2_dx")],
            Perspective => vec![
                Param::real("perspective_angle", 0.0),
                Param::real("perspective_dist", 0.0),
                Param::derived("perspective_vsin"),
                Param::derived("perspective_vfcos"),
            ],
            Julian => vec![
                Param::int_nonzero("julian_power", 1.0),
                Param::real("julian_dist", 1.0),
                Param::derived("julian_abs_n"),
                Param::derived("julian_cn"),
            ],
            JuliaScope => vec![
                Param::int_nonzero("juliascope_power", 1.0),
                Param::real("juliascope_dist", 1.0),
                Param::derived("juliascope_abs_n"),
                Param::derived("juliascope_cn"),
            ],
            RadialBlur => vec![
                Param::real("radial_blur_angle", 0.0),
                Param::derived("radial_blur_spin"),
                Param::derived("radial_blur_zoom"),
            ],
            Pie => vec![
                Param::int_nonzero("pie_slices", 6.0).bounded(1.0, f64::MAX),
                Param::real("pie_rotation", 0.0),
                Param::real("pie_thickness", 0.5).bounded(0.0, 1.0),
            ],
            Ngon => vec![
                Param::real("ngon_power", 3.0),
                Param::real("ngon_sides", 5.0),
                Param::real("ngon_corners", 2.0),
                Param::real("ngon_circle", 1.0),
                Param::derived("ngon_pow_half"),
                Param::derived("ngon_b"),
            ],
            Curl => vec![Param::real("curl_c1", 1.0), Param::real("curl_c2", 0.0)],
            Rectangles => vec![
                Param::real("rectangles_x", 1.0),
                Param::real("rectangles_y", 1.0),
            ],
            Wedge => vec![
                Param::real("wedge_angle", PI / 2.0),
                Param::real("wedge_hole", 0.0),
                Param::int_nonzero("wedge_count", 2.0).bounded(1.0, f64::MAX),
                Param::real("wedge_swirl", 0.0),
                Param::derived("wedge_comp_fac"),
            ],
            Waves2 => vec![
                Param::real("waves2_freqx", 2.0),
                Param::real("waves2_scalex", 0.25),
                Param::real("waves2_freqy", 2.0),
                Param::real("waves2_scaley", 0.25),
            ],
            Splits => vec![Param::real("splits_x", 0.0), Param::real("splits_y", 0.0)],
            DcLinear => vec![
                Param::real("dc_linear_offset", 0.0),
                Param::real("dc_linear_angle", 0.0),
                Param::real("dc_linear_scale", 1.0),
                Param::derived("dc_linear_ldcs"),
                Param::derived("dc_linear_cos"),
                Param::derived("dc_linear_sin"),
            ],
            _ => Vec::new(),
        }
    }
}

/// Numeric type of a variation parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value.
    Real,
    /// Rounded to an integer.
    Integer,
    /// An integer that may not be zero.  Zero is replaced by one.
    IntegerNonZero,
}

/// One named, bounded variation parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Name without the variation prefix.
    pub name: &'static str,
    /// Numeric type.
    pub kind: ParamKind,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Derived from the other parameters; never set or interpolated directly.
    pub precalc: bool,
    default: f64,
    value: f64,
}

impl Param {
    fn real(name: &'static str, default: f64) -> Self {
        Param {
            name,
            kind: ParamKind::Real,
            min: f64::MIN,
            max: f64::MAX,
            precalc: false,
            default,
            value: default,
        }
    }

    fn int_nonzero(name: &'static str, default: f64) -> Self {
        Param {
            kind: ParamKind::IntegerNonZero,
            ..Param::real(name, default)
        }
    }

    fn derived(name: &'static str) -> Self {
        Param {
            precalc: true,
            ..Param::real(name, 0.0)
        }
    }

    fn bounded(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value before any change.
    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Stores `value` clamped to the bounds and rounded for the
    /// integer kinds.
    pub fn set(&mut self, value: f64) {
        let mut v = num::clamp(value, self.min, self.max);
        match self.kind {
            ParamKind::Real => {}
            ParamKind::Integer => v = v.round(),
            ParamKind::IntegerNonZero => {
                v = v.round();
                if v == 0.0 {
                    v = 1.0;
                }
            }
        }
        self.value = v;
    }
}

/// Stateless variations have nothing but a weight; parametric ones
/// own their parameter list.
#[derive(Clone, Debug, PartialEq)]
pub enum VariationBody {
    /// Weight only.
    Stateless,
    /// Weight plus parameters.
    Parametric {
        /// Declared parameters in declaration order.
        params: Vec<Param>,
    },
}

/// Per-iteration scratch state shared by the variations of one
/// xform: the input point, the running color index and the common
/// polar quantities.
#[derive(Copy, Clone, Debug, Default)]
pub struct IterHelper {
    /// Input x.
    pub x: f64,
    /// Input y.
    pub y: f64,
    /// Input z.
    pub z: f64,
    /// Running color index.
    pub color: f64,
    /// `x² + y²`.
    pub sumsq: f64,
    /// `sqrt(x² + y²)`.
    pub sqrt: f64,
    /// `atan2(x, y)`
    pub atanxy: f64,
    /// `atan2(y, x)`
    pub atanyx: f64,
    /// `x / r`
    pub sina: f64,
    /// `y / r`
    pub cosa: f64,
}

impl IterHelper {
    /// Scratch state for one input point.
    pub fn new(x: f64, y: f64, z: f64, color: f64) -> Self {
        let mut h = IterHelper {
            color,
            ..IterHelper::default()
        };
        h.set_input(x, y, z);
        h
    }

    /// Replaces the input point and refreshes the polar quantities.
    pub fn set_input(&mut self, x: f64, y: f64, z: f64) {
        self.x = x;
        self.y = y;
        self.z = z;
        self.sumsq = x * x + y * y;
        self.sqrt = self.sumsq.sqrt();
        self.atanxy = x.atan2(y);
        self.atanyx = y.atan2(x);
        if self.sqrt > 0.0 {
            self.sina = x / self.sqrt;
            self.cosa = y / self.sqrt;
        } else {
            self.sina = 0.0;
            self.cosa = 0.0;
        }
    }
}

/// A variation function in one slot of an xform, with its weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Variation {
    id: VariationId,
    kind: VarKind,
    /// Multiplier on the function's output.
    pub weight: f64,
    body: VariationBody,
}

impl Variation {
    /// A regular variation with default parameters.
    pub fn new(id: VariationId, weight: f64) -> Self {
        Variation::with_kind(id, VarKind::Regular, weight)
    }

    /// A variation in the given slot with default parameters.
    pub fn with_kind(id: VariationId, kind: VarKind, weight: f64) -> Self {
        let params = id.default_params();
        let body = if params.is_empty() {
            VariationBody::Stateless
        } else {
            VariationBody::Parametric { params }
        };
        let mut var = Variation {
            id,
            kind,
            weight,
            body,
        };
        var.precalc();
        var
    }

    /// Parses a full name such as `"pre_blur"` or `"julian"`.
    pub fn by_name(name: &str, weight: f64) -> Option<Variation> {
        let (kind, base) = if name.starts_with("pre_") {
            (VarKind::Pre, &name[4..])
        } else if name.starts_with("post_") {
            (VarKind::Post, &name[5..])
        } else {
            (VarKind::Regular, name)
        };
        VariationId::from_base_name(base).map(|id| Variation::with_kind(id, kind, weight))
    }

    /// Base function.
    pub fn id(&self) -> VariationId {
        self.id
    }

    /// Slot.
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    /// Stable across runs: the base id offset by the slot.
    pub fn numeric_id(&self) -> usize {
        self.kind.index() * VariationId::ALL.len() + self.id.index()
    }

    /// Slot prefix plus base name.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.id.base_name())
    }

    /// Same base function in the same slot.
    pub fn same_slot(&self, other: &Variation) -> bool {
        self.id == other.id && self.kind == other.kind
    }

    /// Whether it writes the color index.
    pub fn is_direct_color(&self) -> bool {
        self.id.is_direct_color()
    }

    /// The parameters, or None for stateless variations.
    pub fn as_parametric(&self) -> Option<&[Param]> {
        match self.body {
            VariationBody::Parametric { ref params } => Some(params),
            VariationBody::Stateless => None,
        }
    }

    /// Mutable view of the parameters.  Callers that change values
    /// through it must call `precalc` afterwards.
    pub fn as_parametric_mut(&mut self) -> Option<&mut [Param]> {
        match self.body {
            VariationBody::Parametric { ref mut params } => Some(params),
            VariationBody::Stateless => None,
        }
    }

    /// Value of a parameter by name.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.as_parametric()
            .and_then(|params| params.iter().find(|p| p.name == name))
            .map(|p| p.value)
    }

    /// Sets a non-derived parameter and refreshes the derived ones.
    /// Returns false when no such settable parameter exists.
    pub fn set_param(&mut self, name: &str, value: f64) -> bool {
        let found = match self.as_parametric_mut() {
            Some(params) => match params.iter_mut().find(|p| p.name == name && !p.precalc) {
                Some(p) => {
                    p.set(value);
                    true
                }
                None => false,
            },
            None => false,
        };
        if found {
            self.precalc();
        }
        found
    }

    /// Jitters every settable parameter around its default.
    pub fn randomize_params(&mut self, rng: &mut IsaacRng) {
        if let Some(params) = self.as_parametric_mut() {
            for p in params.iter_mut().filter(|p| !p.precalc) {
                let v = match p.kind {
                    ParamKind::Real => p.default + rng.next_f11(),
                    _ => p.default + f64::from(rng.next_up_to(5)) - 2.0,
                };
                p.set(v);
            }
        }
        self.precalc();
    }

    #[inline]
    fn p(&self, i: usize) -> f64 {
        match self.body {
            VariationBody::Parametric { ref params } => params[i].value,
            VariationBody::Stateless => 0.0,
        }
    }

    fn set_derived(&mut self, i: usize, value: f64) {
        if let VariationBody::Parametric { ref mut params } = self.body {
            params[i].value = value;
        }
    }

    /// Recomputes the derived parameters.
    pub fn precalc(&mut self) {
        use self::VariationId::*;
        match self.id {
            Rings2 => {
                let val = self.p(0);
                self.set_derived(1, val * val + EPS);
            }
            Perspective => {
                let ang = self.p(0) * PI / 2.0;
                let dist = self.p(1);
                self.set_derived(2, ang.sin());
                self.set_derived(3, dist * ang.cos());
            }
            Julian | JuliaScope => {
                let power = self.p(0);
                let dist = self.p(1);
                self.set_derived(2, power.abs().trunc());
                self.set_derived(3, dist / power / 2.0);
            }
            RadialBlur => {
                let ang = self.p(0) * PI / 2.0;
                self.set_derived(1, ang.sin());
                self.set_derived(2, ang.cos());
            }
            Ngon => {
                let power = self.p(0);
                let sides = self.p(1);
                self.set_derived(4, power / 2.0);
                self.set_derived(5, 2.0 * PI / if sides == 0.0 { EPS } else { sides });
            }
            Wedge => {
                let comp = 1.0 - self.p(0) * self.p(2) / (2.0 * PI);
                self.set_derived(4, comp);
            }
            DcLinear => {
                let scale = self.p(2);
                let angle = self.p(1);
                self.set_derived(3, 1.0 / if scale == 0.0 { 1e-20 } else { scale });
                self.set_derived(4, angle.cos());
                self.set_derived(5, angle.sin());
            }
            _ => {}
        }
    }

    /// The z value 2-D variations pass along: nothing when summed,
    /// the input z when they replace the point.
    #[inline]
    fn default_z(&self, h: &IterHelper) -> f64 {
        if self.kind == VarKind::Regular {
            0.0
        } else {
            h.z
        }
    }

    /// Weighted output of this variation for the point in `h`.
    pub fn eval(&self, h: &mut IterHelper, rng: &mut IsaacRng) -> (f64, f64, f64) {
        use self::VariationId::*;
        let w = self.weight;
        let (x, y) = (h.x, h.y);
        let dz = self.default_z(h);

        match self.id {
            Linear | Linear3D => (w * x, w * y, w * h.z),
            Sinusoidal => (w * x.sin(), w * y.sin(), dz),
            Spherical => {
                let r2 = w / (h.sumsq + EPS);
                (x * r2, y * r2, dz)
            }
            Swirl => {
                let (c1, c2) = h.sumsq.sin_cos();
                (w * (c1 * x - c2 * y), w * (c2 * x + c1 * y), dz)
            }
            Horseshoe => {
                let r = w / (h.sqrt + EPS);
                ((x - y) * (x + y) * r, 2.0 * x * y * r, dz)
            }
            Polar => (w * h.atanxy / PI, w * (h.sqrt - 1.0), dz),
            Handkerchief => {
                let (a, r) = (h.atanxy, h.sqrt);
                (w * r * (a + r).sin(), w * r * (a - r).cos(), dz)
            }
            Heart => {
                let a = h.sqrt * h.atanxy;
                let r = w * h.sqrt;
                let (s, c) = a.sin_cos();
                (r * s, -r * c, dz)
            }
            Disc => {
                let a = w * h.atanxy / PI;
                let (s, c) = (PI * h.sqrt).sin_cos();
                (a * s, a * c, dz)
            }
            Spiral => {
                let r = h.sqrt + EPS;
                let r1 = w / r;
                let (s, c) = r.sin_cos();
                (r1 * (h.cosa + s), r1 * (h.sina - c), dz)
            }
            Hyperbolic => {
                let r = h.sqrt + EPS;
                (w * h.sina / r, w * h.cosa * r, dz)
            }
            Diamond => {
                let (s, c) = h.sqrt.sin_cos();
                (w * h.sina * c, w * h.cosa * s, dz)
            }
            Ex => {
                let (a, r) = (h.atanxy, h.sqrt);
                let n0 = (a + r).sin();
                let n1 = (a - r).cos();
                let m0 = n0 * n0 * n0 * r;
                let m1 = n1 * n1 * n1 * r;
                (w * (m0 + m1), w * (m0 - m1), dz)
            }
            Julia => {
                let mut a = 0.5 * h.atanxy;
                if rng.next_bit() {
                    a += PI;
                }
                let r = w * h.sqrt.sqrt();
                let (s, c) = a.sin_cos();
                (r * c, r * s, dz)
            }
            Bent => {
                let nx = if x < 0.0 { x * 2.0 } else { x };
                let ny = if y < 0.0 { y / 2.0 } else { y };
                (w * nx, w * ny, dz)
            }
            Fisheye => {
                let r = 2.0 * w / (h.sqrt + 1.0);
                (r * y, r * x, dz)
            }
            Exponential => {
                let dx = w * (x - 1.0).exp();
                let (s, c) = (PI * y).sin_cos();
                (dx * c, dx * s, dz)
            }
            Power => {
                let r = w * h.sqrt.powf(h.sina);
                (r * h.cosa, r * h.sina, dz)
            }
            Cosine => {
                let (s, c) = (x * PI).sin_cos();
                (w * c * y.cosh(), -w * s * y.sinh(), dz)
            }
            Bubble => {
                let r = w / (0.25 * h.sumsq + 1.0);
                (r * x, r * y, dz)
            }
            Cylinder => (w * x.sin(), w * y, dz),
            Eyefish => {
                let r = 2.0 * w / (h.sqrt + 1.0);
                (r * x, r * y, dz)
            }
            Blur => {
                let (s, c) = rng.next_angle().sin_cos();
                let r = w * rng.next_f01();
                (r * c, r * s, dz)
            }
            GaussianBlur => {
                let (s, c) = rng.next_angle().sin_cos();
                let r = w * gaussian_sum(rng);
                (r * c, r * s, dz)
            }
            Tangent => (w * x.sin() / y.cos(), w * y.tan(), dz),
            Square => (w * (rng.next_f01() - 0.5), w * (rng.next_f01() - 0.5), dz),
            Cross => {
                let s = x * x - y * y;
                let r = w * (1.0 / (s * s + EPS)).sqrt();
                (x * r, y * r, dz)
            }
            Noise => {
                let (s, c) = rng.next_angle().sin_cos();
                let r = w * rng.next_f01();
                (x * r * c, y * r * s, dz)
            }
            Butterfly => {
                let wx = w * 1.302_940_031_741_119_8;
                let y2 = y * 2.0;
                let r = wx * ((x * y).abs() / (EPS + x * x + y2 * y2)).sqrt();
                (r * x, r * y2, dz)
            }
            Hemisphere => {
                let t = w / (h.sumsq + 1.0).sqrt();
                (x * t, y * t, t)
            }
            Blob => {
                let (high, low, waves) = (self.p(0), self.p(1), self.p(2));
                let r = h.sqrt * (low + (high - low) * (0.5 + 0.5 * (waves * h.atanyx).sin()));
                (w * h.sina * r, w * h.cosa * r, dz)
            }
            Pdj => {
                let (a, b, c, d) = (self.p(0), self.p(1), self.p(2), self.p(3));
                (
                    w * ((a * y).sin() - (b * x).cos()),
                    w * ((c * x).sin() - (d * y).cos()),
                    dz,
                )
            }
            Fan2 => {
                let (fx, fy) = (self.p(0), self.p(1));
                let dx = PI * (fx * fx + EPS);
                let dx2 = dx / 2.0;
                let mut a = h.atanxy;
                let r = w * h.sqrt;
                let t = a + fy - dx * ((a + fy) / dx).trunc();
                if t > dx2 {
                    a -= dx2;
                } else {
                    a += dx2;
                }
                let (s, c) = a.sin_cos();
                (r * s, r * c, dz)
            }
            Rings2 => {
                let dx = self.p(1);
                let mut r = h.sqrt;
                r += -2.0 * dx * ((r + dx) / (2.0 * dx)).trunc() + r * (1.0 - dx);
                (w * h.sina * r, w * h.cosa * r, dz)
            }
            Perspective => {
                let (dist, vsin, vfcos) = (self.p(1), self.p(2), self.p(3));
                let t = 1.0 / (dist - y * vsin);
                (w * dist * x * t, w * vfcos * y * t, dz)
            }
            Julian => {
                let (power, abs_n, cn) = (self.p(0), self.p(2), self.p(3));
                let k = f64::from(rng.next_up_to(abs_n as u32));
                let tr = (h.atanyx + 2.0 * PI * k) / power;
                let r = w * h.sumsq.powf(cn);
                let (s, c) = tr.sin_cos();
                (r * c, r * s, dz)
            }
            JuliaScope => {
                let (power, abs_n, cn) = (self.p(0), self.p(2), self.p(3));
                let k = rng.next_up_to(abs_n as u32);
                let tr = if k & 1 == 0 {
                    (2.0 * PI * f64::from(k) + h.atanyx) / power
                } else {
                    (2.0 * PI * f64::from(k) - h.atanyx) / power
                };
                let r = w * h.sumsq.powf(cn);
                let (s, c) = tr.sin_cos();
                (r * c, r * s, dz)
            }
            RadialBlur => {
                let (spin, zoom) = (self.p(1), self.p(2));
                let rnd_g = w * gaussian_sum(rng);
                let ra = h.sqrt;
                let (sa, ca) = (h.atanyx + spin * rnd_g).sin_cos();
                let rz = zoom * rnd_g - 1.0;
                (ra * ca + rz * x, ra * sa + rz * y, dz)
            }
            Pie => {
                let (slices, rotation, thickness) = (self.p(0), self.p(1), self.p(2));
                let sl = (rng.next_f01() * slices + 0.5).trunc();
                let a = rotation + 2.0 * PI * (sl + rng.next_f01() * thickness) / slices;
                let r = w * rng.next_f01();
                let (s, c) = a.sin_cos();
                (r * c, r * s, dz)
            }
            Ngon => {
                let (corners, circle, pow_half, b) = (self.p(2), self.p(3), self.p(4), self.p(5));
                let r_factor = h.sumsq.powf(pow_half);
                let theta = h.atanyx;
                let mut phi = theta - b * (theta / b).floor();
                if phi > b / 2.0 {
                    phi -= b;
                }
                let amp = (corners * (1.0 / (phi.cos() + EPS) - 1.0) + circle) / (r_factor + EPS);
                (w * x * amp, w * y * amp, dz)
            }
            Curl => {
                let (c1, c2) = (self.p(0), self.p(1));
                let z = Complex::new(x, y);
                let out = z / (Complex::new(1.0, 0.0) + z * c1 + z * z * c2) * w;
                (out.re, out.im, dz)
            }
            Rectangles => {
                let (rx, ry) = (self.p(0), self.p(1));
                let ox = if rx == 0.0 {
                    w * x
                } else {
                    w * ((2.0 * (x / rx).floor() + 1.0) * rx - x)
                };
                let oy = if ry == 0.0 {
                    w * y
                } else {
                    w * ((2.0 * (y / ry).floor() + 1.0) * ry - y)
                };
                (ox, oy, dz)
            }
            Wedge => {
                let (angle, hole, count, swirl, comp_fac) =
                    (self.p(0), self.p(1), self.p(2), self.p(3), self.p(4));
                let r = h.sqrt;
                let mut a = h.atanyx + swirl * r;
                let c = ((count * a + PI) / (2.0 * PI)).floor();
                a = a * comp_fac + c * angle;
                let r = w * (r + hole);
                let (s, co) = a.sin_cos();
                (r * co, r * s, dz)
            }
            Waves2 => {
                let (fx, sx, fy, sy) = (self.p(0), self.p(1), self.p(2), self.p(3));
                (w * (x + sx * (y * fy).sin()), w * (y + sy * (x * fx).sin()), dz)
            }
            Splits => {
                let (sx, sy) = (self.p(0), self.p(1));
                let ox = if x >= 0.0 { w * (x + sx) } else { w * (x - sx) };
                let oy = if y >= 0.0 { w * (y + sy) } else { w * (y - sy) };
                (ox, oy, dz)
            }
            DcLinear => {
                let (offset, ldcs, cos_a, sin_a) = (self.p(0), self.p(3), self.p(4), self.p(5));
                let c = (0.5 * (ldcs * (cos_a * x + sin_a * y + offset) + 1.0)).abs() % 1.0;
                h.color = c;
                (w * x, w * y, w * h.z)
            }
        }
    }
}

/// Sum of four uniforms shifted to be centred on zero; a cheap
/// approximation of a gaussian on `(-2, 2)`.
#[inline]
fn gaussian_sum(rng: &mut IsaacRng) -> f64 {
    rng.next_f01() + rng.next_f01() + rng.next_f01() + rng.next_f01() - 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(var: &Variation, x: f64, y: f64) -> (f64, f64, f64) {
        let mut h = IterHelper::new(x, y, 0.0, 0.5);
        var.eval(&mut h, &mut IsaacRng::from_u64(1))
    }

    #[test]
    fn names_round_trip() {
        for id in VariationId::ALL {
            for kind in &[VarKind::Pre, VarKind::Regular, VarKind::Post] {
                let var = Variation::with_kind(*id, *kind, 1.0);
                let back = Variation::by_name(&var.full_name(), 1.0).unwrap();
                assert_eq!(back.id(), *id);
                assert_eq!(back.kind(), *kind);
            }
        }
        assert!(Variation::by_name("no_such_thing", 1.0).is_none());
    }

    #[test]
    fn numeric_ids_are_unique() {
        let mut ids: Vec<usize> = VariationId::ALL
            .iter()
            .flat_map(|id| {
                vec![
                    Variation::with_kind(*id, VarKind::Pre, 1.0).numeric_id(),
                    Variation::with_kind(*id, VarKind::Regular, 1.0).numeric_id(),
                    Variation::with_kind(*id, VarKind::Post, 1.0).numeric_id(),
                ]
            })
            .collect();
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn linear_is_weighted_identity() {
        let var = Variation::new(VariationId::Linear, 0.5);
        assert_eq!(eval(&var, 2.0, -4.0), (1.0, -2.0, 0.0));
    }

    #[test]
    fn spherical_inverts_radius() {
        let var = Variation::new(VariationId::Spherical, 1.0);
        let (x, y, _) = eval(&var, 2.0, 0.0);
        assert!((x - 0.5).abs() < 1e-9);
        assert!(y.abs() < 1e-12);
    }

    #[test]
    fn stateless_variations_have_no_params() {
        let var = Variation::new(VariationId::Swirl, 1.0);
        assert!(var.as_parametric().is_none());
        let var = Variation::new(VariationId::Julian, 1.0);
        assert_eq!(var.as_parametric().unwrap().len(), 4);
    }

    #[test]
    fn setting_params_updates_derived_values() {
        let mut var = Variation::new(VariationId::Julian, 1.0);
        assert!(var.set_param("julian_power", 4.0));
        assert!(var.set_param("julian_dist", 2.0));
        assert_eq!(var.param("julian_abs_n"), Some(4.0));
        assert_eq!(var.param("julian_cn"), Some(0.25));
        assert!(!var.set_param("julian_cn", 7.0));
        assert!(!var.set_param("missing", 7.0));
    }

    #[test]
    fn integer_params_round_and_avoid_zero() {
        let mut var = Variation::new(VariationId::Julian, 1.0);
        var.set_param("julian_power", 2.6);
        assert_eq!(var.param("julian_power"), Some(3.0));
        var.set_param("julian_power", 0.2);
        assert_eq!(var.param("julian_power"), Some(1.0));
    }

    #[test]
    fn bounded_params_clamp() {
        let mut var = Variation::new(VariationId::Pie, 1.0);
        var.set_param("pie_thickness", 5.0);
        assert_eq!(var.param("pie_thickness"), Some(1.0));
        var.set_param("pie_slices", -3.0);
        assert_eq!(var.param("pie_slices"), Some(1.0));
    }

    #[test]
    fn direct_color_writes_the_color_index() {
        let var = Variation::new(VariationId::DcLinear, 1.0);
        let mut h = IterHelper::new(0.5, 0.0, 0.0, 0.9);
        var.eval(&mut h, &mut IsaacRng::new());
        assert!((h.color - 0.75).abs() < 1e-12);
        assert!(var.is_direct_color());
    }

    #[test]
    fn regular_2d_variations_drop_z_and_pre_keep_it() {
        let reg = Variation::new(VariationId::Sinusoidal, 1.0);
        let pre = Variation::with_kind(VariationId::Sinusoidal, VarKind::Pre, 1.0);
        let mut h = IterHelper::new(0.1, 0.2, 3.0, 0.0);
        let mut rng = IsaacRng::new();
        assert_eq!(reg.eval(&mut h, &mut rng).2, 0.0);
        assert_eq!(pre.eval(&mut h, &mut rng).2, 3.0);
    }

    #[test]
    fn every_variation_is_finite_on_ordinary_points() {
        let mut rng = IsaacRng::from_u64(11);
        for id in VariationId::ALL {
            let mut var = Variation::new(*id, 1.0);
            var.randomize_params(&mut rng);
            let mut h = IterHelper::new(0.3, -0.4, 0.1, 0.5);
            let (x, y, z) = var.eval(&mut h, &mut rng);
            assert!(x.is_finite() && y.is_finite() && z.is_finite(), "{}", var.full_name());
        }
    }
}
