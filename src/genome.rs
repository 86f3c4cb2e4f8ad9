// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The genome: everything needed to render one fractal flame.
//!
//! A genome is built with defaults, filled in by whatever reads
//! flame descriptions, and handed read-only to the interpolator and
//! the renderer.  Cloning a genome deep-copies every xform and
//! variation.

use crate::affine::{round6, Affine2D};
use crate::error::{RenderError, Result};
use crate::isaac::IsaacRng;
use crate::iterator::ProjectionKind;
use crate::palette::{Color, Palette, PALETTE_SIZE};
use crate::spatial::SpatialFilterType;
use crate::temporal::TemporalFilterType;
use crate::variation::{Variation, VariationId};
use crate::xform::Xform;
use std::f64::consts::PI;
use std::fmt;

pub use crate::palette::PaletteMode;

/// How keyframes are blended over time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterpKind {
    /// Straight-line blend of the two nearest keyframes.
    Linear,
    /// Catmull-Rom through the four surrounding keyframes.
    Smooth,
}

/// How xform coefficients are blended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AffineInterp {
    /// Each coefficient separately.
    Linear,
    /// Rotation and scale blended in polar form.
    Log,
}

/// How palettes are blended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaletteInterp {
    /// Entry by entry in HSV.
    Hsv,
    /// Hard cut between the first two palettes.
    Sweep,
}

/// Free-form edit history.  Carried along and cloned, never read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditDoc(pub String);

const SYMMETRY_DISTRIBUTION: [i32; 15] = [-4, -3, -2, -2, -2, -1, -1, -1, 2, 2, 2, 3, 3, 4, 4];

/// A flame: xforms, palette, camera and rendering parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Genome {
    /// Shown in logs and image comments.
    pub name: String,
    /// Keyframe position; larger times come later.
    pub time: f64,
    /// Keyframe blending.
    pub interpolation: InterpKind,
    /// Coefficient blending.
    pub affine_interp: AffineInterp,
    /// Palette blending.
    pub palette_interp: PaletteInterp,
    /// Step or linear palette lookup.
    pub palette_mode: PaletteMode,
    /// The colors xforms index into.
    pub palette: Palette,

    /// Output width in pixels.
    pub width: usize,
    /// Output height in pixels.
    pub height: usize,
    /// Camera center, x.
    pub center_x: f64,
    /// Camera center, y.
    pub center_y: f64,
    /// Degrees.
    pub rotate: f64,
    /// Log2 of the magnification.
    pub zoom: f64,
    /// Scale at zoom 0.
    pub pixels_per_unit: f64,
    /// Width over height of one pixel.
    pub pixel_aspect_ratio: f64,

    /// Samples per output pixel.
    pub quality: f64,
    /// Histogram cells per output pixel, on each axis.
    pub supersample: usize,
    /// Time steps per frame for motion blur.
    pub temporal_samples: usize,
    /// Iterations discarded before plotting.
    pub fuse_count: usize,

    /// Camera height.
    pub cam_zpos: f64,
    /// Strength of the perspective division.
    pub cam_perspective: f64,
    /// Radians.
    pub cam_pitch: f64,
    /// Radians.
    pub cam_yaw: f64,
    /// Blur with distance from the focal plane.
    pub cam_depth_blur: f64,
    /// Rotation derived from pitch and yaw by `update_camera_matrix`.
    pub cam_mat: [[f64; 3]; 3],

    /// Kernel shape for the final resampling.
    pub spatial_filter_type: SpatialFilterType,
    /// Kernel radius in output pixels.
    pub spatial_filter_radius: f64,
    /// Weighting of temporal samples.
    pub temporal_filter_type: TemporalFilterType,
    /// Span of the temporal samples in frame units.
    pub temporal_filter_width: f64,
    /// Exponent for the exponential temporal filter.
    pub temporal_filter_exp: f64,

    /// Density-estimation radius for dense cells.
    pub de_min_radius: f64,
    /// Density-estimation radius for sparse cells; 0 disables it.
    pub de_max_radius: f64,
    /// Falloff of the radius with density.
    pub de_curve: f64,

    /// Overall brightness.
    pub brightness: f64,
    /// Gamma applied to the log density.
    pub gamma: f64,
    /// Densities below this are handled linearly.
    pub gamma_threshold: f64,
    /// Share of gamma applied to alpha instead of color.
    pub vibrancy: f64,
    /// Desaturation of overexposed cells.
    pub highlight_power: f64,
    /// Shown where the flame is transparent.
    pub background: Color,

    /// Last symmetry added by `add_symmetry`.
    pub symmetry: i32,
    /// Free-form edit history.
    pub edit: Option<EditDoc>,

    xforms: Vec<Xform>,
    final_xform: Option<Xform>,
}

impl Default for Genome {
    fn default() -> Self {
        Genome::new()
    }
}

impl Genome {
    /// A genome with no xforms and flam3's defaults.
    pub fn new() -> Self {
        Genome {
            name: String::new(),
            time: 0.0,
            interpolation: InterpKind::Linear,
            affine_interp: AffineInterp::Log,
            palette_interp: PaletteInterp::Hsv,
            palette_mode: PaletteMode::Step,
            palette: Palette::default(),
            width: 256,
            height: 256,
            center_x: 0.0,
            center_y: 0.0,
            rotate: 0.0,
            zoom: 0.0,
            pixels_per_unit: 64.0,
            pixel_aspect_ratio: 1.0,
            quality: 10.0,
            supersample: 1,
            temporal_samples: 1,
            fuse_count: 15,
            cam_zpos: 0.0,
            cam_perspective: 0.0,
            cam_pitch: 0.0,
            cam_yaw: 0.0,
            cam_depth_blur: 0.0,
            cam_mat: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            spatial_filter_type: SpatialFilterType::Gaussian,
            spatial_filter_radius: 0.5,
            temporal_filter_type: TemporalFilterType::Box,
            temporal_filter_width: 1.0,
            temporal_filter_exp: 0.0,
            de_min_radius: 0.0,
            de_max_radius: 9.0,
            de_curve: 0.4,
            brightness: 4.0,
            gamma: 4.0,
            gamma_threshold: 0.01,
            vibrancy: 1.0,
            highlight_power: 1.0,
            background: Color::rgb(0.0, 0.0, 0.0),
            symmetry: 0,
            edit: None,
            xforms: Vec::new(),
            final_xform: None,
        }
    }

    /// The regular xforms.
    pub fn xforms(&self) -> &[Xform] {
        &self.xforms
    }

    /// The regular xforms, mutably.
    pub fn xforms_mut(&mut self) -> &mut [Xform] {
        &mut self.xforms
    }

    /// Number of regular xforms.
    pub fn xform_count(&self) -> usize {
        self.xforms.len()
    }

    /// Regular xforms plus the final one, if any.
    pub fn total_xform_count(&self) -> usize {
        self.xforms.len() + self.final_xform.iter().count()
    }

    /// Regular xforms first; index `xform_count()` is the final xform.
    pub fn xform(&self, i: usize) -> Option<&Xform> {
        if i < self.xforms.len() {
            self.xforms.get(i)
        } else if i == self.xforms.len() {
            self.final_xform.as_ref()
        } else {
            None
        }
    }

    /// Mutable form of `xform`.
    pub fn xform_mut(&mut self, i: usize) -> Option<&mut Xform> {
        if i < self.xforms.len() {
            self.xforms.get_mut(i)
        } else if i == self.xforms.len() {
            self.final_xform.as_mut()
        } else {
            None
        }
    }

    /// Appends a regular xform.
    pub fn add_xform(&mut self, xform: Xform) {
        self.xforms.push(xform);
    }

    /// Removes regular xform `i` along with its xaos column in the
    /// remaining xforms.
    pub fn delete_xform(&mut self, i: usize) -> bool {
        if i >= self.xforms.len() {
            return false;
        }
        self.xforms.remove(i);
        for xf in &mut self.xforms {
            xf.remove_xaos_column(i);
        }
        true
    }

    /// The final xform, applied after every step.
    pub fn final_xform(&self) -> Option<&Xform> {
        self.final_xform.as_ref()
    }

    /// The final xform, mutably.
    pub fn final_xform_mut(&mut self) -> Option<&mut Xform> {
        self.final_xform.as_mut()
    }

    /// Whether there is a final xform.
    pub fn has_final_xform(&self) -> bool {
        self.final_xform.is_some()
    }

    /// The final xform is never selected, so its weight is forced to 0.
    pub fn set_final_xform(&mut self, mut xform: Xform) {
        xform.weight = 0.0;
        xform.clear_xaos();
        self.final_xform = Some(xform);
    }

    /// Removes and returns the final xform.
    pub fn remove_final_xform(&mut self) -> Option<Xform> {
        self.final_xform.take()
    }

    /// Sum of regular xform weights.
    pub fn total_weight(&self) -> f64 {
        self.xforms.iter().map(|xf| xf.weight).sum()
    }

    /// Regular xform weights scaled to sum to 1, or all zero.
    pub fn normalized_weights(&self) -> Vec<f64> {
        let total = self.total_weight();
        self.xforms
            .iter()
            .map(|xf| if total > 0.0 { xf.weight / total } else { 0.0 })
            .collect()
    }

    /// Whether any xform has a non-uniform xaos row.
    pub fn xaos_present(&self) -> bool {
        self.xforms.iter().any(|xf| xf.xaos_present())
    }

    /// Resets every xaos row to uniform.
    pub fn clear_xaos(&mut self) {
        for xf in &mut self.xforms {
            xf.clear_xaos();
        }
    }

    /// `2^zoom`.
    pub fn scale(&self) -> f64 {
        self.zoom.exp2()
    }

    /// Checks what the renderer cannot work around.
    pub fn check(&self) -> Result<()> {
        if self.xforms.is_empty() {
            return Err(RenderError::InvalidGenome("no xforms".to_string()));
        }
        if !(self.total_weight() > 0.0) {
            return Err(RenderError::InvalidGenome(
                "xform weights sum to zero".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidGenome(format!(
                "empty raster {}x{}",
                self.width, self.height
            )));
        }
        if self.supersample == 0 {
            return Err(RenderError::InvalidGenome("supersample of 0".to_string()));
        }
        if !(self.quality > 0.0) || !(self.pixels_per_unit > 0.0) {
            return Err(RenderError::InvalidGenome(
                "quality and pixels per unit must be positive".to_string(),
            ));
        }
        if self.palette.len() != PALETTE_SIZE {
            return Err(RenderError::InvalidGenome(format!(
                "palette has {} entries, {} are required",
                self.palette.len(),
                PALETTE_SIZE
            )));
        }
        Ok(())
    }

    /// Adds rotational (and for negative `sym`, mirror) symmetry
    /// xforms.  `sym == 0` picks an order at random; orders 0 and 1
    /// add nothing.  Returns the number of xforms added.
    pub fn add_symmetry(&mut self, sym: i32, rng: &mut IsaacRng) -> usize {
        let mut sym = sym;
        if sym == 0 {
            sym = if rng.next_bit() {
                let i = rng.next_up_to(SYMMETRY_DISTRIBUTION.len() as u32) as usize;
                SYMMETRY_DISTRIBUTION[i]
            } else if rng.next_uint() & 31 != 0 {
                rng.next_up_to(13) as i32 - 6
            } else {
                rng.next_up_to(51) as i32 - 25
            };
        }

        if sym == 0 || sym == 1 {
            return 0;
        }

        self.symmetry = sym;
        let mut added = 0;

        if sym < 0 {
            let mut xf = symmetry_xform(1.0);
            xf.affine.set_x_axis((-1.0, 0.0));
            xf.affine.set_y_axis((0.0, 1.0));
            self.add_xform(xf);
            added += 1;
            sym = -sym;
        }

        let angle = 2.0 * PI / f64::from(sym);
        for k in 1..sym {
            let color = if sym < 3 {
                0.0
            } else {
                f64::from(k - 1) / f64::from(sym - 2)
            };
            let mut xf = symmetry_xform(color);
            let (s, c) = (f64::from(k) * angle).sin_cos();
            xf.affine.set_x_axis((round6(c), round6(s)));
            xf.affine.set_y_axis((round6(-s), round6(c)));
            self.add_xform(xf);
            added += 1;
        }

        added
    }

    /// Recomputes `cam_mat` from pitch and yaw.
    pub fn update_camera_matrix(&mut self) {
        let (sp, cp) = self.cam_pitch.sin_cos();
        let (sy, cy) = (-self.cam_yaw).sin_cos();
        self.cam_mat[0][0] = cy;
        self.cam_mat[1][0] = -sy;
        self.cam_mat[2][0] = 0.0;
        self.cam_mat[0][1] = cp * sy;
        self.cam_mat[1][1] = cp * cy;
        self.cam_mat[2][1] = -sp;
        self.cam_mat[0][2] = sp * sy;
        self.cam_mat[1][2] = sp * cy;
        self.cam_mat[2][2] = cp;
    }

    /// The cheapest projection that honours the camera settings.
    pub fn projection_kind(&self) -> ProjectionKind {
        if self.cam_zpos == 0.0
            && self.cam_perspective == 0.0
            && self.cam_pitch == 0.0
            && self.cam_yaw == 0.0
            && self.cam_depth_blur == 0.0
        {
            ProjectionKind::None
        } else if self.cam_depth_blur != 0.0 {
            if self.cam_yaw != 0.0 {
                ProjectionKind::PitchYawDepthBlur
            } else {
                ProjectionKind::PitchDepthBlur
            }
        } else if self.cam_pitch != 0.0 || self.cam_yaw != 0.0 {
            if self.cam_yaw != 0.0 {
                ProjectionKind::PitchYaw
            } else {
                ProjectionKind::Pitch
            }
        } else {
            ProjectionKind::ZPerspective
        }
    }

    /// Rotates the linear part of every animated regular xform.
    pub fn rotate_affines(&mut self, degrees: f64) {
        for xf in self.xforms.iter_mut().filter(|xf| xf.animate > 0.0) {
            xf.affine.rotate(degrees);
        }
    }

    /// A copy with every xform's motion elements applied at `blend`.
    pub fn with_motion(&self, blend: f64) -> Genome {
        let mut g = self.clone();
        for (dst, src) in g.xforms.iter_mut().zip(self.xforms.iter()) {
            *dst = src.with_motion(blend);
        }
        if let Some(ref src) = self.final_xform {
            g.final_xform = Some(src.with_motion(blend));
        }
        g
    }

    /// One line describing the genome, used in image comments.
    pub fn summary(&self) -> String {
        let describe = |xf: &Xform| {
            xf.variations()
                .iter()
                .map(|v| format!("{} {}", v.full_name(), v.weight))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut parts: Vec<String> = self
            .xforms
            .iter()
            .map(|xf| format!("[w {} {}]", xf.weight, describe(xf)))
            .collect();
        if let Some(ref f) = self.final_xform {
            parts.push(format!("[final {}]", describe(f)));
        }
        format!(
            "{} {}x{} t {} q {} ss {} {}",
            if self.name.is_empty() { "flame" } else { self.name.as_str() },
            self.width,
            self.height,
            self.time,
            self.quality,
            self.supersample,
            parts.join(" ")
        )
    }
}

fn symmetry_xform(color: f64) -> Xform {
    let mut xf = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
    xf.weight = 1.0;
    xf.color_speed = 0.0;
    xf.animate = 0.0;
    xf.color_x = color;
    xf
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "flame \"{}\" time {} size {}x{} center ({}, {}) zoom {} rotate {}",
            self.name,
            self.time,
            self.width,
            self.height,
            self.center_x,
            self.center_y,
            self.zoom,
            self.rotate
        )?;
        let finals = self.final_xform.iter().map(|xf| ("final", xf));
        for (label, xf) in self.xforms.iter().map(|xf| ("xform", xf)).chain(finals) {
            let a = &xf.affine;
            write!(
                f,
                "  {} weight {} color {} speed {} coefs [{} {} {} {} {} {}]",
                label, xf.weight, xf.color_x, xf.color_speed, a.a, a.d, a.b, a.e, a.c, a.f
            )?;
            for v in xf.variations() {
                write!(f, " {}={}", v.full_name(), v.weight)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
