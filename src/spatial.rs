// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spatial filters for the final downsampling pass.
//!
//! Every filter type is a plain one-argument response function plus
//! the support (half-width) over which it is non-zero.  A kernel is
//! built by sampling the separable product `response(x) *
//! response(y)` over a square sized from the filter radius and the
//! supersample factor, then normalized to sum to 1.

use crate::error::{RenderError, Result};
use itertools::iproduct;
use std::f64::consts::PI;

/// How often a kernel that fails to normalize is retried with a
/// slightly larger radius.
const MAX_ATTEMPTS: usize = 100;
const RADIUS_STEP: f64 = 0.01;

/// Kernel shapes for the final resampling.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpatialFilterType {
    /// Gaussian, cut at 1.5 sigma.
    Gaussian,
    /// Hermite cubic.
    Hermite,
    /// Box.
    Box,
    /// Triangle.
    Triangle,
    /// Bell.
    Bell,
    /// Cubic B-spline.
    BSpline,
    /// Lanczos, three lobes.
    Lanczos3,
    /// Lanczos, two lobes.
    Lanczos2,
    /// Mitchell-Netravali.
    Mitchell,
    /// Blackman window.
    Blackman,
    /// Catmull-Rom.
    Catrom,
    /// Hamming window.
    Hamming,
    /// Hanning window.
    Hanning,
    /// Quadratic.
    Quadratic,
}

impl SpatialFilterType {
    /// Every kernel, in file order.
    pub const ALL: [SpatialFilterType; 14] = [
        SpatialFilterType::Gaussian,
        SpatialFilterType::Hermite,
        SpatialFilterType::Box,
        SpatialFilterType::Triangle,
        SpatialFilterType::Bell,
        SpatialFilterType::BSpline,
        SpatialFilterType::Lanczos3,
        SpatialFilterType::Lanczos2,
        SpatialFilterType::Mitchell,
        SpatialFilterType::Blackman,
        SpatialFilterType::Catrom,
        SpatialFilterType::Hamming,
        SpatialFilterType::Hanning,
        SpatialFilterType::Quadratic,
    ];

    /// Lower-case name used in flame files.
    pub fn name(self) -> &'static str {
        match self {
            SpatialFilterType::Gaussian => "gaussian",
            SpatialFilterType::Hermite => "hermite",
            SpatialFilterType::Box => "box",
            SpatialFilterType::Triangle => "triangle",
            SpatialFilterType::Bell => "bell",
            SpatialFilterType::BSpline => "bspline",
            SpatialFilterType::Lanczos3 => "lanczos3",
            SpatialFilterType::Lanczos2 => "lanczos2",
            SpatialFilterType::Mitchell => "mitchell",
            SpatialFilterType::Blackman => "blackman",
            SpatialFilterType::Catrom => "catrom",
            SpatialFilterType::Hamming => "hamming",
            SpatialFilterType::Hanning => "hanning",
            SpatialFilterType::Quadratic => "quadratic",
        }
    }

    /// Inverse of `name`.
    pub fn from_name(name: &str) -> Option<SpatialFilterType> {
        SpatialFilterType::ALL
            .iter()
            .cloned()
            .find(|kind| kind.name() == name)
    }

    /// Half-width of the region where the response is non-zero.
    pub fn support(self) -> f64 {
        match self {
            SpatialFilterType::Gaussian => 1.5,
            SpatialFilterType::Hermite => 1.0,
            SpatialFilterType::Box => 0.5,
            SpatialFilterType::Triangle => 1.0,
            SpatialFilterType::Bell => 1.5,
            SpatialFilterType::BSpline => 2.0,
            SpatialFilterType::Lanczos3 => 3.0,
            SpatialFilterType::Lanczos2 => 2.0,
            SpatialFilterType::Mitchell => 2.0,
            SpatialFilterType::Blackman => 1.0,
            SpatialFilterType::Catrom => 2.0,
            SpatialFilterType::Hamming => 1.0,
            SpatialFilterType::Hanning => 1.0,
            SpatialFilterType::Quadratic => 1.5,
        }
    }

    /// The one-dimensional response function.
    pub fn response(self) -> fn(f64) -> f64 {
        match self {
            SpatialFilterType::Gaussian => gaussian,
            SpatialFilterType::Hermite => hermite,
            SpatialFilterType::Box => box_filter,
            SpatialFilterType::Triangle => triangle,
            SpatialFilterType::Bell => bell,
            SpatialFilterType::BSpline => bspline,
            SpatialFilterType::Lanczos3 => lanczos3,
            SpatialFilterType::Lanczos2 => lanczos2,
            SpatialFilterType::Mitchell => mitchell,
            SpatialFilterType::Blackman => blackman,
            SpatialFilterType::Catrom => catrom,
            SpatialFilterType::Hamming => hamming,
            SpatialFilterType::Hanning => hanning,
            SpatialFilterType::Quadratic => quadratic,
        }
    }
}

/// Unit-width gaussian used by the gaussian kernels.
pub fn gaussian(x: f64) -> f64 {
    (-2.0 * x * x).exp() * (2.0 / PI).sqrt()
}

fn hermite(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        (2.0 * t - 3.0) * t * t + 1.0
    } else {
        0.0
    }
}

fn box_filter(t: f64) -> f64 {
    if t > -0.5 && t <= 0.5 {
        1.0
    } else {
        0.0
    }
}

fn triangle(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        1.0 - t
    } else {
        0.0
    }
}

fn bell(t: f64) -> f64 {
    let t = t.abs();
    if t < 0.5 {
        0.75 - t * t
    } else if t < 1.5 {
        let t = t - 1.5;
        0.5 * t * t
    } else {
        0.0
    }
}

fn bspline(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        let tt = t * t;
        0.5 * tt * t - tt + 2.0 / 3.0
    } else if t < 2.0 {
        let t = 2.0 - t;
        t * t * t / 6.0
    } else {
        0.0
    }
}

fn sinc(x: f64) -> f64 {
    let x = x * PI;
    if x != 0.0 {
        x.sin() / x
    } else {
        1.0
    }
}

fn lanczos3(t: f64) -> f64 {
    let t = t.abs();
    if t < 3.0 {
        sinc(t) * sinc(t / 3.0)
    } else {
        0.0
    }
}

fn lanczos2(t: f64) -> f64 {
    let t = t.abs();
    if t < 2.0 {
        sinc(t) * sinc(t / 2.0)
    } else {
        0.0
    }
}

fn mitchell(t: f64) -> f64 {
    const B: f64 = 1.0 / 3.0;
    const C: f64 = 1.0 / 3.0;
    let t = t.abs();
    let tt = t * t;
    if t < 1.0 {
        ((12.0 - 9.0 * B - 6.0 * C) * (t * tt)
            + (-18.0 + 12.0 * B + 6.0 * C) * tt
            + (6.0 - 2.0 * B))
            / 6.0
    } else if t < 2.0 {
        ((-B - 6.0 * C) * (t * tt)
            + (6.0 * B + 30.0 * C) * tt
            + (-12.0 * B - 48.0 * C) * t
            + (8.0 * B + 24.0 * C))
            / 6.0
    } else {
        0.0
    }
}

fn blackman(x: f64) -> f64 {
    0.42 + 0.5 * (PI * x).cos() + 0.08 * (2.0 * PI * x).cos()
}

fn catrom(x: f64) -> f64 {
    if x < -2.0 {
        0.0
    } else if x < -1.0 {
        0.5 * (4.0 + x * (8.0 + x * (5.0 + x)))
    } else if x < 0.0 {
        0.5 * (2.0 + x * x * (-5.0 - 3.0 * x))
    } else if x < 1.0 {
        0.5 * (2.0 + x * x * (-5.0 + 3.0 * x))
    } else if x < 2.0 {
        0.5 * (4.0 + x * (-8.0 + x * (5.0 - x)))
    } else {
        0.0
    }
}

fn hamming(x: f64) -> f64 {
    0.54 + 0.46 * (PI * x).cos()
}

fn hanning(x: f64) -> f64 {
    0.5 + 0.5 * (PI * x).cos()
}

fn quadratic(x: f64) -> f64 {
    if x < -1.5 {
        0.0
    } else if x < -0.5 {
        0.5 * (x + 1.5) * (x + 1.5)
    } else if x < 0.5 {
        0.75 - x * x
    } else if x < 1.5 {
        0.5 * (x - 1.5) * (x - 1.5)
    } else {
        0.0
    }
}

/// A normalized square kernel, `width` cells on a side, stored row
/// by row.
#[derive(Clone, Debug)]
pub struct SpatialFilter {
    /// Kernel shape.
    pub kind: SpatialFilterType,
    /// The radius the kernel was finally built with.
    pub radius: f64,
    /// Histogram cells per output pixel, on each axis.
    pub supersample: usize,
    /// Width over height of one pixel.
    pub pixel_aspect: f64,
    width: usize,
    kernel: Vec<f64>,
}

impl SpatialFilter {
    /// Builds the kernel, growing `radius` until it normalizes.
    pub fn new(
        kind: SpatialFilterType,
        radius: f64,
        supersample: usize,
        pixel_aspect: f64,
    ) -> Result<SpatialFilter> {
        let supersample = supersample.max(1);
        let mut radius = radius.max(0.0);
        for attempt in 0..MAX_ATTEMPTS {
            if let Some((width, kernel)) = build(kind, radius, supersample, pixel_aspect) {
                if attempt > 0 {
                    warn!(
                        "{} filter grown to radius {} before it normalized",
                        kind.name(),
                        radius
                    );
                }
                debug!(
                    "{} spatial filter: radius {}, {} cells wide",
                    kind.name(),
                    radius,
                    width
                );
                return Ok(SpatialFilter {
                    kind,
                    radius,
                    supersample,
                    pixel_aspect,
                    width,
                    kernel,
                });
            }
            radius += RADIUS_STEP;
        }
        Err(RenderError::SpatialFilter(MAX_ATTEMPTS))
    }

    /// Cells on a side.  Has the same parity as the supersample.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Histogram cells the kernel reaches past the supersampled image
    /// on each side.
    pub fn gutter(&self) -> usize {
        (self.width - self.supersample) / 2
    }

    /// Weights row by row.
    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    /// Weight at one cell.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> f64 {
        self.kernel[row * self.width + col]
    }
}

fn build(
    kind: SpatialFilterType,
    radius: f64,
    supersample: usize,
    aspect: f64,
) -> Option<(usize, Vec<f64>)> {
    let support = kind.support();
    let fw = 2.0 * support * supersample as f64 * radius / aspect;
    let mut width = fw as usize + 1;
    if (width ^ supersample) & 1 != 0 {
        width += 1;
    }
    let adjust = if fw > 0.0 {
        support * width as f64 / fw
    } else {
        1.0
    };

    let response = kind.response();
    let coord = |i: usize| ((2.0 * i as f64 + 1.0) / width as f64 - 1.0) * adjust;
    let mut kernel: Vec<f64> = iproduct!(0..width, 0..width)
        .map(|(row, col)| response(coord(col)) * response(coord(row) / aspect))
        .collect();

    let total: f64 = kernel.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    for k in &mut kernel {
        *k /= total;
    }
    Some((width, kernel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kernel_sums_to_one() {
        for kind in SpatialFilterType::ALL.iter() {
            for radius in &[0.1, 0.5, 1.0, 2.25] {
                for ss in 1..4 {
                    let f = SpatialFilter::new(*kind, *radius, ss, 1.0).unwrap();
                    let sum: f64 = f.kernel().iter().sum();
                    assert!((sum - 1.0).abs() < 1e-6, "{:?} r {} ss {}", kind, radius, ss);
                }
            }
        }
    }

    #[test]
    fn width_shares_parity_with_supersample() {
        for ss in 1..5 {
            let f = SpatialFilter::new(SpatialFilterType::Gaussian, 0.7, ss, 1.0).unwrap();
            assert_eq!(f.width() % 2, ss % 2);
            assert!(f.width() >= ss);
            assert_eq!(f.kernel().len(), f.width() * f.width());
        }
    }

    #[test]
    fn kernel_is_symmetric() {
        let f = SpatialFilter::new(SpatialFilterType::Mitchell, 1.0, 2, 1.0).unwrap();
        let w = f.width();
        for row in 0..w {
            for col in 0..w {
                assert!((f.get(col, row) - f.get(w - 1 - col, w - 1 - row)).abs() < 1e-12);
                assert!((f.get(col, row) - f.get(row, col)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn gaussian_peak_and_tail() {
        assert!((gaussian(0.0) - (2.0 / PI).sqrt()).abs() < 1e-12);
        assert!(gaussian(1.5) < 0.02);
        assert_eq!(box_filter(0.5), 1.0);
        assert_eq!(box_filter(-0.5), 0.0);
    }

    #[test]
    fn names_round_trip() {
        for kind in SpatialFilterType::ALL.iter() {
            assert_eq!(SpatialFilterType::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(SpatialFilterType::from_name("nope"), None);
    }

    #[test]
    fn gutter_is_half_the_overhang() {
        let f = SpatialFilter::new(SpatialFilterType::Gaussian, 1.0, 1, 1.0).unwrap();
        // fw = 3, width 4 bumped to 5
        assert_eq!(f.width(), 5);
        assert_eq!(f.gutter(), 2);
    }
}
