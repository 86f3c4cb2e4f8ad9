// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes the relationship
//! between the supersampled histogram (an integral plane with its
//! origin at 0,0) and the rectangle of the cartesian plane the
//! camera sees.  The rectangle is centred on the genome's centre,
//! sized by its pixels-per-unit and zoom, grown by a gutter wide
//! enough for the spatial filter, and rotated about its centre.
use crate::error::{RenderError, Result};
use crate::genome::Genome;
use num::Complex;

/// Width and height of the histogram, in cells.  The lower-left
/// corner is always 0,0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// The lower-left and upper-right corners of the visible region of
/// the cartesian plane, as complex numbers (x real, y imaginary).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComplexPlane(pub Complex<f64>, pub Complex<f64>);

/// Maps flame coordinates to histogram cells.
#[derive(Clone, Debug)]
pub struct PlaneMapper {
    /// Histogram size in cells, gutter included.
    pub integral_plane: IntegralPlane,
    /// Flame-space corners the histogram covers.
    pub complex_plane: ComplexPlane,
    /// Cells per unit, horizontally and vertically.
    grid_factors: (f64, f64),
    center: Complex<f64>,
    /// `exp(-i * rotate)`, or None when the camera is not rotated.
    rotation: Option<Complex<f64>>,
    /// Extra cells on every side for the spatial filter to read.
    pub gutter: usize,
    /// Cells per output pixel, on each axis.
    pub supersample: usize,
    /// Pixels per unit after zoom, in final image pixels.
    pub pixels_per_unit: f64,
}

impl PlaneMapper {
    /// Builds the mapping for `genome`, reserving `gutter` cells
    /// around the supersampled image.
    pub fn new(genome: &Genome, gutter: usize) -> Result<PlaneMapper> {
        let ss = genome.supersample;
        let ppu = genome.pixels_per_unit * genome.scale();
        if ss == 0 || !(ppu > 0.0) || !ppu.is_finite() {
            return Err(RenderError::InvalidGenome(format!(
                "cannot map a camera with supersample {} and {} pixels per unit",
                ss, ppu
            )));
        }

        let width = genome.width * ss + 2 * gutter;
        let height = genome.height * ss + 2 * gutter;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidGenome("empty raster".to_string()));
        }

        let t = gutter as f64 / (ss as f64 * ppu);
        let center = Complex::new(genome.center_x, genome.center_y);
        let half = Complex::new(
            genome.width as f64 / (2.0 * ppu) + t,
            genome.height as f64 / (2.0 * ppu) + t,
        );
        let leftlower = center - half;
        let rightupper = center + half;

        let grid_factors = (
            width as f64 / (rightupper.re - leftlower.re),
            height as f64 / (rightupper.im - leftlower.im),
        );

        let rotation = if genome.rotate != 0.0 {
            Some(Complex::from_polar(&1.0, &(-genome.rotate.to_radians())))
        } else {
            None
        };

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            complex_plane: ComplexPlane(leftlower, rightupper),
            grid_factors,
            center,
            rotation,
            gutter,
            supersample: ss,
            pixels_per_unit: ppu,
        })
    }

    /// The total number of cells in the histogram.
    pub fn len(&self) -> usize {
        self.integral_plane.0 * self.integral_plane.1
    }

    /// Whether the histogram has no cells.
    pub fn is_empty(&self) -> bool {
        self.integral_plane.0 == 0 || self.integral_plane.1 == 0
    }

    /// Visible area in square units, gutter excluded.
    pub fn area(&self, width: usize, height: usize) -> f64 {
        (width * height) as f64 / (self.pixels_per_unit * self.pixels_per_unit)
    }

    #[inline]
    fn unrotate(&self, point: Complex<f64>) -> Complex<f64> {
        match self.rotation {
            Some(r) => (point - self.center) * r + self.center,
            None => point,
        }
    }

    /// Maps a cartesian point to the linear offset of its histogram
    /// cell, or None when the camera does not see it.
    #[inline]
    pub fn point_to_offset(&self, x: f64, y: f64) -> Option<usize> {
        let p = self.unrotate(Complex::new(x, y));
        let left = (p.re - self.complex_plane.0.re) * self.grid_factors.0;
        let top = (p.im - self.complex_plane.0.im) * self.grid_factors.1;
        if !(left >= 0.0)
            || left >= (self.integral_plane.0 as f64)
            || !(top >= 0.0)
            || top >= (self.integral_plane.1 as f64)
        {
            return None;
        }
        Some((top as usize) * self.integral_plane.0 + (left as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome(width: usize, height: usize, ppu: f64) -> Genome {
        let mut g = Genome::new();
        g.width = width;
        g.height = height;
        g.pixels_per_unit = ppu;
        g
    }

    #[test]
    fn planemapper_fails_on_bad_scale() {
        assert!(PlaneMapper::new(&genome(4, 4, 0.0), 0).is_err());
        let mut g = genome(4, 4, 1.0);
        g.supersample = 0;
        assert!(PlaneMapper::new(&g, 0).is_err());
    }

    #[test]
    fn bounds_follow_center_and_ppu() {
        let mut g = genome(4, 4, 1.0);
        g.center_x = 1.0;
        let pm = PlaneMapper::new(&g, 0).unwrap();
        assert_eq!(pm.complex_plane.0, Complex::new(-1.0, -2.0));
        assert_eq!(pm.complex_plane.1, Complex::new(3.0, 2.0));
        assert_eq!(pm.len(), 16);
    }

    #[test]
    fn zoom_doubles_pixels_per_unit() {
        let mut g = genome(4, 4, 1.0);
        g.zoom = 1.0;
        let pm = PlaneMapper::new(&g, 0).unwrap();
        assert_eq!(pm.pixels_per_unit, 2.0);
        assert_eq!(pm.complex_plane.1, Complex::new(1.0, 1.0));
    }

    #[test]
    fn gutter_extends_the_raster() {
        let mut g = genome(4, 4, 1.0);
        g.supersample = 2;
        let pm = PlaneMapper::new(&g, 1).unwrap();
        assert_eq!(pm.integral_plane, IntegralPlane(10, 10));
        assert_eq!(pm.complex_plane.0, Complex::new(-2.5, -2.5));
        assert_eq!(pm.point_to_offset(-2.4, -2.4), Some(0));
        assert_eq!(pm.area(4, 4), 16.0);
    }

    #[test]
    fn point_to_offset_on_mixed_planes() {
        let pm = PlaneMapper::new(&genome(4, 4, 1.0), 0).unwrap();
        assert_eq!(pm.point_to_offset(0.0, 0.0), Some(2 * 4 + 2));
        assert_eq!(pm.point_to_offset(-2.0, -2.0), Some(0));
        assert_eq!(pm.point_to_offset(1.5, -1.5), Some(3));
        assert_eq!(pm.point_to_offset(2.0, 0.0), None);
        assert_eq!(pm.point_to_offset(std::f64::NAN, 0.0), None);
    }

    #[test]
    fn rotation_turns_about_the_center() {
        let mut g = genome(4, 4, 1.0);
        g.rotate = 90.0;
        let pm = PlaneMapper::new(&g, 0).unwrap();
        // (1.5, 0.5) turned by -90 degrees lands at (0.5, -1.5).
        let unrotated = PlaneMapper::new(&genome(4, 4, 1.0), 0).unwrap();
        assert_eq!(pm.point_to_offset(1.5, 0.5), unrotated.point_to_offset(0.5, -1.5));
    }
}
