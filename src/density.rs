// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Log scaling and density estimation.
//!
//! Every histogram cell is scaled by `k1 * ln(1 + a * k2) / a`, where
//! `a` is the cell's accumulated hit weight.  With density estimation
//! enabled the scaled cell is additionally spread over a gaussian disc
//! whose radius shrinks as the local density grows: lonely cells get
//! up to `max_radius` of blur, well-sampled ones next to none.
//!
//! Both passes run over row bands on scoped threads.  The density
//! pass scatters into a private buffer per band (the band plus the
//! widest kernel's reach above and below) and the buffers are summed
//! in band order, so the result does not depend on scheduling.

use crate::accum::{alloc_buckets, row_bands, rows_per_band, Bucket};
use crate::error::{RenderError, Result};
use crate::genome::Genome;
use crate::spatial::{gaussian, SpatialFilterType};

/// Densities up to this many hits get a filter each.
pub const DE_THRESH: usize = 100;
/// Refuse to build more kernels than this.
pub const MAX_FILTERS: f64 = 1e7;

/// The log-scale constants for one frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LogScale {
    /// Brightness scale.
    pub k1: f64,
    /// Converts hit counts to iterations per unit area.
    pub k2: f64,
}

impl LogScale {
    /// `area` is the visible area in square units; `quality` the
    /// iterations done so far per output pixel.
    pub fn new(brightness: f64, supersample: usize, area: f64, quality: f64, sum_filt: f64) -> Self {
        let k1 = brightness * 268.0 / 256.0;
        let denom = area * quality * sum_filt;
        let ss = supersample as f64;
        let k2 = if denom > 0.0 { ss * ss / denom } else { 0.0 };
        LogScale { k1, k2 }
    }

    /// Log-scaled multiplier for a cell with `a` hits.
    #[inline]
    pub fn factor(&self, a: f64) -> f64 {
        if a > 0.0 {
            self.k1 * (1.0 + a * self.k2).ln() / a
        } else {
            0.0
        }
    }
}

/// Log scales every cell without any blur.
pub fn apply_log_scale(src: &[Bucket], width: usize, scale: LogScale, threads: usize) -> Result<Vec<Bucket>> {
    let mut out = alloc_buckets(src.len(), "log-scaled histogram")?;
    if out.is_empty() || width == 0 {
        return Ok(out);
    }
    let per = rows_per_band(src.len() / width, threads) * width;

    crossbeam::scope(|s| {
        for (dst, from) in out.chunks_mut(per).zip(src.chunks(per)) {
            s.spawn(move |_| {
                for (d, b) in dst.iter_mut().zip(from.iter()) {
                    *d = b.scaled(scale.factor(b.a));
                }
            });
        }
    })
    .map_err(|_| RenderError::WorkerPanic)?;

    Ok(out)
}

#[derive(Clone, Debug)]
struct Kernel {
    /// Cells reached on each side of the centre.
    half: usize,
    /// `(2 * half + 1)^2` weights, row by row, summing to 1.
    coefs: Vec<f64>,
}

impl Kernel {
    fn new(radius: f64) -> Kernel {
        let half = radius.ceil() as usize;
        let side = 2 * half + 1;
        let support = SpatialFilterType::Gaussian.support();
        let mut coefs = Vec::with_capacity(side * side);
        for dy in 0..side {
            for dx in 0..side {
                let (fx, fy) = (dx as f64 - half as f64, dy as f64 - half as f64);
                let d = (fx * fx + fy * fy).sqrt() / radius;
                coefs.push(if d <= 1.0 { gaussian(support * d) } else { 0.0 });
            }
        }
        let total: f64 = coefs.iter().sum();
        for c in &mut coefs {
            *c /= total;
        }
        Kernel { half, coefs }
    }
}

/// The family of density-estimation kernels for one genome.
#[derive(Clone, Debug)]
pub struct DensityFilter {
    /// Kernel radius for the densest cells.
    pub min_radius: f64,
    /// Kernel radius for single hits.
    pub max_radius: f64,
    /// How quickly the radius falls with density.
    pub curve: f64,
    /// Histogram cells per output pixel, on each axis.
    pub supersample: usize,
    widths: Vec<f64>,
    kernels: Vec<Kernel>,
}

impl DensityFilter {
    /// Whether the genome asks for density estimation at all.
    pub fn enabled(genome: &Genome) -> bool {
        genome.de_max_radius > 0.0
            && genome.de_min_radius >= 0.0
            && genome.de_min_radius <= genome.de_max_radius
            && genome.de_curve > 0.0
    }

    /// Builds the kernels the genome's `de_*` fields describe.
    pub fn from_genome(genome: &Genome) -> Result<DensityFilter> {
        DensityFilter::new(
            genome.de_min_radius,
            genome.de_max_radius,
            genome.de_curve,
            genome.supersample,
        )
    }

    /// Radii are in output pixels; the kernels work in supersampled
    /// cells, one cell wider than `radius * supersample`.
    pub fn new(min_radius: f64, max_radius: f64, curve: f64, supersample: usize) -> Result<DensityFilter> {
        let ss = supersample.max(1) as f64;
        let comp_max = max_radius.max(0.0) * ss + 1.0;
        let comp_min = min_radius.max(0.0) * ss + 1.0;
        let wanted = (comp_max / comp_min).powf(1.0 / curve);
        if !(wanted <= MAX_FILTERS) {
            return Err(RenderError::DensityFilter(if wanted.is_finite() {
                wanted as usize
            } else {
                usize::max_value()
            }));
        }

        let count = wanted.ceil() as usize;
        let max_index = if count > DE_THRESH {
            (DE_THRESH as f64 + ((count - DE_THRESH) as f64).powf(curve)).ceil() as usize + 1
        } else {
            count
        };

        let mut widths = Vec::new();
        for idx in 0..max_index.max(1) {
            let height = if idx < DE_THRESH {
                comp_max / ((idx + 1) as f64).powf(curve)
            } else {
                let adj = ((idx - DE_THRESH) as f64).powf(1.0 / curve) + DE_THRESH as f64;
                comp_max / (adj + 1.0).powf(curve)
            };
            if height <= comp_min && !widths.is_empty() {
                break;
            }
            widths.push(height.max(comp_min));
        }

        let kernels: Vec<Kernel> = widths.iter().map(|w| Kernel::new(*w)).collect();
        debug!(
            "density filter: {} kernels, radius {} down to {} cells",
            kernels.len(),
            widths.first().cloned().unwrap_or(0.0),
            widths.last().cloned().unwrap_or(0.0)
        );

        Ok(DensityFilter {
            min_radius,
            max_radius,
            curve,
            supersample: supersample.max(1),
            widths,
            kernels,
        })
    }

    /// Number of kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether there are no kernels.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Blur radius in cells of kernel `i`.
    pub fn filter_width(&self, i: usize) -> f64 {
        self.widths[i]
    }

    /// Cells the widest kernel reaches past its centre.
    pub fn max_reach(&self) -> usize {
        self.kernels.iter().map(|k| k.half).max().unwrap_or(0)
    }

    /// The kernel for a cell whose neighbourhood averages `density` hits.
    pub fn filter_index(&self, density: f64) -> usize {
        let idx = if density <= DE_THRESH as f64 {
            (density.ceil() as usize).saturating_sub(1)
        } else {
            DE_THRESH + (density - DE_THRESH as f64).powf(self.curve).floor() as usize
        };
        idx.min(self.kernels.len().saturating_sub(1))
    }

    /// Mean hit weight of the supersample block starting at `(x, y)`.
    fn block_density(&self, src: &[Bucket], width: usize, height: usize, x: usize, y: usize) -> f64 {
        let ss = self.supersample;
        let mut sum = 0.0;
        for yy in y..(y + ss).min(height) {
            for xx in x..(x + ss).min(width) {
                sum += src[yy * width + xx].a;
            }
        }
        sum / (ss * ss) as f64
    }

    /// Scatters the log-scaled cells of rows `lo..hi` into `dst`,
    /// which covers rows `dst_lo..` of the full grid.
    fn scatter_band(
        &self,
        src: &[Bucket],
        width: usize,
        height: usize,
        (lo, hi): (usize, usize),
        dst_lo: usize,
        dst: &mut [Bucket],
        scale: LogScale,
    ) {
        let dst_rows = dst.len() / width;
        for y in lo..hi {
            for x in 0..width {
                let cell = &src[y * width + x];
                if cell.a <= 0.0 {
                    continue;
                }
                let value = cell.scaled(scale.factor(cell.a));
                let density = self.block_density(src, width, height, x, y);
                let kernel = &self.kernels[self.filter_index(density)];
                let half = kernel.half;
                let side = 2 * half + 1;

                let y0 = y.saturating_sub(half);
                let y1 = (y + half + 1).min(height);
                let x0 = x.saturating_sub(half);
                let x1 = (x + half + 1).min(width);
                for ty in y0..y1 {
                    let row = ty - dst_lo;
                    if row >= dst_rows {
                        continue;
                    }
                    let krow = (ty + half - y) * side;
                    for tx in x0..x1 {
                        let k = kernel.coefs[krow + tx + half - x];
                        if k != 0.0 {
                            dst[row * width + tx].add_scaled(&value, k);
                        }
                    }
                }
            }
        }
    }

    /// Log scales and blurs the `width * height` grid `src`.
    pub fn apply(
        &self,
        src: &[Bucket],
        width: usize,
        height: usize,
        scale: LogScale,
        threads: usize,
    ) -> Result<Vec<Bucket>> {
        let mut out = alloc_buckets(src.len(), "density-filtered histogram")?;
        if out.is_empty() || width == 0 {
            return Ok(out);
        }

        let reach = self.max_reach();
        let bands = row_bands(height, threads);
        let mut spans = Vec::with_capacity(bands.len());
        let mut buffers = Vec::with_capacity(bands.len());
        for &(lo, hi) in &bands {
            let dst_lo = lo.saturating_sub(reach);
            let dst_hi = (hi + reach).min(height);
            spans.push(dst_lo);
            buffers.push(alloc_buckets((dst_hi - dst_lo) * width, "density band")?);
        }

        crossbeam::scope(|s| {
            for ((band, dst_lo), dst) in bands.iter().zip(spans.iter()).zip(buffers.iter_mut()) {
                let (band, dst_lo) = (*band, *dst_lo);
                s.spawn(move |_| self.scatter_band(src, width, height, band, dst_lo, dst, scale));
            }
        })
        .map_err(|_| RenderError::WorkerPanic)?;

        for (dst_lo, buffer) in spans.iter().zip(buffers.iter()) {
            let start = dst_lo * width;
            for (o, b) in out[start..start + buffer.len()].iter_mut().zip(buffer.iter()) {
                o.add_scaled(b, 1.0);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_scale_constants() {
        let ls = LogScale::new(4.0, 2, 16.0, 10.0, 0.5);
        assert_eq!(ls.k1, 4.0 * 268.0 / 256.0);
        assert_eq!(ls.k2, 4.0 / 80.0);
        assert_eq!(ls.factor(0.0), 0.0);
        assert!((ls.factor(2.0) - ls.k1 * (1.1f64).ln() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn kernels_shrink_and_sum_to_one() {
        let de = DensityFilter::new(0.0, 9.0, 0.4, 1).unwrap();
        assert!(de.len() > 1);
        assert_eq!(de.filter_width(0), 10.0);
        for i in 1..de.len() {
            assert!(de.filter_width(i) <= de.filter_width(i - 1));
        }
        for k in &de.kernels {
            let sum: f64 = k.coefs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn too_many_filters_is_an_error() {
        assert!(DensityFilter::new(0.0, 1e6, 0.05, 4).is_err());
    }

    #[test]
    fn filter_index_clamps() {
        let de = DensityFilter::new(0.0, 9.0, 0.4, 1).unwrap();
        assert_eq!(de.filter_index(0.5), 0);
        assert_eq!(de.filter_index(1.0), 0);
        assert_eq!(de.filter_index(3.0), 2);
        assert_eq!(de.filter_index(1e12), de.len() - 1);
    }

    #[test]
    fn equal_radii_give_one_kernel() {
        let de = DensityFilter::new(2.0, 2.0, 0.4, 1).unwrap();
        assert_eq!(de.len(), 1);
    }

    #[test]
    fn scatter_conserves_energy_away_from_edges() {
        let de = DensityFilter::new(0.0, 2.0, 0.4, 1).unwrap();
        let (w, h) = (15, 15);
        let mut src = vec![Bucket::default(); w * h];
        src[7 * w + 7] = Bucket::new(1.0, 1.0, 1.0, 1.0);
        let scale = LogScale { k1: 1.0, k2: 1.0 };
        let out = de.apply(&src, w, h, scale, 3).unwrap();
        let total: f64 = out.iter().map(|b| b.a).sum();
        assert!((total - scale.factor(1.0)).abs() < 1e-9);
        assert!(out[7 * w + 7].a < scale.factor(1.0));
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let de = DensityFilter::new(0.0, 3.0, 0.4, 1).unwrap();
        let (w, h) = (12, 10);
        let src: Vec<Bucket> = (0..w * h)
            .map(|i| {
                let v = ((i * 37) % 11) as f64;
                Bucket::new(v, v * 0.5, 0.0, v)
            })
            .collect();
        let scale = LogScale { k1: 2.0, k2: 0.3 };
        let one = de.apply(&src, w, h, scale, 1).unwrap();
        let four = de.apply(&src, w, h, scale, 4).unwrap();
        for (a, b) in one.iter().zip(four.iter()) {
            assert!((a.r - b.r).abs() < 1e-12 && (a.a - b.a).abs() < 1e-12);
        }
    }

    #[test]
    fn plain_log_scale_matches_factor() {
        let src = vec![Bucket::new(2.0, 1.0, 0.0, 4.0); 6];
        let scale = LogScale { k1: 1.0, k2: 0.5 };
        let out = apply_log_scale(&src, 3, scale, 2).unwrap();
        let f = scale.factor(4.0);
        assert!(out.iter().all(|b| (b.a - 4.0 * f).abs() < 1e-12));
    }
}
