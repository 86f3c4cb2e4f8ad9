// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The histogram and the passes that turn it into pixels.
//!
//! Samples are binned into a supersampled grid of RGBA accumulators.
//! After log scaling (see `density`), `downsample` convolves the grid
//! with the spatial filter down to the output size and
//! `write_image` applies gamma, vibrancy, highlight power and the
//! background before writing bytes.

use crate::error::{RenderError, Result};
use crate::genome::Genome;
use crate::iterator::Point;
use crate::palette::{hsv_to_rgb, rgb_to_hsv, Color, Palette, PaletteMode};
use crate::planes::PlaneMapper;
use crate::spatial::SpatialFilter;
use num::clamp;
use std::mem::size_of;

/// One histogram cell: color sums weighted by hit count, with the count in `a`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bucket {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Hits, or alpha once log scaled.
    pub a: f64,
}

impl Bucket {
    /// A bucket from its components.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Bucket { r, g, b, a }
    }

    /// Adds `k` of a palette color.
    #[inline]
    pub fn add_color(&mut self, c: &Color, k: f64) {
        self.r += c.r * k;
        self.g += c.g * k;
        self.b += c.b * k;
        self.a += c.a * k;
    }

    /// Adds `k` of another bucket.
    #[inline]
    pub fn add_scaled(&mut self, other: &Bucket, k: f64) {
        self.r += other.r * k;
        self.g += other.g * k;
        self.b += other.b * k;
        self.a += other.a * k;
    }

    /// This bucket with every component times `k`.
    #[inline]
    pub fn scaled(&self, k: f64) -> Bucket {
        Bucket::new(self.r * k, self.g * k, self.b * k, self.a * k)
    }
}

/// A zeroed bucket vector, failing cleanly when memory runs out.
pub fn alloc_buckets(len: usize, what: &'static str) -> Result<Vec<Bucket>> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| RenderError::Allocation {
            what,
            bytes: len.saturating_mul(size_of::<Bucket>()),
        })?;
    cells.resize(len, Bucket::default());
    Ok(cells)
}

/// Rows per band when `rows` are shared among `threads` workers.
pub fn rows_per_band(rows: usize, threads: usize) -> usize {
    let threads = threads.max(1).min(rows.max(1));
    ((rows + threads - 1) / threads).max(1)
}

/// Splits `rows` into at most `threads` contiguous, non-empty bands.
pub fn row_bands(rows: usize, threads: usize) -> Vec<(usize, usize)> {
    let per = rows_per_band(rows, threads);
    (0..(rows + per - 1) / per)
        .map(|t| (t * per, ((t + 1) * per).min(rows)))
        .filter(|(lo, hi)| lo < hi)
        .collect()
}

/// The supersampled accumulation grid.
#[derive(Clone, Debug)]
pub struct Histogram {
    width: usize,
    height: usize,
    cells: Vec<Bucket>,
}

impl Histogram {
    /// A zeroed `width` × `height` grid.
    pub fn new(width: usize, height: usize) -> Result<Histogram> {
        let len = width.checked_mul(height).ok_or(RenderError::Allocation {
            what: "histogram",
            bytes: usize::max_value(),
        })?;
        Ok(Histogram {
            width,
            height,
            cells: alloc_buckets(len, "histogram")?,
        })
    }

    /// Cells per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cells, row by row.
    pub fn cells(&self) -> &[Bucket] {
        &self.cells
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        for c in &mut self.cells {
            *c = Bucket::default();
        }
    }

    /// Adds every visible sample's palette color, scaled by the
    /// sample's opacity and `weight`.  Returns how many landed.
    pub fn bin(
        &mut self,
        samples: &[Point],
        mapper: &PlaneMapper,
        palette: &Palette,
        mode: PaletteMode,
        weight: f64,
    ) -> usize {
        let mut landed = 0;
        for p in samples.iter().filter(|p| p.opacity != 0.0) {
            if let Some(cell) = mapper
                .point_to_offset(p.x, p.y)
                .and_then(|offset| self.cells.get_mut(offset))
            {
                cell.add_color(&palette.lookup(p.color, mode), p.opacity * weight);
                landed += 1;
            }
        }
        landed
    }
}

/// Convolves the supersampled grid `src` (`super_width` cells wide)
/// with `filter`, one output cell per `supersample` block.
pub fn downsample(
    src: &[Bucket],
    super_width: usize,
    filter: &SpatialFilter,
    width: usize,
    height: usize,
    threads: usize,
) -> Result<Vec<Bucket>> {
    let mut out = alloc_buckets(width * height, "filtered image")?;
    if out.is_empty() {
        return Ok(out);
    }
    let ss = filter.supersample;
    let fw = filter.width();
    let per = rows_per_band(height, threads);

    crossbeam::scope(|s| {
        for (t, band) in out.chunks_mut(per * width).enumerate() {
            let lo = t * per;
            s.spawn(move |_| {
                for (k, cell) in band.iter_mut().enumerate() {
                    let (x, y) = (k % width, lo + k / width);
                    let mut acc = Bucket::default();
                    for j in 0..fw {
                        let row = (y * ss + j) * super_width + x * ss;
                        for i in 0..fw {
                            acc.add_scaled(&src[row + i], filter.get(i, j));
                        }
                    }
                    *cell = acc;
                }
            });
        }
    })
    .map_err(|_| RenderError::WorkerPanic)?;

    Ok(out)
}

/// Byte layout of the final image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutputFormat {
    /// 3 (RGB) or 4 (RGBA).
    pub channels: usize,
    /// 1 or 2; two-byte channels are native-endian `u16`.
    pub bytes_per_channel: usize,
    /// Keep the background out of RGBA output and write real alpha.
    pub transparency: bool,
    /// Row 0 of the output is the bottom of the image.
    pub y_axis_up: bool,
}

impl OutputFormat {
    /// Bytes in one output row.
    pub fn stride(&self, width: usize) -> usize {
        width * self.channels * self.bytes_per_channel
    }

    /// Bytes in a `width` × `height` image.
    pub fn frame_size(&self, width: usize, height: usize) -> usize {
        self.stride(width) * height
    }
}

/// Maps a density through the gamma curve, linear below `linrange`.
pub fn calc_alpha(density: f64, gamma: f64, linrange: f64) -> f64 {
    if density <= 0.0 {
        return 0.0;
    }
    if density < linrange {
        let funcval = linrange.powf(gamma);
        let frac = density / linrange;
        (1.0 - frac) * density * (funcval / linrange) + frac * density.powf(gamma)
    } else {
        density.powf(gamma)
    }
}

/// Scales `c` by `ls`, pulling saturated colors back into range
/// according to the highlight power.
pub fn calc_newrgb(c: [f64; 3], ls: f64, highpow: f64) -> [f64; 3] {
    if ls == 0.0 || c.iter().all(|v| *v == 0.0) {
        return [0.0; 3];
    }

    let mut maxa = -1.0;
    let mut maxc = 0.0;
    for v in &c {
        let a = ls * v;
        if a > maxa {
            maxa = a;
            maxc = *v;
        }
    }

    if maxa > 1.0 && highpow >= 0.0 {
        let newls = 1.0 / maxc;
        let lsratio = (newls / ls).powf(highpow);
        let (h, s, v) = rgb_to_hsv(c[0] * newls, c[1] * newls, c[2] * newls);
        let (r, g, b) = hsv_to_rgb(h, s * lsratio, v);
        [r, g, b]
    } else {
        let adjhlp = if maxa <= 1.0 { 1.0 } else { (-highpow).min(1.0) };
        let k = if adjhlp == 1.0 {
            ls
        } else {
            (1.0 - adjhlp) / maxc + adjhlp * ls
        };
        [c[0] * k, c[1] * k, c[2] * k]
    }
}

/// The genome's color-correction parameters, prepared once per frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorCorrection {
    /// Reciprocal of the genome's gamma.
    pub gamma: f64,
    /// Densities below this are brought up linearly instead of through the gamma curve.
    pub linrange: f64,
    /// How much of the gamma adjustment goes to alpha rather than each channel.
    pub vibrancy: f64,
    /// Negative desaturates highlights less; see `calc_newrgb`.
    pub highlight_power: f64,
    /// Drawn wherever the image is not fully opaque.
    pub background: Color,
}

impl ColorCorrection {
    /// Reads the genome's coloring fields.
    pub fn from_genome(genome: &Genome) -> Self {
        ColorCorrection {
            gamma: if genome.gamma > 0.0 { 1.0 / genome.gamma } else { 1.0 },
            linrange: genome.gamma_threshold,
            vibrancy: genome.vibrancy,
            highlight_power: genome.highlight_power,
            background: genome.background,
        }
    }

    /// Final RGBA in `[0, 1]` for one log-scaled, filtered bucket.
    pub fn correct(&self, bucket: &Bucket, transparent: bool) -> [f64; 4] {
        let (alpha, ls) = if bucket.a <= 0.0 {
            (0.0, 0.0)
        } else {
            let alpha = calc_alpha(bucket.a, self.gamma, self.linrange);
            (clamp(alpha, 0.0, 1.0), self.vibrancy * alpha / bucket.a)
        };

        let c = [bucket.r, bucket.g, bucket.b];
        let rgb = calc_newrgb(c, ls, self.highlight_power);
        let bg = [self.background.r, self.background.g, self.background.b];
        let mut out = [0.0, 0.0, 0.0, if transparent { alpha } else { 1.0 }];

        for i in 0..3 {
            let mut v = rgb[i] + (1.0 - self.vibrancy) * c[i].max(0.0).powf(self.gamma);
            if !transparent {
                v += (1.0 - alpha) * bg[i];
            } else if alpha > 0.0 {
                v /= alpha;
            } else {
                v = 0.0;
            }
            out[i] = if v.is_nan() { 0.0 } else { clamp(v, 0.0, 1.0) };
        }
        out
    }
}

/// Color corrects `buckets` (`width * height`, bottom row first) into
/// `out`, starting `row_offset` rows into the buffer.
pub fn write_image(
    buckets: &[Bucket],
    width: usize,
    height: usize,
    cc: &ColorCorrection,
    format: &OutputFormat,
    out: &mut [u8],
    row_offset: usize,
    threads: usize,
) -> Result<()> {
    let stride = format.stride(width);
    let needed = (row_offset + height) * stride;
    if out.len() < needed {
        return Err(RenderError::OutputTooSmall {
            got: out.len(),
            needed,
        });
    }
    if stride == 0 || height == 0 {
        return Ok(());
    }
    let transparent = format.transparency && format.channels == 4;
    let region = &mut out[row_offset * stride..needed];

    let per = rows_per_band(height, threads);

    crossbeam::scope(|s| {
        for (t, band) in region.chunks_mut(per * stride).enumerate() {
            let lo = t * per;
            s.spawn(move |_| {
                for (k, row) in band.chunks_mut(stride).enumerate() {
                    let r = lo + k;
                    let y = if format.y_axis_up { r } else { height - 1 - r };
                    let src = &buckets[y * width..(y + 1) * width];
                    for (px, bucket) in row
                        .chunks_mut(format.channels * format.bytes_per_channel)
                        .zip(src.iter())
                    {
                        let rgba = cc.correct(bucket, transparent);
                        write_pixel(px, &rgba, format);
                    }
                }
            });
        }
    })
    .map_err(|_| RenderError::WorkerPanic)?;

    Ok(())
}

#[inline]
fn write_pixel(px: &mut [u8], rgba: &[f64; 4], format: &OutputFormat) {
    for (ch, value) in rgba.iter().take(format.channels).enumerate() {
        if format.bytes_per_channel == 2 {
            let v = (value * 65535.0) as u16;
            px[ch * 2..ch * 2 + 2].copy_from_slice(&v.to_ne_bytes());
        } else {
            px[ch] = (value * 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::SpatialFilterType;

    fn rgba8() -> OutputFormat {
        OutputFormat {
            channels: 4,
            bytes_per_channel: 1,
            transparency: true,
            y_axis_up: false,
        }
    }

    #[test]
    fn bands_cover_every_row_once() {
        assert_eq!(row_bands(10, 3), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(row_bands(2, 8), vec![(0, 1), (1, 2)]);
        assert_eq!(row_bands(5, 0), vec![(0, 5)]);
    }

    #[test]
    fn binning_adds_palette_color() {
        let mut g = Genome::new();
        g.width = 4;
        g.height = 4;
        g.pixels_per_unit = 1.0;
        let mapper = PlaneMapper::new(&g, 0).unwrap();
        let mut hist = Histogram::new(4, 4).unwrap();
        let pal = Palette::grayscale();
        let samples = vec![
            Point { x: 0.5, y: 0.5, z: 0.0, color: 1.0, opacity: 1.0 },
            Point { x: 0.5, y: 0.5, z: 0.0, color: 1.0, opacity: 0.5 },
            Point { x: 0.5, y: 0.5, z: 0.0, color: 1.0, opacity: 0.0 },
            Point { x: 9.0, y: 0.5, z: 0.0, color: 1.0, opacity: 1.0 },
        ];
        assert_eq!(hist.bin(&samples, &mapper, &pal, PaletteMode::Step, 2.0), 2);
        let cell = hist.cells()[2 * 4 + 2];
        assert_eq!(cell, Bucket::new(3.0, 3.0, 3.0, 3.0));
        hist.clear();
        assert!(hist.cells().iter().all(|c| *c == Bucket::default()));
    }

    #[test]
    fn downsample_preserves_a_flat_field() {
        let f = SpatialFilter::new(SpatialFilterType::Gaussian, 1.0, 2, 1.0).unwrap();
        let (w, h) = (3, 2);
        let sw = w * 2 + 2 * f.gutter();
        let sh = h * 2 + 2 * f.gutter();
        let src = vec![Bucket::new(1.0, 0.5, 0.25, 2.0); sw * sh];
        let out = downsample(&src, sw, &f, w, h, 2).unwrap();
        assert_eq!(out.len(), 6);
        for b in out {
            assert!((b.r - 1.0).abs() < 1e-9 && (b.a - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn alpha_is_linear_below_threshold() {
        let a = calc_alpha(0.001, 0.25, 0.01);
        assert!(a < 0.01f64.powf(0.25));
        assert_eq!(calc_alpha(0.0, 0.25, 0.01), 0.0);
        assert!((calc_alpha(0.5, 0.5, 0.01) - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn highlights_are_pulled_into_range() {
        let rgb = calc_newrgb([1.0, 0.5, 0.0], 4.0, 1.0);
        assert!(rgb.iter().all(|v| *v <= 1.0 + 1e-9));
        assert_eq!(calc_newrgb([0.0; 3], 4.0, 1.0), [0.0; 3]);
        assert_eq!(calc_newrgb([0.1, 0.2, 0.3], 2.0, 1.0), [0.2, 0.4, 0.6]);
    }

    #[test]
    fn empty_cells_show_the_background() {
        let mut g = Genome::new();
        g.background = Color::rgb(1.0, 0.0, 0.0);
        let cc = ColorCorrection::from_genome(&g);
        assert_eq!(cc.correct(&Bucket::default(), false), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(cc.correct(&Bucket::default(), true), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn write_image_flips_rows_and_honours_offset() {
        let cc = ColorCorrection::from_genome(&Genome::new());
        let mut buckets = vec![Bucket::default(); 2];
        buckets[0] = Bucket::new(1.0, 1.0, 1.0, 1.0);
        let format = rgba8();
        let mut out = vec![7u8; 3 * 4];
        write_image(&buckets, 1, 2, &cc, &format, &mut out, 1, 2).unwrap();
        assert_eq!(&out[0..4], &[7, 7, 7, 7]);
        assert_eq!(out[4 + 3], 0);
        assert!(out[8 + 3] > 0);

        let mut small = vec![0u8; 4];
        assert!(write_image(&buckets, 1, 2, &cc, &format, &mut small, 0, 1).is_err());
    }

    #[test]
    fn sixteen_bit_output_is_native_endian() {
        let mut px = [0u8; 6];
        let format = OutputFormat {
            channels: 3,
            bytes_per_channel: 2,
            transparency: false,
            y_axis_up: true,
        };
        write_pixel(&mut px, &[1.0, 0.0, 0.5, 1.0], &format);
        assert_eq!(u16::from_ne_bytes([px[0], px[1]]), 65535);
        assert_eq!(u16::from_ne_bytes([px[4], px[5]]), 32767);
    }
}
