// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 256-entry color palettes and the HSV helpers used to blend them.

use crate::isaac::IsaacRng;
use num::clamp;

/// Number of entries in every palette.
pub const PALETTE_SIZE: usize = 256;

/// Straight RGBA in `[0, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl Color {
    /// A color from its components.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Color { r, g, b, a }
    }

    /// An opaque color.
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Color::new(r, g, b, 1.0)
    }

    /// Every component clamped to `[0, 1]`.
    pub fn clamped(&self) -> Self {
        Color::new(
            clamp(self.r, 0.0, 1.0),
            clamp(self.g, 0.0, 1.0),
            clamp(self.b, 0.0, 1.0),
            clamp(self.a, 0.0, 1.0),
        )
    }

    fn lerp(&self, other: &Color, t: f64) -> Self {
        Color::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }
}

/// Converts RGB in `[0, 1]` to `(h, s, v)` with the hue in `[0, 6)`.
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let del = max - min;
    let v = max;
    let s = if max != 0.0 { del / max } else { 0.0 };
    let mut h = 0.0;

    if s != 0.0 {
        let rc = (max - r) / del;
        let gc = (max - g) / del;
        let bc = (max - b) / del;

        h = if r == max {
            bc - gc
        } else if g == max {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };

        if h < 0.0 {
            h += 6.0;
        }
    }

    (h, s, v)
}

/// Inverse of `rgb_to_hsv`.  Hues outside `[0, 6)` wrap.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let mut h = h % 6.0;
    if h < 0.0 {
        h += 6.0;
    }
    let j = h.floor();
    let f = h - j;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match j as i32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// How a color index in `[0, 1]` is turned into a palette color.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaletteMode {
    /// Nearest entry.
    Step,
    /// Blend of the two neighbouring entries.
    Linear,
}

/// The colors a genome's xforms index into.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    /// -1 for explicit colors, otherwise the index into a named palette file.
    pub index: i32,
    /// Name from the palette file, if any.
    pub name: String,
    /// Normally `PALETTE_SIZE` colors.
    pub entries: Vec<Color>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::grayscale()
    }
}

impl Palette {
    /// A black-to-white ramp.
    pub fn grayscale() -> Self {
        let entries = (0..PALETTE_SIZE)
            .map(|i| {
                let v = i as f64 / (PALETTE_SIZE - 1) as f64;
                Color::rgb(v, v, v)
            })
            .collect();
        Palette {
            index: -1,
            name: "grayscale".to_string(),
            entries,
        }
    }

    /// A palette of explicit colors.  Short inputs are padded with
    /// black, long ones truncated.
    pub fn from_colors(colors: &[Color]) -> Self {
        let mut entries: Vec<Color> = colors.iter().take(PALETTE_SIZE).cloned().collect();
        entries.resize(PALETTE_SIZE, Color::rgb(0.0, 0.0, 0.0));
        Palette {
            index: -1,
            name: String::new(),
            entries,
        }
    }

    /// A smooth gradient through between three and six random colors.
    pub fn random(rng: &mut IsaacRng) -> Self {
        let anchors = 3 + rng.next_up_to(4) as usize;
        let colors: Vec<Color> = (0..anchors)
            .map(|_| {
                let (r, g, b) = hsv_to_rgb(
                    rng.next_range(0.0, 6.0),
                    rng.next_range(0.3, 1.0),
                    rng.next_range(0.4, 1.0),
                );
                Color::rgb(r, g, b)
            })
            .collect();

        let segments = (anchors - 1) as f64;
        let entries = (0..PALETTE_SIZE)
            .map(|i| {
                let pos = i as f64 / (PALETTE_SIZE - 1) as f64 * segments;
                let k = (pos.floor() as usize).min(anchors - 2);
                colors[k].lerp(&colors[k + 1], pos - k as f64)
            })
            .collect();

        Palette {
            index: -1,
            name: "random".to_string(),
            entries,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Multiplies every color by its alpha.
    pub fn premultiply_alpha(&mut self) {
        for c in &mut self.entries {
            c.r *= c.a;
            c.g *= c.a;
            c.b *= c.a;
        }
    }

    /// Shifts every hue by `amount` turns.
    pub fn rotate_hue(&mut self, amount: f64) {
        for c in &mut self.entries {
            let (h, s, v) = rgb_to_hsv(c.r, c.g, c.b);
            let (r, g, b) = hsv_to_rgb(h + amount * 6.0, s, v);
            c.r = r;
            c.g = g;
            c.b = b;
        }
    }

    /// The color for `index` in `[0, 1]`.  Out of range indices clamp
    /// to the ends of the palette; an empty palette is black.
    #[inline]
    pub fn lookup(&self, index: f64, mode: PaletteMode) -> Color {
        let last = match self.entries.len() {
            0 => return Color::default(),
            1 => return self.entries[0],
            n => n - 1,
        };
        match mode {
            PaletteMode::Step => {
                let i = clamp(index * self.entries.len() as f64, 0.0, last as f64) as usize;
                self.entries[i]
            }
            PaletteMode::Linear => {
                let pos = clamp(index, 0.0, 1.0) * last as f64;
                let (i, frac) = if pos >= last as f64 {
                    (last - 1, 1.0)
                } else {
                    (pos as usize, pos.fract())
                };
                self.entries[i].lerp(&self.entries[i + 1], frac)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn hsv_round_trip() {
        let mut rng = IsaacRng::from_u64(1234);
        for _ in 0..1000 {
            let (r, g, b): (f64, f64, f64) = (rng.gen(), rng.gen(), rng.gen());
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 1e-4, "{} {}", r, r2);
            assert!((g - g2).abs() < 1e-4, "{} {}", g, g2);
            assert!((b - b2).abs() < 1e-4, "{} {}", b, b2);
        }
    }

    #[test]
    fn primaries_have_expected_hues() {
        assert_eq!(rgb_to_hsv(1.0, 0.0, 0.0), (0.0, 1.0, 1.0));
        assert_eq!(rgb_to_hsv(0.0, 1.0, 0.0), (2.0, 1.0, 1.0));
        assert_eq!(rgb_to_hsv(0.0, 0.0, 1.0), (4.0, 1.0, 1.0));
        assert_eq!(rgb_to_hsv(0.5, 0.5, 0.5).1, 0.0);
    }

    #[test]
    fn step_lookup_clamps() {
        let pal = Palette::grayscale();
        assert_eq!(pal.lookup(-1.0, PaletteMode::Step), pal.entries[0]);
        assert_eq!(pal.lookup(1.0, PaletteMode::Step), pal.entries[255]);
        assert_eq!(pal.lookup(0.5, PaletteMode::Step), pal.entries[128]);
    }

    #[test]
    fn linear_lookup_blends_neighbours() {
        let mut colors = vec![Color::rgb(0.0, 0.0, 0.0); PALETTE_SIZE];
        colors[1] = Color::rgb(1.0, 1.0, 1.0);
        let pal = Palette::from_colors(&colors);
        let c = pal.lookup(0.5 / 255.0, PaletteMode::Linear);
        assert!((c.r - 0.5).abs() < 1e-9);
        assert_eq!(pal.lookup(1.0, PaletteMode::Linear), pal.entries[255]);
    }

    #[test]
    fn premultiply_scales_by_alpha() {
        let mut pal = Palette::from_colors(&[Color::new(1.0, 0.5, 0.2, 0.5)]);
        pal.premultiply_alpha();
        assert_eq!(pal.entries[0], Color::new(0.5, 0.25, 0.1, 0.5));
    }

    #[test]
    fn random_palettes_are_reproducible() {
        let a = Palette::random(&mut IsaacRng::from_u64(3));
        let b = Palette::random(&mut IsaacRng::from_u64(3));
        assert_eq!(a, b);
        assert_eq!(a.len(), PALETTE_SIZE);
        assert!(a.entries.iter().all(|c| c.r >= 0.0 && c.r <= 1.0));
    }

    #[test]
    fn hue_rotation_wraps() {
        let mut pal = Palette::from_colors(&[Color::new(1.0, 0.0, 0.0, 0.5)]);
        pal.rotate_hue(1.0 / 3.0);
        let c = pal.entries[0];
        assert!(c.r.abs() < 1e-9 && (c.g - 1.0).abs() < 1e-9 && c.b.abs() < 1e-9);
        assert_eq!(c.a, 0.5);
        pal.rotate_hue(2.0 / 3.0);
        assert!((pal.entries[0].r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_palettes_do_not_underflow() {
        let mut short = Palette::from_colors(&[Color::rgb(0.2, 0.4, 0.6)]);
        short.entries.truncate(1);
        for &mode in &[PaletteMode::Step, PaletteMode::Linear] {
            assert_eq!(short.lookup(0.7, mode), Color::rgb(0.2, 0.4, 0.6));
        }
        short.entries.clear();
        assert_eq!(short.lookup(0.7, PaletteMode::Linear), Color::default());
    }
}
