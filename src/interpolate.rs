// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Blending genomes.  `interpolate` mixes any number of genomes with
//! explicit coefficients; `interpolate_at` picks the keyframes around a
//! time and blends them linearly or with a Catmull-Rom spline.

use crate::affine::{Affine2D, PolarColumn};
use crate::genome::{AffineInterp, Genome, InterpKind, PaletteInterp};
use crate::palette::{hsv_to_rgb, rgb_to_hsv, Color, PALETTE_SIZE};
use crate::variation::{VarKind, Variation, VariationId};
use crate::xform::Xform;
use itertools::iproduct;
use std::f64::consts::PI;

macro_rules! blend_fields {
    ($result:ident, $genomes:ident, $coefs:ident; $($field:ident),*) => {
        $( $result.$field = $genomes.iter().zip($coefs).map(|(g, c)| c * g.$field).sum(); )*
    };
}

macro_rules! blend_counts {
    ($result:ident, $genomes:ident, $coefs:ident; $($field:ident),*) => {
        $( $result.$field = round_count($genomes.iter().zip($coefs).map(|(g, c)| c * g.$field as f64).sum()); )*
    };
}

fn round_count(v: f64) -> usize {
    v.round().max(0.0) as usize
}

/// Weights for the four control points of a Catmull-Rom segment
/// between the second and third points.
pub fn catmull_rom_coefs(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (2.0 * t2 - t - t3) / 2.0,
        (3.0 * t3 - 5.0 * t2 + 2.0) / 2.0,
        (4.0 * t2 - 3.0 * t3 + t) / 2.0,
        (t3 - t2) / 2.0,
    ]
}

/// Smoothstep, `3t² - 2t³`.
pub fn smoother(t: f64) -> f64 {
    3.0 * t * t - 2.0 * t * t * t
}

/// The coefficient of the first genome for xform `index` out of
/// `count` when staggering.  `t` runs from 1 (all first genome) to 0;
/// with `stagger` at 1 the xforms start one after the other.
pub fn stagger_coef(t: f64, stagger: f64, count: usize, index: usize) -> f64 {
    if count < 2 {
        return t;
    }
    let n = count as f64;
    let scaled = stagger * (n - 1.0) / n;
    let start = scaled * (n - 1.0 - index as f64) / (n - 1.0);
    let end = start + (1.0 - scaled);
    if t <= start {
        0.0
    } else if t >= end {
        1.0
    } else {
        smoother((t - start) / (1.0 - scaled))
    }
}

fn zero_weights(xf: &mut Xform) {
    for var in xf.variations_mut() {
        var.weight = 0.0;
    }
}

/// A stand-in for a regular xform missing from one genome.
fn padding_xform(template: &Xform) -> Xform {
    let mut pad = template.clone();
    pad.weight = 0.0;
    pad.affine = Affine2D::identity();
    pad.post = Affine2D::identity();
    pad.motion.clear();
    pad.clear_xaos();
    zero_weights(&mut pad);
    pad
}

/// A stand-in for a missing final xform: a plain linear pass-through.
fn padding_final(template: &Xform) -> Xform {
    let mut pad = padding_xform(template);
    pad.color_speed = 0.0;
    pad.opacity = 1.0;
    match pad.variation_mut(VariationId::Linear, VarKind::Regular) {
        Some(var) => var.weight = 1.0,
        None => pad.add_variation(Variation::new(VariationId::Linear, 1.0)),
    }
    pad
}

/// Union of the variations of `sources`, at zero weight.  Parameters
/// come from the first source that has the variation until blended.
fn merge_variations(sources: &[&Xform]) -> Xform {
    let mut merged = sources[0].clone();
    merged.clear_variations();
    for src in sources {
        for var in src.variations() {
            if merged.variation(var.id(), var.kind()).is_none() {
                let mut copy = var.clone();
                copy.weight = 0.0;
                merged.add_variation(copy);
            }
        }
    }
    merged
}

fn blend_variations(merged: &mut Xform, sources: &[&Xform], coefs: &[f64]) {
    for var in merged.variations_mut() {
        let (id, kind) = (var.id(), var.kind());
        var.weight = sources
            .iter()
            .zip(coefs)
            .map(|(src, c)| c * src.variation(id, kind).map_or(0.0, |v| v.weight))
            .sum();
        if let Some(params) = var.as_parametric_mut() {
            for param in params.iter_mut().filter(|p| !p.precalc) {
                let mut sum = 0.0;
                let mut covered = 0.0;
                for (src, c) in sources.iter().zip(coefs) {
                    if let Some(v) = src.variation(id, kind).and_then(|v| v.param(param.name)) {
                        sum += c * v;
                        covered += c;
                    }
                }
                // Sources without the variation contribute zero, as for weights.
                if covered != 0.0 {
                    param.set(sum);
                }
            }
        }
        var.precalc();
    }
}

fn blend_column_log(columns: &[PolarColumn], coefs: &[f64]) -> PolarColumn {
    let mut angles: Vec<f64> = columns.iter().map(|c| c.angle).collect();
    for k in 1..angles.len() {
        while angles[k] - angles[k - 1] > PI {
            angles[k] -= 2.0 * PI;
        }
        while angles[k] - angles[k - 1] < -PI {
            angles[k] += 2.0 * PI;
        }
    }
    PolarColumn {
        angle: angles.iter().zip(coefs).map(|(a, c)| c * a).sum(),
        magnitude: columns
            .iter()
            .zip(coefs)
            .map(|(col, c)| c * col.magnitude.ln())
            .sum::<f64>()
            .exp(),
    }
}

fn blend_affine_linear(affines: &[Affine2D], coefs: &[f64]) -> Affine2D {
    affines
        .iter()
        .zip(coefs)
        .fold(Affine2D::zero(), |acc, (a, c)| acc.add(&a.scaled_all(*c)))
}

fn blend_affine(affines: &[Affine2D], coefs: &[f64], mode: AffineInterp) -> Affine2D {
    let linear = blend_affine_linear(affines, coefs);
    if mode == AffineInterp::Linear {
        return linear;
    }
    let polar: Vec<[PolarColumn; 2]> = affines.iter().map(Affine2D::polar_columns).collect();
    let mut out = [PolarColumn::default(), PolarColumn::default()];
    for (col, slot) in out.iter_mut().enumerate() {
        let columns: Vec<PolarColumn> = polar.iter().map(|p| p[col]).collect();
        // A zero-length column has no log; that column falls back to linear.
        if columns.iter().any(|c| c.magnitude == 0.0) {
            let (x, y) = if col == 0 { linear.x_axis() } else { linear.y_axis() };
            *slot = PolarColumn {
                angle: y.atan2(x),
                magnitude: (x * x + y * y).sqrt(),
            };
        } else {
            *slot = blend_column_log(&columns, coefs);
        }
    }
    Affine2D::from_polar(&out, linear.origin())
}

fn blend_xform(sources: &[&Xform], coefs: &[f64], mode: AffineInterp) -> Xform {
    let mut xf = merge_variations(sources);
    blend_variations(&mut xf, sources, coefs);

    let blend = |f: &dyn Fn(&Xform) -> f64| -> f64 {
        sources.iter().zip(coefs).map(|(src, c)| c * f(*src)).sum()
    };
    xf.weight = blend(&|x: &Xform| x.weight).max(0.0);
    xf.color_x = num::clamp(blend(&|x: &Xform| x.color_x), 0.0, 1.0);
    xf.color_speed = num::clamp(blend(&|x: &Xform| x.color_speed), -1.0, 1.0);
    xf.opacity = num::clamp(blend(&|x: &Xform| x.opacity), 0.0, 1.0);
    xf.animate = blend(&|x: &Xform| x.animate);

    let affines: Vec<Affine2D> = sources.iter().map(|x| x.affine).collect();
    xf.affine = blend_affine(&affines, coefs, mode);
    if sources.iter().all(|x| x.post.is_identity()) {
        xf.post = Affine2D::identity();
    } else {
        let posts: Vec<Affine2D> = sources.iter().map(|x| x.post).collect();
        xf.post = blend_affine(&posts, coefs, mode);
    }
    xf.motion.clear();
    xf.clear_xaos();
    xf
}

fn blend_palette(genomes: &[Genome], coefs: &[f64], result: &mut Genome) {
    let size = genomes
        .iter()
        .map(|g| g.palette.entries.len())
        .min()
        .unwrap_or(0)
        .min(PALETTE_SIZE);
    let mut entries = Vec::with_capacity(size);
    match genomes[0].palette_interp {
        PaletteInterp::Hsv => {
            for i in 0..size {
                let (mut h, mut s, mut v, mut a) = (0.0, 0.0, 0.0, 0.0);
                for (g, c) in genomes.iter().zip(coefs) {
                    let e = &g.palette.entries[i];
                    let (eh, es, ev) = rgb_to_hsv(e.r, e.g, e.b);
                    h += c * eh;
                    s += c * es;
                    v += c * ev;
                    a += c * e.a;
                }
                let (r, g, b) = hsv_to_rgb(h, s, v);
                entries.push(Color::new(r, g, b, a).clamped());
            }
        }
        PaletteInterp::Sweep => {
            let cut = PALETTE_SIZE as f64 * coefs[0];
            for i in 0..size {
                let src = if (i as f64) < cut { 0 } else { 1 };
                entries.push(genomes[src].palette.entries[i]);
            }
        }
    }
    result.palette.entries = entries;
    result.palette.index = -1;
}

/// Blends `genomes` with the matching `coefs` into `result`.
///
/// Does nothing unless there are at least two genomes and exactly one
/// coefficient per genome.  Genomes with differing xform counts are
/// padded on the fly, as `align` would.  `stagger` is honoured only
/// for a pair of genomes.
pub fn interpolate(genomes: &[Genome], coefs: &[f64], stagger: f64, result: &mut Genome) {
    if genomes.len() < 2 || genomes.len() != coefs.len() {
        return;
    }

    *result = genomes[0].clone();
    result.remove_final_xform();
    while result.delete_xform(0) {}
    result.symmetry = 0;

    blend_fields!(result, genomes, coefs;
        time, center_x, center_y, rotate, zoom, pixels_per_unit, pixel_aspect_ratio,
        quality, cam_zpos, cam_perspective, cam_pitch, cam_yaw, cam_depth_blur,
        spatial_filter_radius, temporal_filter_width, temporal_filter_exp,
        de_min_radius, de_max_radius, de_curve,
        brightness, gamma, gamma_threshold, vibrancy, highlight_power);
    blend_counts!(result, genomes, coefs;
        width, height, supersample, temporal_samples, fuse_count);
    for (i, j) in iproduct!(0..3, 0..3) {
        result.cam_mat[i][j] = genomes.iter().zip(coefs).map(|(g, c)| c * g.cam_mat[i][j]).sum();
    }
    let bg = |f: &dyn Fn(&Color) -> f64| -> f64 {
        genomes.iter().zip(coefs).map(|(g, c)| c * f(&g.background)).sum()
    };
    result.background.r = bg(&|c: &Color| c.r);
    result.background.g = bg(&|c: &Color| c.g);
    result.background.b = bg(&|c: &Color| c.b);

    blend_palette(genomes, coefs, result);

    let mode = genomes[0].affine_interp;
    let max_xforms = genomes.iter().map(Genome::xform_count).max().unwrap_or(0);
    let staggered = stagger > 0.0 && genomes.len() == 2;

    for i in 0..max_xforms {
        let template = match genomes.iter().filter_map(|g| g.xforms().get(i)).next() {
            Some(xf) => xf,
            None => continue,
        };
        let pad = padding_xform(template);
        let sources: Vec<&Xform> = genomes
            .iter()
            .map(|g| g.xforms().get(i).unwrap_or(&pad))
            .collect();
        let xf = if staggered {
            let c0 = stagger_coef(coefs[0], stagger, max_xforms, i);
            blend_xform(&sources, &[c0, 1.0 - c0], mode)
        } else {
            blend_xform(&sources, coefs, mode)
        };
        result.add_xform(xf);
    }

    let final_used = genomes
        .iter()
        .zip(coefs)
        .any(|(g, c)| *c != 0.0 && g.has_final_xform());
    if final_used {
        if let Some(template) = genomes.iter().filter_map(Genome::final_xform).next() {
            let pad = padding_final(template);
            let sources: Vec<&Xform> = genomes
                .iter()
                .map(|g| g.final_xform().unwrap_or(&pad))
                .collect();
            result.set_final_xform(blend_xform(&sources, coefs, mode));
        }
    }

    if genomes.iter().any(Genome::xaos_present) {
        for (from, to) in iproduct!(0..max_xforms, 0..max_xforms) {
            let v: f64 = genomes
                .iter()
                .zip(coefs)
                .map(|(g, c)| c * g.xforms().get(from).map_or(1.0, |xf| xf.xaos(to)))
                .sum();
            result.xforms_mut()[from].set_xaos(to, v.max(0.0));
        }
    }
}

/// Catmull-Rom blend of four consecutive keyframes at `t` between the
/// middle two.
pub fn interpolate_catmull_rom(genomes: &[Genome], t: f64, result: &mut Genome) {
    if genomes.len() != 4 {
        return;
    }
    interpolate(genomes, &catmull_rom_coefs(t), 0.0, result);
}

/// Pads every genome to the same number of xforms, gives every genome a
/// final xform when any has one, and makes each xform carry every
/// variation its counterparts carry.  Added pieces have zero weight.
pub fn align(genomes: &mut [Genome]) {
    let max_xforms = genomes.iter().map(Genome::xform_count).max().unwrap_or(0);
    for i in 0..max_xforms {
        let template = match genomes.iter().filter_map(|g| g.xforms().get(i)).next() {
            Some(xf) => padding_xform(xf),
            None => continue,
        };
        for g in genomes.iter_mut() {
            while g.xform_count() <= i {
                g.add_xform(template.clone());
            }
        }
    }

    if let Some(template) = genomes.iter().filter_map(Genome::final_xform).next() {
        let pad = padding_final(template);
        for g in genomes.iter_mut().filter(|g| !g.has_final_xform()) {
            g.set_final_xform(pad.clone());
        }
    }

    let total = max_xforms + genomes.iter().any(Genome::has_final_xform) as usize;
    for i in 0..total {
        let mut union: Vec<Variation> = Vec::new();
        for g in genomes.iter() {
            if let Some(xf) = g.xform(i) {
                for var in xf.variations() {
                    if !union.iter().any(|u| u.same_slot(var)) {
                        let mut copy = var.clone();
                        copy.weight = 0.0;
                        union.push(copy);
                    }
                }
            }
        }
        for g in genomes.iter_mut() {
            if let Some(xf) = g.xform_mut(i) {
                for var in &union {
                    if xf.variation(var.id(), var.kind()).is_none() {
                        xf.add_variation(var.clone());
                    }
                }
            }
        }
    }
}

/// The genome at `time` along a keyframe sequence ordered by time.
/// Times outside the sequence clamp to the end keyframes.
pub fn interpolate_at(keyframes: &[Genome], time: f64, stagger: f64, result: &mut Genome) {
    let (first, last) = match (keyframes.first(), keyframes.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return,
    };
    if keyframes.len() == 1 || time <= first.time {
        *result = first.clone();
    } else if time >= last.time {
        *result = last.clone();
    } else {
        let i = keyframes
            .windows(2)
            .position(|pair| time >= pair[0].time && time < pair[1].time)
            .unwrap_or(0);
        let span = keyframes[i + 1].time - keyframes[i].time;
        let t = if span > 0.0 { (time - keyframes[i].time) / span } else { 0.0 };
        if keyframes[i].interpolation == InterpKind::Smooth && i >= 1 && i + 2 < keyframes.len() {
            trace!("catmull-rom between keyframes {} and {} at {}", i, i + 1, t);
            interpolate_catmull_rom(&keyframes[i - 1..i + 3], t, result);
        } else {
            interpolate(&keyframes[i..i + 2], &[1.0 - t, t], stagger, result);
        }
    }
    result.time = time;
}
