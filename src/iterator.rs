// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The chaos game.
//!
//! Each render worker owns an `IterState` (its generator, the
//! wandering point and the index of the xform applied last) and
//! fills a slice of samples per sub-batch.  Xforms are picked from
//! precomputed lookup tables: one for the plain weights and, when
//! the genome uses xaos, one per source xform with the weights
//! scaled by that xform's xaos row.

use crate::genome::Genome;
use crate::isaac::IsaacRng;
use crate::variation::EPS;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};

/// Slots in an xform lookup table.  A power of two.
pub const CHOOSE_XFORM_GRAIN: usize = 16384;

/// Iterations between two polls of the abort flag.
const ABORT_POLL: usize = 256;

/// A point in flame space with its color coordinate.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    /// X.
    pub x: f64,
    /// Y.
    pub y: f64,
    /// Depth, used by the 3D camera.
    pub z: f64,
    /// Palette coordinate in `[0, 1]`.
    pub color: f64,
    /// Xform opacity of the last step.
    pub opacity: f64,
}

impl Point {
    /// A random start in the bi-unit square with a random color.
    pub fn random(rng: &mut IsaacRng) -> Point {
        Point {
            x: rng.next_f11(),
            y: rng.next_f11(),
            z: 0.0,
            color: rng.next_f01(),
            opacity: 1.0,
        }
    }
}

/// Which camera projection a genome needs.  Chosen once per genome so
/// flat genomes skip the trigonometry entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Flat genome, no projection.
    None,
    /// Perspective along z only.
    ZPerspective,
    /// Pitched camera.
    Pitch,
    /// Pitched camera with depth blur.
    PitchDepthBlur,
    /// Pitched and yawed camera.
    PitchYaw,
    /// Pitched and yawed camera with depth blur.
    PitchYawDepthBlur,
}

#[inline]
fn zeps(x: f64) -> f64 {
    if x == 0.0 {
        EPS
    } else {
        x
    }
}

/// The projection applied to every sample before plotting.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    /// Which projection to run.
    pub kind: ProjectionKind,
    /// Pitch and yaw rotation.
    pub mat: [[f64; 3]; 3],
    /// Camera height.
    pub zpos: f64,
    /// Perspective strength.
    pub perspective: f64,
    /// Depth blur scale.
    pub blur_coef: f64,
}

impl Camera {
    /// Reads the genome's camera; `cam_mat` must be current.
    pub fn from_genome(genome: &Genome) -> Camera {
        Camera {
            kind: genome.projection_kind(),
            mat: genome.cam_mat,
            zpos: genome.cam_zpos,
            perspective: genome.cam_perspective,
            blur_coef: 0.1 * genome.cam_depth_blur,
        }
    }

    /// Projects `p` in place; depth blur draws from `rng`.
    #[inline]
    pub fn project(&self, p: &mut Point, rng: &mut IsaacRng) {
        let m = &self.mat;
        match self.kind {
            ProjectionKind::None => {}
            ProjectionKind::ZPerspective => {
                let zr = zeps(1.0 - self.perspective * (p.z - self.zpos));
                p.x /= zr;
                p.y /= zr;
                p.z -= self.zpos;
            }
            ProjectionKind::Pitch => {
                let z = p.z - self.zpos;
                let y = m[1][1] * p.y + m[2][1] * z;
                let zr = zeps(1.0 - self.perspective * (m[1][2] * p.y + m[2][2] * z));
                p.x /= zr;
                p.y = y / zr;
                p.z -= self.zpos;
            }
            ProjectionKind::PitchDepthBlur => {
                let t = rng.next_f01() * 2.0 * PI;
                let z = p.z - self.zpos;
                let y = m[1][1] * p.y + m[2][1] * z;
                let z = m[1][2] * p.y + m[2][2] * z;
                let zr = zeps(1.0 - self.perspective * z);
                let (s, c) = t.sin_cos();
                let dr = rng.next_f01() * self.blur_coef * z;
                p.x = (p.x + dr * c) / zr;
                p.y = (y + dr * s) / zr;
                p.z -= self.zpos;
            }
            ProjectionKind::PitchYaw => {
                let z = p.z - self.zpos;
                let x = m[0][0] * p.x + m[1][0] * p.y;
                let y = m[0][1] * p.x + m[1][1] * p.y + m[2][1] * z;
                let zr = zeps(
                    1.0 - self.perspective * (m[0][2] * p.x + m[1][2] * p.y + m[2][2] * z),
                );
                p.x = x / zr;
                p.y = y / zr;
                p.z -= self.zpos;
            }
            ProjectionKind::PitchYawDepthBlur => {
                let t = rng.next_f01() * 2.0 * PI;
                let z = p.z - self.zpos;
                let x = m[0][0] * p.x + m[1][0] * p.y;
                let y = m[0][1] * p.x + m[1][1] * p.y + m[2][1] * z;
                let z = m[0][2] * p.x + m[1][2] * p.y + m[2][2] * z;
                let zr = zeps(1.0 - self.perspective * z);
                let dr = rng.next_f01() * self.blur_coef * z;
                let (s, c) = t.sin_cos();
                p.x = (x + dr * c) / zr;
                p.y = (y + dr * s) / zr;
                p.z -= self.zpos;
            }
        }
    }
}

/// Fills a lookup table so that xform `i` owns a share of the slots
/// proportional to `weights[i]`.  None when no weight is positive.
fn build_table(weights: &[f64]) -> Option<Vec<u32>> {
    let weights: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    let dr = total / CHOOSE_XFORM_GRAIN as f64;
    let mut table = Vec::with_capacity(CHOOSE_XFORM_GRAIN);
    let mut j = 0;
    let mut t = weights[0];
    let mut r = 0.0;
    for _ in 0..CHOOSE_XFORM_GRAIN {
        while r >= t && j + 1 < weights.len() {
            j += 1;
            t += weights[j];
        }
        table.push(j as u32);
        r += dr;
    }
    Some(table)
}

/// Weighted xform selection, optionally conditioned on the previous
/// xform through the xaos rows.
#[derive(Clone, Debug)]
pub struct XformSelector {
    /// Table 0 uses the plain weights; table `k + 1` follows xform `k`.
    tables: Vec<Vec<u32>>,
    xaos: bool,
}

impl XformSelector {
    /// None when the genome has no positive weight.
    pub fn new(genome: &Genome) -> Option<XformSelector> {
        let xforms = genome.xforms();
        let weights: Vec<f64> = xforms.iter().map(|xf| xf.weight).collect();
        let base = build_table(&weights)?;
        let xaos = genome.xaos_present();
        let mut tables = vec![base];

        if xaos {
            for (k, from) in xforms.iter().enumerate() {
                let row: Vec<f64> = xforms
                    .iter()
                    .enumerate()
                    .map(|(i, to)| to.weight * from.xaos(i))
                    .collect();
                match build_table(&row) {
                    Some(table) => tables.push(table),
                    None => {
                        warn!("xaos row {} has no positive entry, using plain weights", k);
                        tables.push(tables[0].clone());
                    }
                }
            }
        }

        Some(XformSelector { tables, xaos })
    }

    /// Whether the next xform depends on the last one.
    pub fn uses_xaos(&self) -> bool {
        self.xaos
    }

    /// Index of the next xform, given the one applied last.
    #[inline]
    pub fn choose(&self, last: usize, rng: &mut IsaacRng) -> usize {
        let table = if self.xaos {
            &self.tables[(last + 1).min(self.tables.len() - 1)]
        } else {
            &self.tables[0]
        };
        table[rng.next_uint() as usize & (CHOOSE_XFORM_GRAIN - 1)] as usize
    }
}

/// Per-worker iteration state, kept across sub-batches.
#[derive(Clone, Debug)]
pub struct IterState {
    /// The worker's own random stream.
    pub rng: IsaacRng,
    /// Where the chaos game is.
    pub point: Point,
    /// Index of the xform applied last, for xaos.
    pub last_xform: usize,
    /// Run the fuse iterations before the next sample.
    pub needs_fuse: bool,
}

impl IterState {
    /// Fresh state that fuses before its first sample.
    pub fn new(rng: IsaacRng) -> Self {
        IterState {
            rng,
            point: Point::default(),
            last_xform: 0,
            needs_fuse: true,
        }
    }

    /// Forces a fuse before the next sample.
    pub fn restart(&mut self) {
        self.needs_fuse = true;
    }
}

/// Counts from one batch of iterations.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IterStats {
    /// Samples written, fuse excluded.
    pub iterations: usize,
    /// Samples dropped for leaving the plane.
    pub bad_values: usize,
}

/// One step of the chaos game from `state`.  Returns the sample to
/// record, or None after a bad value (the point is re-randomized).
#[inline]
fn step(genome: &Genome, selector: &XformSelector, state: &mut IterState) -> Option<Point> {
    let index = selector.choose(state.last_xform, &mut state.rng);
    let xf = &genome.xforms()[index];
    let mut next = Point::default();
    if xf.apply(&state.point, &mut next, &mut state.rng) {
        state.point = Point::random(&mut state.rng);
        return None;
    }
    state.point = next;
    state.last_xform = index;

    match genome.final_xform() {
        Some(fin) => {
            let mut out = Point::default();
            if fin.apply(&next, &mut out, &mut state.rng) {
                state.point = Point::random(&mut state.rng);
                return None;
            }
            out.opacity = next.opacity * fin.opacity;
            Some(out)
        }
        None => Some(next),
    }
}

/// Runs the chaos game, writing one sample per slot of `samples`.
/// Bad values leave a zero-opacity sample behind.  Stops early when
/// `abort` is raised; the returned count says how many slots are valid.
pub fn iterate(
    genome: &Genome,
    selector: &XformSelector,
    camera: &Camera,
    fuse: usize,
    state: &mut IterState,
    samples: &mut [Point],
    abort: &AtomicBool,
) -> IterStats {
    let mut stats = IterStats::default();

    if state.needs_fuse {
        state.point = Point::random(&mut state.rng);
        state.last_xform = 0;
        for _ in 0..fuse {
            if step(genome, selector, state).is_none() {
                stats.bad_values += 1;
            }
        }
        state.needs_fuse = false;
    }

    for (i, slot) in samples.iter_mut().enumerate() {
        if i % ABORT_POLL == 0 && abort.load(Ordering::Relaxed) {
            break;
        }
        match step(genome, selector, state) {
            Some(mut p) => {
                camera.project(&mut p, &mut state.rng);
                *slot = p;
            }
            None => {
                stats.bad_values += 1;
                *slot = Point::default();
            }
        }
        stats.iterations += 1;
    }

    stats
}

/// Corners `[min_x, min_y, max_x, max_y]` of the box holding the
/// attractor after dropping the `trim` fraction of outliers on each
/// side, estimated from `samples` chaos-game points.  None when the
/// genome cannot be iterated or every sample was bad.
pub fn estimate_bounds(
    genome: &Genome,
    samples: usize,
    trim: f64,
    rng: &mut IsaacRng,
) -> Option<[f64; 4]> {
    let selector = XformSelector::new(genome)?;
    let camera = Camera::from_genome(genome);
    let mut state = IterState::new(IsaacRng::child(rng));
    let mut points = vec![Point::default(); samples];
    let never = AtomicBool::new(false);
    iterate(genome, &selector, &camera, genome.fuse_count, &mut state, &mut points, &never);

    let visible = points
        .iter()
        .filter(|p| p.opacity != 0.0 && p.x.is_finite() && p.y.is_finite());
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = visible.map(|p| (p.x, p.y)).unzip();
    if xs.is_empty() {
        return None;
    }
    let by_value = |a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
    xs.sort_by(by_value);
    ys.sort_by(by_value);
    let n = xs.len();
    let k = ((n as f64 * num::clamp(trim, 0.0, 0.5)) as usize).min((n - 1) / 2);
    Some([xs[k], ys[k], xs[n - 1 - k], ys[n - 1 - k]])
}

/// Centres the camera on the attractor and zooms until it fills
/// `fill` of the smaller image dimension.  Returns false, leaving the
/// camera alone, when no bounds could be estimated.
pub fn fit_camera(genome: &mut Genome, fill: f64, rng: &mut IsaacRng) -> bool {
    let [x0, y0, x1, y1] = match estimate_bounds(genome, 10_000, 0.01, rng) {
        Some(bounds) => bounds,
        None => return false,
    };
    let span_x = (x1 - x0).max(EPS);
    let span_y = (y1 - y0).max(EPS);
    let ppu = fill * (genome.width as f64 / span_x).min(genome.height as f64 / span_y);
    if !ppu.is_finite() || ppu <= 0.0 {
        return false;
    }
    genome.center_x = (x0 + x1) / 2.0;
    genome.center_y = (y0 + y1) / 2.0;
    genome.pixels_per_unit = ppu / genome.scale();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Affine2D;
    use crate::variation::{Variation, VariationId};
    use crate::xform::Xform;

    fn sierpinski() -> Genome {
        let mut g = Genome::new();
        for (c, f) in &[(0.0, 0.0), (0.5, 0.0), (0.0, 0.5)] {
            g.add_xform(
                Xform::new()
                    .with_variation(Variation::new(VariationId::Linear, 1.0))
                    .with_affine(Affine2D::new(0.5, 0.0, *c, 0.0, 0.5, *f)),
            );
        }
        g
    }

    #[test]
    fn selection_follows_weights() {
        let mut g = sierpinski();
        g.add_xform(Xform::new());
        for (xf, w) in g.xforms_mut().iter_mut().zip(&[1.0, 2.0, 3.0, 4.0]) {
            xf.weight = *w;
        }
        let sel = XformSelector::new(&g).unwrap();
        let mut rng = IsaacRng::from_u64(99);
        let mut counts = [0usize; 4];
        let draws = 100_000;
        for _ in 0..draws {
            counts[sel.choose(0, &mut rng)] += 1;
        }
        for (i, c) in counts.iter().enumerate() {
            let expected = (i + 1) as f64 / 10.0;
            assert!((*c as f64 / draws as f64 - expected).abs() < 0.01, "{:?}", counts);
        }
    }

    #[test]
    fn zero_weights_are_never_chosen() {
        let mut g = sierpinski();
        g.xforms_mut()[1].weight = 0.0;
        let sel = XformSelector::new(&g).unwrap();
        let mut rng = IsaacRng::from_u64(5);
        assert!((0..10_000).all(|_| sel.choose(0, &mut rng) != 1));
        for xf in g.xforms_mut() {
            xf.weight = 0.0;
        }
        assert!(XformSelector::new(&g).is_none());
    }

    #[test]
    fn xaos_rows_condition_the_choice() {
        let mut g = sierpinski();
        g.xforms_mut()[0].set_xaos(0, 0.0);
        g.xforms_mut()[0].set_xaos(2, 0.0);
        let sel = XformSelector::new(&g).unwrap();
        assert!(sel.uses_xaos());
        let mut rng = IsaacRng::from_u64(17);
        assert!((0..10_000).all(|_| sel.choose(0, &mut rng) == 1));
        let mut seen = [false; 3];
        for _ in 0..1000 {
            seen[sel.choose(1, &mut rng)] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn iteration_stays_on_the_attractor() {
        let g = sierpinski();
        let sel = XformSelector::new(&g).unwrap();
        let cam = Camera::from_genome(&g);
        let mut state = IterState::new(IsaacRng::from_u64(1));
        let mut samples = vec![Point::default(); 5000];
        let stats = iterate(&g, &sel, &cam, 40, &mut state, &mut samples, &AtomicBool::new(false));
        assert_eq!(stats.iterations, 5000);
        assert_eq!(stats.bad_values, 0);
        for p in &samples {
            assert!(p.x >= -1e-9 && p.y >= -1e-9 && p.x + p.y <= 1.0 + 1e-9);
        }
        assert!(!state.needs_fuse);
    }

    #[test]
    fn same_seed_same_samples() {
        let g = sierpinski();
        let sel = XformSelector::new(&g).unwrap();
        let cam = Camera::from_genome(&g);
        let run = || {
            let mut state = IterState::new(IsaacRng::from_u64(42));
            let mut samples = vec![Point::default(); 100];
            iterate(&g, &sel, &cam, 15, &mut state, &mut samples, &AtomicBool::new(false));
            samples
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn abort_stops_early() {
        let g = sierpinski();
        let sel = XformSelector::new(&g).unwrap();
        let cam = Camera::from_genome(&g);
        let mut state = IterState::new(IsaacRng::from_u64(1));
        let mut samples = vec![Point::default(); 1000];
        let stats = iterate(&g, &sel, &cam, 0, &mut state, &mut samples, &AtomicBool::new(true));
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn bad_values_are_counted_not_fatal() {
        let mut g = Genome::new();
        g.add_xform(Xform::new().with_variation(Variation::new(VariationId::Linear, 1e11)));
        let sel = XformSelector::new(&g).unwrap();
        let cam = Camera::from_genome(&g);
        let mut state = IterState::new(IsaacRng::from_u64(3));
        let mut samples = vec![Point::default(); 64];
        let stats = iterate(&g, &sel, &cam, 0, &mut state, &mut samples, &AtomicBool::new(false));
        assert_eq!(stats.iterations, 64);
        assert!(stats.bad_values > 0);
        assert!(samples.iter().any(|p| p.opacity == 0.0));
    }

    #[test]
    fn final_xform_shapes_output_but_not_the_walk() {
        let mut g = sierpinski();
        let mut fin = Xform::new().with_variation(Variation::new(VariationId::Linear, 1.0));
        fin.affine = Affine2D::new(1.0, 0.0, 10.0, 0.0, 1.0, 0.0);
        g.set_final_xform(fin);
        let sel = XformSelector::new(&g).unwrap();
        let cam = Camera::from_genome(&g);
        let mut state = IterState::new(IsaacRng::from_u64(8));
        let mut samples = vec![Point::default(); 500];
        iterate(&g, &sel, &cam, 40, &mut state, &mut samples, &AtomicBool::new(false));
        assert!(samples.iter().all(|p| p.x >= 10.0 - 1e-9 && p.x <= 11.0 + 1e-9));
        assert!(state.point.x <= 1.0 + 1e-9);
    }

    #[test]
    fn projections() {
        let mut g = Genome::new();
        let mut rng = IsaacRng::new();
        let mut p = Point { x: 1.0, y: 2.0, z: 0.0, color: 0.0, opacity: 1.0 };
        Camera::from_genome(&g).project(&mut p, &mut rng);
        assert_eq!((p.x, p.y), (1.0, 2.0));

        g.cam_perspective = 0.5;
        let mut p = Point { x: 1.0, y: 2.0, z: 1.0, color: 0.0, opacity: 1.0 };
        Camera::from_genome(&g).project(&mut p, &mut rng);
        assert_eq!((p.x, p.y), (2.0, 4.0));

        g.cam_perspective = 0.0;
        g.cam_pitch = PI / 2.0;
        g.update_camera_matrix();
        let cam = Camera::from_genome(&g);
        assert_eq!(cam.kind, ProjectionKind::Pitch);
        let mut p = Point { x: 1.0, y: 2.0, z: 3.0, color: 0.0, opacity: 1.0 };
        cam.project(&mut p, &mut rng);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y + 3.0).abs() < 1e-12);
    }

    #[test]
    fn bounds_cover_the_gasket() {
        let g = sierpinski();
        let mut rng = IsaacRng::from_u64(8);
        let [x0, y0, x1, y1] = estimate_bounds(&g, 5000, 0.0, &mut rng).unwrap();
        assert!(x0 >= -1e-9 && y0 >= -1e-9);
        assert!(x1 <= 1.0 + 1e-9 && y1 <= 1.0 + 1e-9);
        assert!(x1 - x0 > 0.9 && y1 - y0 > 0.9);
        assert!(estimate_bounds(&Genome::new(), 100, 0.0, &mut rng).is_none());
    }

    #[test]
    fn fitting_centres_the_camera() {
        let mut g = sierpinski();
        g.width = 200;
        g.height = 100;
        g.zoom = 1.0;
        let mut rng = IsaacRng::from_u64(8);
        assert!(fit_camera(&mut g, 0.8, &mut rng));
        assert!((g.center_x - 0.5).abs() < 0.05);
        assert!((g.center_y - 0.5).abs() < 0.05);
        // The height limits: about 80 pixels per unit once zoomed.
        let ppu = g.pixels_per_unit * g.scale();
        assert!(ppu > 75.0 && ppu < 90.0, "{}", ppu);
    }
}
