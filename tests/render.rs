// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate flamegen;

use flamegen::affine::Affine2D;
use flamegen::spatial::{SpatialFilter, SpatialFilterType};
use flamegen::variation::{Variation, VariationId};
use flamegen::{
    interpolate, random_genome, Genome, IsaacRng, ProcessAction, ProcessState, RandomOptions,
    RenderSettings, RenderStatus, Renderer, Xform,
};

fn gasket(width: usize, height: usize) -> Genome {
    let mut g = Genome::new();
    g.width = width;
    g.height = height;
    g.pixels_per_unit = width as f64 * 0.8;
    g.center_x = 0.5;
    g.center_y = 0.5;
    g.quality = 5.0;
    for (c, f, color) in &[(0.0, 0.0, 0.1), (0.5, 0.0, 0.5), (0.0, 0.5, 0.9)] {
        let mut xf = Xform::new()
            .with_variation(Variation::new(VariationId::Linear, 1.0))
            .with_affine(Affine2D::new(0.5, 0.0, *c, 0.0, 0.5, *f));
        xf.color_x = *color;
        g.add_xform(xf);
    }
    g
}

fn render(genome: Genome, settings: RenderSettings) -> Vec<u8> {
    let mut renderer = Renderer::new(settings);
    renderer.set_genome(genome, ProcessAction::FullRender);
    let mut out = vec![0u8; renderer.final_buffer_size()];
    assert_eq!(renderer.run(&mut out, 0.0, 0, false, 0), RenderStatus::Ok);
    assert_eq!(renderer.state(), ProcessState::AccumDone);
    out
}

fn settings(threads: usize, seed: u64) -> RenderSettings {
    RenderSettings {
        threads,
        seed,
        sub_batch_size: 512,
        ..RenderSettings::default()
    }
}

#[test]
fn same_seed_same_image() {
    let a = render(gasket(32, 24), settings(3, 11));
    let b = render(gasket(32, 24), settings(3, 11));
    assert_eq!(a, b);
    assert!(a.iter().any(|&v| v != 0));
}

#[test]
fn different_seeds_differ() {
    let a = render(gasket(32, 24), settings(2, 1));
    let b = render(gasket(32, 24), settings(2, 2));
    assert_ne!(a, b);
}

#[test]
fn transparent_background_leaves_empty_pixels_clear() {
    let mut g = gasket(32, 32);
    g.center_x = 10.0;
    g.center_y = 10.0;
    let out = render(
        g,
        RenderSettings {
            transparency: true,
            ..settings(2, 5)
        },
    );
    assert!(out.chunks(4).all(|px| px[3] == 0));
}

#[test]
fn sixteen_bit_output_doubles_the_buffer() {
    let eight = render(gasket(16, 16), settings(1, 3));
    let sixteen = render(
        gasket(16, 16),
        RenderSettings {
            bytes_per_channel: 2,
            ..settings(1, 3)
        },
    );
    assert_eq!(sixteen.len(), 2 * eight.len());
}

#[test]
fn random_genomes_render() {
    let mut rng = IsaacRng::from_u64(99);
    for _ in 0..3 {
        let mut g = random_genome(&RandomOptions::default(), &mut rng);
        g.width = 20;
        g.height = 20;
        g.quality = 2.0;
        let mut renderer = Renderer::new(settings(2, 4));
        renderer.set_genome(g, ProcessAction::FullRender);
        let mut out = vec![0u8; renderer.final_buffer_size()];
        assert_eq!(renderer.run(&mut out, 0.0, 0, false, 0), RenderStatus::Ok);
    }
}

#[test]
fn interpolation_hits_its_endpoints() {
    let a = gasket(32, 24);
    let mut b = gasket(32, 24);
    b.brightness = 8.0;
    b.center_x = 1.5;
    b.time = 1.0;
    for xf in b.xforms_mut() {
        xf.color_x = 1.0 - xf.color_x;
    }

    let mut out = Genome::new();
    interpolate(&[a.clone(), b.clone()], &[1.0, 0.0], 0.0, &mut out);
    assert!((out.brightness - a.brightness).abs() < 1e-9);
    assert!((out.center_x - a.center_x).abs() < 1e-9);

    interpolate(&[a.clone(), b.clone()], &[0.0, 1.0], 0.0, &mut out);
    assert!((out.brightness - b.brightness).abs() < 1e-9);
    for (x, y) in out.xforms().iter().zip(b.xforms()) {
        assert!((x.color_x - y.color_x).abs() < 1e-9);
        assert!((x.affine.origin().0 - y.affine.origin().0).abs() < 1e-9);
    }

    interpolate(&[a, b], &[0.5, 0.5], 0.0, &mut out);
    assert!((out.brightness - 6.0).abs() < 1e-9);
}

#[test]
fn keyframed_animation_renders_each_frame() {
    let a = gasket(24, 24);
    let mut b = gasket(24, 24);
    b.time = 1.0;
    b.center_x = 0.25;
    let mut renderer = Renderer::new(settings(2, 8));
    renderer.set_keyframes(vec![b, a], ProcessAction::FullRender);
    let mut out = vec![0u8; renderer.final_buffer_size()];
    let mut frames = Vec::new();
    for &t in &[0.0, 0.5, 1.0] {
        assert_eq!(renderer.run(&mut out, t, 0, false, 0), RenderStatus::Ok);
        let cx = renderer.current_genome().map(|g| g.center_x);
        frames.push(cx);
    }
    assert_eq!(frames[0], Some(0.5));
    assert_eq!(frames[1], Some(0.375));
    assert_eq!(frames[2], Some(0.25));
}

#[test]
fn spatial_kernels_are_normalized() {
    for &kind in SpatialFilterType::ALL.iter() {
        for &ss in &[1, 2, 3] {
            let f = SpatialFilter::new(kind, 1.0, ss, 1.0).unwrap();
            let sum: f64 = f.kernel().iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{} ss {} sums to {}", kind.name(), ss, sum);
            assert_eq!(f.width() % 2, ss % 2);
        }
    }
}

#[test]
fn symmetry_adds_rotations() {
    let mut g = gasket(16, 16);
    let mut rng = IsaacRng::from_u64(1);
    assert_eq!(g.add_symmetry(4, &mut rng), 3);
    assert_eq!(g.xform_count(), 6);
    assert_eq!(g.symmetry, 4);
    for xf in &g.xforms()[3..] {
        assert_eq!(xf.weight, 1.0);
        assert_eq!(xf.color_speed, 0.0);
    }

    let mut m = gasket(16, 16);
    assert_eq!(m.add_symmetry(-2, &mut rng), 2);
    assert_eq!(m.add_symmetry(1, &mut rng), 0);
}
