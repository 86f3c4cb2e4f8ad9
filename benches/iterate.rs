// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;
extern crate flamegen;

use criterion::{black_box, Criterion};
use flamegen::iterator::{iterate, Camera, IterState, Point, XformSelector};
use flamegen::{random_genome, IsaacRng, ProcessAction, RandomOptions, RenderSettings, Renderer};
use std::sync::atomic::AtomicBool;

fn chaos_game(c: &mut Criterion) {
    let mut rng = IsaacRng::from_u64(1);
    let genome = random_genome(&RandomOptions::default(), &mut rng);
    let selector = XformSelector::new(&genome).unwrap();
    let camera = Camera::from_genome(&genome);
    let mut state = IterState::new(IsaacRng::from_u64(2));
    let mut samples = vec![Point::default(); 10240];
    let abort = AtomicBool::new(false);
    c.bench_function("iterate 10240", move |b| {
        b.iter(|| {
            iterate(
                &genome,
                &selector,
                &camera,
                genome.fuse_count,
                &mut state,
                black_box(&mut samples),
                &abort,
            )
        })
    });
}

fn full_render(c: &mut Criterion) {
    let mut rng = IsaacRng::from_u64(3);
    let mut genome = random_genome(&RandomOptions::default(), &mut rng);
    genome.width = 64;
    genome.height = 64;
    genome.quality = 5.0;
    let settings = RenderSettings {
        threads: 2,
        ..RenderSettings::default()
    };
    c.bench_function("render 64x64", move |b| {
        b.iter(|| {
            let mut renderer = Renderer::new(settings);
            renderer.set_genome(genome.clone(), ProcessAction::FullRender);
            let mut out = vec![0u8; renderer.final_buffer_size()];
            black_box(renderer.run(&mut out, 0.0, 0, false, 0))
        })
    });
}

criterion_group!(benches, chaos_game, full_render);
criterion_main!(benches);
