// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Random genomes, for the command line and for tests that want
//! something more interesting than a Sierpinski gasket.

use crate::affine::Affine2D;
use crate::genome::Genome;
use crate::isaac::IsaacRng;
use crate::palette::Palette;
use crate::variation::{Variation, VariationId};
use crate::xform::Xform;
use rand::seq::SliceRandom;
use rand::Rng;

/// Limits for `random_genome`.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomOptions {
    /// At least two xforms are always made.
    pub max_xforms: usize,
    /// Variations per xform, at most.
    pub max_variations: usize,
    /// Variations to draw from; empty means all of them.
    pub variations: Vec<VariationId>,
    /// Probability of adding a final xform.
    pub final_chance: f64,
    /// Probability that an xaos entry is zeroed.
    pub xaos_chance: f64,
    /// None adds no symmetry, `Some(0)` picks one at random.
    pub symmetry: Option<i32>,
}

impl Default for RandomOptions {
    fn default() -> Self {
        RandomOptions {
            max_xforms: 4,
            max_variations: 3,
            variations: Vec::new(),
            final_chance: 0.2,
            xaos_chance: 0.0,
            symmetry: None,
        }
    }
}

fn random_affine(rng: &mut IsaacRng) -> Affine2D {
    Affine2D::new(
        rng.next_f11(),
        rng.next_f11(),
        rng.next_f11(),
        rng.next_f11(),
        rng.next_f11(),
        rng.next_f11(),
    )
}

fn random_variations(opts: &RandomOptions, rng: &mut IsaacRng) -> Vec<Variation> {
    let pool: &[VariationId] = if opts.variations.is_empty() {
        VariationId::ALL
    } else {
        &opts.variations
    };
    let count = 1 + rng.next_up_to(opts.max_variations.max(1) as u32) as usize;
    let mut vars = Vec::with_capacity(count);
    for _ in 0..count {
        if let Some(id) = pool.choose(rng) {
            let mut var = Variation::new(*id, rng.gen_range(0.2, 1.0));
            var.randomize_params(rng);
            vars.push(var);
        }
    }
    vars
}

/// A random genome with a random palette, optionally made symmetric.
pub fn random_genome(opts: &RandomOptions, rng: &mut IsaacRng) -> Genome {
    let mut genome = Genome::new();
    genome.name = "random".to_string();
    genome.palette = Palette::random(rng);

    let n = 2 + rng.next_up_to(opts.max_xforms.max(2) as u32 - 1) as usize;
    for i in 0..n {
        let mut xf = Xform::new();
        xf.weight = rng.gen_range(0.1, 1.0);
        xf.color_x = i as f64 / (n - 1) as f64;
        xf.affine = random_affine(rng);
        for var in random_variations(opts, rng) {
            xf.add_variation(var);
        }
        genome.add_xform(xf);
    }

    if opts.xaos_chance > 0.0 {
        for from in 0..n {
            for to in 0..n {
                if rng.next_f01() < opts.xaos_chance {
                    genome.xforms_mut()[from].set_xaos(to, 0.0);
                }
            }
        }
    }

    if rng.next_f01() < opts.final_chance {
        let mut fin = Xform::new_final().with_variation(Variation::new(VariationId::Linear, 1.0));
        for mut var in random_variations(opts, rng).into_iter().take(1) {
            var.weight *= 0.5;
            fin.add_variation(var);
        }
        genome.set_final_xform(fin);
    }

    if let Some(sym) = opts.symmetry {
        genome.add_symmetry(sym, rng);
    }

    genome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_genomes_are_reproducible() {
        let opts = RandomOptions::default();
        let a = random_genome(&opts, &mut IsaacRng::from_u64(11));
        let b = random_genome(&opts, &mut IsaacRng::from_u64(11));
        assert_eq!(a, b);
        assert!(a.check().is_ok());
    }

    #[test]
    fn options_bound_the_shape() {
        let opts = RandomOptions {
            max_xforms: 3,
            max_variations: 1,
            variations: vec![VariationId::Swirl],
            final_chance: 0.0,
            ..RandomOptions::default()
        };
        let mut rng = IsaacRng::from_u64(2);
        for _ in 0..20 {
            let g = random_genome(&opts, &mut rng);
            assert!(g.xform_count() >= 2 && g.xform_count() <= 3);
            assert!(!g.has_final_xform());
            for xf in g.xforms() {
                assert_eq!(xf.variation_count(), 1);
                assert_eq!(xf.variations()[0].id(), VariationId::Swirl);
            }
        }
    }

    #[test]
    fn symmetry_is_added_on_request() {
        let opts = RandomOptions {
            max_xforms: 2,
            symmetry: Some(3),
            final_chance: 0.0,
            ..RandomOptions::default()
        };
        let g = random_genome(&opts, &mut IsaacRng::from_u64(4));
        assert_eq!(g.xform_count(), 4);
        assert_eq!(g.symmetry, 3);
    }
}
