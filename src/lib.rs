#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fractal flame renderer
//!
//! A fractal flame is the attractor of an iterated function system
//! whose functions are affine transforms followed by weighted sums of
//! nonlinear "variations".  Playing the chaos game with such a system
//! (start anywhere, repeatedly apply a randomly chosen function) sends
//! a point wandering over the attractor.  Every place the point lands
//! is counted in a histogram, together with a color that drifts toward
//! the color of each function applied.
//!
//! The histogram is mostly empty space and a few enormously dense
//! spots, so it is shown on a log scale.  Sparse regions are noisy;
//! density estimation blurs each cell by a radius that shrinks as the
//! cell fills up.  A spatial filter then downsamples the supersampled
//! histogram, and gamma, vibrancy, and highlight power turn densities
//! into colors.
//!
//! A `Genome` describes one flame.  Genomes can be blended with
//! `interpolate`, which is how animations are made, and a `Renderer`
//! turns one into pixels.

#[macro_use]
extern crate log;

extern crate crossbeam;
extern crate failure;
extern crate itertools;
extern crate num;
extern crate num_cpus;
extern crate rand;

pub mod accum;
pub mod affine;
pub mod density;
pub mod error;
pub mod genome;
pub mod interpolate;
pub mod isaac;
pub mod iterator;
pub mod palette;
pub mod planes;
pub mod random;
pub mod renderer;
pub mod settings;
pub mod spatial;
pub mod temporal;
pub mod variation;
pub mod xform;

pub use crate::error::{ErrorReport, RenderError};
pub use crate::genome::Genome;
pub use crate::interpolate::{interpolate, interpolate_at};
pub use crate::isaac::IsaacRng;
pub use crate::random::{random_genome, RandomOptions};
pub use crate::renderer::{
    render_progressive, ProcessAction, ProcessState, RenderStatus, Renderer,
};
pub use crate::settings::RenderSettings;
pub use crate::xform::Xform;
