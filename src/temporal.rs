// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Temporal filters weight the time samples of a motion-blurred frame.

use crate::spatial::{gaussian, SpatialFilterType};

/// Weighting of the time samples in one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemporalFilterType {
    /// Equal weights.
    Box,
    /// Bell-shaped weights centered on the frame time.
    Gaussian,
    /// Power-law ramp from one edge; the exponent's sign picks the edge.
    Exp,
}

impl TemporalFilterType {
    /// Lower-case name used in flame files.
    pub fn name(self) -> &'static str {
        match self {
            TemporalFilterType::Box => "box",
            TemporalFilterType::Gaussian => "gaussian",
            TemporalFilterType::Exp => "exp",
        }
    }

    /// Inverse of `name`.
    pub fn from_name(name: &str) -> Option<TemporalFilterType> {
        match name {
            "box" => Some(TemporalFilterType::Box),
            "gaussian" => Some(TemporalFilterType::Gaussian),
            "exp" => Some(TemporalFilterType::Exp),
            _ => None,
        }
    }
}

/// Sample times and weights for motion blur.
#[derive(Clone, Debug, PartialEq)]
pub struct TemporalFilter {
    /// Weighting used.
    pub kind: TemporalFilterType,
    /// Time offsets of the samples, spread evenly over `[-width/2, width/2]`.
    pub deltas: Vec<f64>,
    /// Per-sample weights, the largest scaled to 1.
    pub weights: Vec<f64>,
    /// Mean of `weights`.
    pub sum_filt: f64,
}

impl TemporalFilter {
    /// Offsets and weights for `samples` steps spanning `width`.
    pub fn new(kind: TemporalFilterType, samples: usize, width: f64, exp: f64) -> Self {
        let n = samples.max(1);
        if n == 1 {
            return TemporalFilter {
                kind,
                deltas: vec![0.0],
                weights: vec![1.0],
                sum_filt: 1.0,
            };
        }

        let nf = n as f64;
        let deltas = (0..n)
            .map(|i| (i as f64 / (nf - 1.0) - 0.5) * width)
            .collect();

        let mut weights: Vec<f64> = match kind {
            TemporalFilterType::Box => vec![1.0; n],
            TemporalFilterType::Gaussian => {
                let half = nf / 2.0;
                let support = SpatialFilterType::Gaussian.support();
                (0..n)
                    .map(|i| gaussian(support * (i as f64 - half).abs() / half))
                    .collect()
            }
            TemporalFilterType::Exp => (0..n)
                .map(|i| {
                    let slope = if exp >= 0.0 {
                        (i as f64 + 1.0) / nf
                    } else {
                        (nf - i as f64) / nf
                    };
                    slope.powf(exp.abs())
                })
                .collect(),
        };

        let max = weights.iter().cloned().fold(0.0, f64::max);
        if max > 0.0 {
            for w in &mut weights {
                *w /= max;
            }
        }
        let sum_filt = weights.iter().sum::<f64>() / nf;

        TemporalFilter {
            kind,
            deltas,
            weights,
            sum_filt,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_is_unweighted() {
        for kind in &[TemporalFilterType::Box, TemporalFilterType::Gaussian, TemporalFilterType::Exp] {
            let f = TemporalFilter::new(*kind, 1, 2.0, 1.0);
            assert_eq!(f.deltas, vec![0.0]);
            assert_eq!(f.weights, vec![1.0]);
            assert_eq!(f.sum_filt, 1.0);
        }
    }

    #[test]
    fn box_spreads_deltas_over_the_width() {
        let f = TemporalFilter::new(TemporalFilterType::Box, 5, 2.0, 0.0);
        assert_eq!(f.deltas, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(f.sum_filt, 1.0);
    }

    #[test]
    fn sum_filt_is_the_mean_weight() {
        for kind in &[TemporalFilterType::Gaussian, TemporalFilterType::Exp] {
            let f = TemporalFilter::new(*kind, 16, 1.0, 2.0);
            let mean = f.weights.iter().sum::<f64>() / 16.0;
            assert!((f.sum_filt - mean).abs() < 1e-12);
            let max = f.weights.iter().cloned().fold(0.0, f64::max);
            assert!((max - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn exp_sign_picks_the_heavy_edge() {
        let rising = TemporalFilter::new(TemporalFilterType::Exp, 4, 1.0, 1.0);
        assert!(rising.weights[0] < rising.weights[3]);
        let falling = TemporalFilter::new(TemporalFilterType::Exp, 4, 1.0, -1.0);
        assert!(falling.weights[0] > falling.weights[3]);
        assert_eq!(falling.weights[0], 1.0);
    }

    #[test]
    fn gaussian_peaks_in_the_middle() {
        let f = TemporalFilter::new(TemporalFilterType::Gaussian, 9, 1.0, 0.0);
        assert!(f.weights[4] > f.weights[0]);
        assert!(f.weights[4] > f.weights[8]);
    }
}
