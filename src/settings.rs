// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Renderer configuration that is not part of any genome.

use crate::accum::OutputFormat;
use crate::error::{RenderError, Result};

/// Renderer settings that do not belong to a genome.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Iteration threads.
    pub threads: usize,
    /// Master seed; every worker generator is derived from it.
    pub seed: u64,
    /// Iterations each worker runs per sub-batch.
    pub sub_batch_size: usize,
    /// 3 for RGB, 4 for RGBA.
    pub channels: usize,
    /// 1 or 2; two bytes are little-endian.
    pub bytes_per_channel: usize,
    /// Leave the background's alpha at zero.
    pub transparency: bool,
    /// Put the first output row at the bottom.
    pub y_axis_up: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            threads: num_cpus::get(),
            seed: 0,
            sub_batch_size: 10240,
            channels: 4,
            bytes_per_channel: 1,
            transparency: false,
            y_axis_up: false,
        }
    }
}

impl RenderSettings {
    /// Rejects settings the renderer cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RenderError::InvalidSettings(
                "at least one thread is required".to_string(),
            ));
        }
        if self.sub_batch_size == 0 {
            return Err(RenderError::InvalidSettings(
                "sub-batch size must be positive".to_string(),
            ));
        }
        if self.channels != 3 && self.channels != 4 {
            return Err(RenderError::InvalidSettings(format!(
                "{} channels; only 3 and 4 are supported",
                self.channels
            )));
        }
        if self.bytes_per_channel != 1 && self.bytes_per_channel != 2 {
            return Err(RenderError::InvalidSettings(format!(
                "{} bytes per channel; only 1 and 2 are supported",
                self.bytes_per_channel
            )));
        }
        Ok(())
    }

    /// The buffer layout these settings produce.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            channels: self.channels,
            bytes_per_channel: self.bytes_per_channel,
            transparency: self.transparency,
            y_axis_up: self.y_axis_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = RenderSettings::default();
        assert!(s.threads >= 1);
        assert!(s.validate().is_ok());
        assert_eq!(s.output_format().stride(10), 40);
    }

    #[test]
    fn unsupported_layouts_are_rejected() {
        let bad = [
            RenderSettings { threads: 0, ..RenderSettings::default() },
            RenderSettings { channels: 2, ..RenderSettings::default() },
            RenderSettings { bytes_per_channel: 4, ..RenderSettings::default() },
            RenderSettings { sub_batch_size: 0, ..RenderSettings::default() },
        ];
        for s in &bad {
            match s.validate() {
                Err(RenderError::InvalidSettings(_)) => {}
                other => panic!("{:?} accepted: {:?}", s, other),
            }
        }
    }
}
