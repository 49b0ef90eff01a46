//! Output level metering.
//!
//! Tracks the peak amplitude over a window of frames, plus the running
//! energy and duration totals that feed `totalAudioEnergy`-style stats.

use crate::audio::frame::AudioFrame;
use crate::audio::sample::AudioSample;

/// Frames per peak window.
const UPDATE_INTERVAL: u32 = 10;

#[derive(Debug, Default, Clone)]
pub struct AudioLevel {
    abs_max: u16,
    count: u32,
    current_level: u16,
    total_energy: f64,
    total_duration: f64,
}

impl AudioLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_level(&mut self, frame: &AudioFrame, duration_secs: f64) {
        let frame_max = if frame.muted {
            0
        } else {
            frame
                .data()
                .iter()
                .map(|s| s.unsigned_abs())
                .max()
                .unwrap_or(0)
                .min(i16::MAX as u16)
        };
        self.abs_max = self.abs_max.max(frame_max);

        self.count += 1;
        if self.count >= UPDATE_INTERVAL {
            self.current_level = self.abs_max;
            self.count = 0;
            // Decay instead of reset so short pauses do not read as silence.
            self.abs_max >>= 2;
        }

        let additive = (self.current_level as i16).to_f64_normalized();
        self.total_energy += additive * additive * duration_secs;
        self.total_duration += duration_secs;
    }

    /// Peak level in `0..=32767`.
    pub fn level(&self) -> u16 {
        self.current_level
    }

    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
