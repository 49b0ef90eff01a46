//! Output gain.

use crossbeam::atomic::AtomicCell;

use crate::audio::frame::AudioFrame;
use crate::audio::sample::AudioSample;

/// Linear gain applied to every rendered frame.
///
/// The factor is read on each pull, so control threads can change it
/// without taking the engine lock. Values above 1.0 amplify; samples
/// saturate at the i16 range.
pub struct Gain {
    factor: AtomicCell<f32>,
}

impl Gain {
    pub fn new(factor: f32) -> Self {
        Self {
            factor: AtomicCell::new(factor),
        }
    }

    pub fn set(&self, factor: f32) {
        self.factor.store(factor);
    }

    pub fn get(&self) -> f32 {
        self.factor.load()
    }

    pub fn apply(&self, frame: &mut AudioFrame) {
        let factor = self.factor.load();
        if factor == 1.0 || frame.muted {
            return;
        }
        for sample in frame.data_mut() {
            *sample = i16::from_f64_normalized(sample.to_f64_normalized() * factor as f64);
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}
