//! Audio primitives for the receive path.
//!
//! - [`frame`] - 10 ms PCM frames exchanged with the mixer
//! - [`sample`] - Sample format conversion
//! - [`gain`] - Lock-free output gain
//! - [`level`] - Output level and energy metering
//! - [`resampler`] - Codec rate to mixer rate conversion
//! - [`mixer`] - Sums registered mixer sources

pub mod frame;
pub mod gain;
pub mod level;
pub mod mixer;
pub mod resampler;
pub mod sample;

pub use frame::{AudioFrame, AudioFrameInfo};
pub use mixer::AudioMixer;
