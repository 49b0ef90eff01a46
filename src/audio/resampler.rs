//! Fixed-block resampling for the pull path.
//!
//! The mixer asks for exactly 10 ms at its own rate, while decoders emit at
//! the codec clock rate. [`PushResampler`] takes one 10 ms input block and
//! always returns one 10 ms output block, smoothing over rubato's internal
//! chunking with a small per-channel FIFO.

use std::collections::VecDeque;

use anyhow::Result;
use rubato::{FftFixedIn, Resampler};
use tracing::info;

use crate::audio::frame::samples_per_10ms;
use crate::audio::sample::{AudioSample, convert};

pub struct PushResampler {
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    inner: FftFixedIn<f32>,
    output_fifo: Vec<VecDeque<f32>>,
}

impl PushResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        if channels == 0 {
            anyhow::bail!("Resampler needs at least one channel");
        }
        let chunk = samples_per_10ms(input_rate);
        if chunk == 0 || samples_per_10ms(output_rate) == 0 {
            anyhow::bail!("Unsupported resampling {}Hz -> {}Hz", input_rate, output_rate);
        }

        let inner = FftFixedIn::<f32>::new(
            input_rate as usize,
            output_rate as usize,
            chunk,
            1,
            channels,
        )?;
        info!(
            "Created resampler {}Hz -> {}Hz, {} channel(s)",
            input_rate, output_rate, channels
        );

        Ok(Self {
            input_rate,
            output_rate,
            channels,
            inner,
            output_fifo: vec![VecDeque::new(); channels],
        })
    }

    pub fn matches(&self, input_rate: u32, output_rate: u32, channels: usize) -> bool {
        self.input_rate == input_rate && self.output_rate == output_rate && self.channels == channels
    }

    /// Resamples one 10 ms block of interleaved samples.
    ///
    /// Returns exactly `output_rate / 100` samples per channel, interleaved.
    pub fn process_10ms(&mut self, input: &[i16]) -> Result<Vec<i16>> {
        let in_frames = samples_per_10ms(self.input_rate);
        if input.len() != in_frames * self.channels {
            anyhow::bail!(
                "Expected {} input samples, got {}",
                in_frames * self.channels,
                input.len()
            );
        }

        let floats: Vec<f32> = convert(input);
        let planar: Vec<Vec<f32>> = (0..self.channels)
            .map(|ch| {
                floats
                    .iter()
                    .skip(ch)
                    .step_by(self.channels)
                    .copied()
                    .collect()
            })
            .collect();

        let resampled = self.inner.process(&planar, None)?;
        for (fifo, channel) in self.output_fifo.iter_mut().zip(resampled) {
            fifo.extend(channel);
        }

        let out_frames = samples_per_10ms(self.output_rate);
        let mut output = Vec::with_capacity(out_frames * self.channels);
        for _ in 0..out_frames {
            for fifo in self.output_fifo.iter_mut() {
                let sample = fifo.pop_front().unwrap_or_else(f32::silence);
                output.push(i16::from_f64_normalized(sample as f64));
            }
        }
        Ok(output)
    }
}
