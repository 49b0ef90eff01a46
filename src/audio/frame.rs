use anyhow::Result;

/// Outcome of one pull from a mixer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFrameInfo {
    /// The frame carries decoded audio.
    Normal,
    /// The frame is silence: no data yet, underrun, or stream stopped.
    Muted,
    /// Unrecoverable internal failure. The frame content is silence.
    Error,
}

/// One 10 ms block of interleaved 16-bit PCM handed to the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub ssrc: u32,
    /// RTP timestamp of the first sample.
    pub timestamp: u32,
    pub sample_rate_hz: u32,
    pub num_channels: usize,
    pub samples_per_channel: usize,
    pub muted: bool,
    data: Vec<i16>,
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self {
            ssrc: 0,
            timestamp: 0,
            sample_rate_hz: 48000,
            num_channels: 1,
            samples_per_channel: 0,
            muted: true,
            data: Vec::new(),
        }
    }
}

pub const fn samples_per_10ms(sample_rate_hz: u32) -> usize {
    (sample_rate_hz / 100) as usize
}

/// Whether 10 ms at this rate is a whole number of samples. Rates such as
/// 22050 Hz are not, and would drift by a fraction of a sample per frame.
pub const fn has_whole_10ms_frames(sample_rate_hz: u32) -> bool {
    sample_rate_hz > 0 && sample_rate_hz % 100 == 0
}

impl AudioFrame {
    /// Replaces the frame content.
    ///
    /// Returns an error if `data` does not hold exactly
    /// `samples_per_channel * num_channels` samples.
    pub fn update(
        &mut self,
        timestamp: u32,
        data: &[i16],
        samples_per_channel: usize,
        sample_rate_hz: u32,
        num_channels: usize,
    ) -> Result<()> {
        if num_channels == 0 || data.len() != samples_per_channel * num_channels {
            anyhow::bail!(
                "Data length {} does not match {} samples x {} channels",
                data.len(),
                samples_per_channel,
                num_channels
            );
        }

        self.timestamp = timestamp;
        self.sample_rate_hz = sample_rate_hz;
        self.num_channels = num_channels;
        self.samples_per_channel = samples_per_channel;
        self.muted = false;
        self.data.clear();
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Turns the frame into 10 ms of silence at the given format.
    pub fn mute(&mut self, sample_rate_hz: u32, num_channels: usize) {
        let num_channels = num_channels.max(1);
        self.sample_rate_hz = sample_rate_hz;
        self.num_channels = num_channels;
        self.samples_per_channel = samples_per_10ms(sample_rate_hz);
        self.muted = true;
        self.data.clear();
        self.data.resize(self.samples_per_channel * num_channels, 0);
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [i16] {
        &mut self.data
    }

    pub fn iter_channel(&self, channel_idx: usize) -> impl Iterator<Item = &i16> {
        assert!(
            channel_idx < self.num_channels,
            "Channel index {} out of bounds (max {})",
            channel_idx,
            self.num_channels - 1
        );
        self.data.iter().skip(channel_idx).step_by(self.num_channels)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples_per_channel as f64 / self.sample_rate_hz as f64
    }

    /// Converts between mono and stereo in place. Other layouts are left alone.
    pub fn remix(&mut self, num_channels: usize) {
        if num_channels == self.num_channels {
            return;
        }
        match (self.num_channels, num_channels) {
            (1, 2) => {
                self.data = self.data.iter().flat_map(|&s| [s, s]).collect();
            }
            (2, 1) => {
                self.data = self
                    .data
                    .chunks_exact(2)
                    .map(|lr| ((lr[0] as i32 + lr[1] as i32) / 2) as i16)
                    .collect();
            }
            _ => return,
        }
        self.num_channels = num_channels;
    }
}
