use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::audio::frame::{AudioFrame, AudioFrameInfo, samples_per_10ms};
use crate::stream::MixerSource;

/// Sums every registered source into one output frame per tick.
///
/// Sources are keyed by an owner id rather than SSRC, since a stream's
/// remote SSRC may change over its lifetime.
#[derive(Default)]
pub struct AudioMixer {
    sources: DashMap<u64, Arc<dyn MixerSource>>,
}

impl AudioMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `id` was already registered.
    pub fn add_source(&self, id: u64, source: Arc<dyn MixerSource>) -> bool {
        if self.sources.contains_key(&id) {
            return false;
        }
        debug!("Mixer: adding source {} (ssrc {:#010x})", id, source.ssrc());
        self.sources.insert(id, source);
        true
    }

    pub fn remove_source(&self, id: u64) -> bool {
        let removed = self.sources.remove(&id).is_some();
        if removed {
            debug!("Mixer: removed source {}", id);
        }
        removed
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Pulls 10 ms from every source and mixes into `output`.
    ///
    /// Returns the number of sources that contributed audio. The output is
    /// muted when none did.
    pub fn mix(&self, sample_rate_hz: u32, num_channels: usize, output: &mut AudioFrame) -> usize {
        let num_channels = num_channels.max(1);
        let samples_per_channel = samples_per_10ms(sample_rate_hz);
        let len = samples_per_channel * num_channels;

        // Snapshot so no shard lock is held while sources decode.
        let sources: Vec<(u64, Arc<dyn MixerSource>)> = self
            .sources
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut mixed: Vec<i32> = vec![0; len];
        let mut contributing = 0;
        let mut frame = AudioFrame::default();

        for (id, source) in sources {
            match source.get_audio_frame_with_info(sample_rate_hz, &mut frame) {
                AudioFrameInfo::Normal => {}
                AudioFrameInfo::Muted => continue,
                AudioFrameInfo::Error => {
                    warn!("Mixer: source {} reported an error, skipping", id);
                    continue;
                }
            }

            frame.remix(num_channels);
            if frame.data().len() != len {
                warn!(
                    "Frame size mismatch from source {}: {} != {}, skipping",
                    id,
                    frame.data().len(),
                    len
                );
                continue;
            }

            for (acc, &sample) in mixed.iter_mut().zip(frame.data()) {
                *acc += sample as i32;
            }
            contributing += 1;
        }

        if contributing == 0 {
            output.mute(sample_rate_hz, num_channels);
            return 0;
        }

        let clipped: Vec<i16> = mixed.into_iter().map(soft_clip).collect();
        if let Err(e) = output.update(0, &clipped, samples_per_channel, sample_rate_hz, num_channels)
        {
            warn!("Mixer: failed to fill output frame: {}", e);
            output.mute(sample_rate_hz, num_channels);
            return 0;
        }
        contributing
    }
}

/// Soft clipping using a tanh-like curve.
/// Prevents harsh distortion when the sum exceeds the i16 range.
fn soft_clip(sample: i32) -> i16 {
    const MAX: i32 = i16::MAX as i32;
    const MIN: i32 = i16::MIN as i32;

    if sample > MAX {
        let excess = (sample - MAX) as f32;
        let compressed = (excess / 10000.0).tanh() * 1000.0;
        (MAX as f32 + compressed).min(32767.0) as i16
    } else if sample < MIN {
        let excess = (sample - MIN) as f32;
        let compressed = (excess / 10000.0).tanh() * 1000.0;
        (MIN as f32 + compressed).max(-32768.0) as i16
    } else {
        sample as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantSource {
        value: i16,
        channels: usize,
        info: AudioFrameInfo,
    }

    impl MixerSource for ConstantSource {
        fn get_audio_frame_with_info(
            &self,
            sample_rate_hz: u32,
            frame: &mut AudioFrame,
        ) -> AudioFrameInfo {
            let spc = samples_per_10ms(sample_rate_hz);
            match self.info {
                AudioFrameInfo::Normal => {
                    let data = vec![self.value; spc * self.channels];
                    frame
                        .update(0, &data, spc, sample_rate_hz, self.channels)
                        .unwrap();
                }
                _ => frame.mute(sample_rate_hz, self.channels),
            }
            self.info
        }

        fn ssrc(&self) -> u32 {
            self.value as u32
        }

        fn preferred_sample_rate(&self) -> u32 {
            16000
        }
    }

    fn source(value: i16, channels: usize, info: AudioFrameInfo) -> Arc<dyn MixerSource> {
        Arc::new(ConstantSource {
            value,
            channels,
            info,
        })
    }

    #[test]
    fn test_soft_clip() {
        assert_eq!(soft_clip(0), 0);
        assert_eq!(soft_clip(16384), 16384);
        assert_eq!(soft_clip(32767), 32767);
        assert_eq!(soft_clip(-32768), -32768);
        assert_eq!(soft_clip(40000), 32767);
        assert_eq!(soft_clip(-40000), -32768);
    }

    #[test]
    fn test_mix_sums_normal_sources_only() {
        let mixer = AudioMixer::new();
        assert!(mixer.add_source(1, source(100, 1, AudioFrameInfo::Normal)));
        assert!(mixer.add_source(2, source(250, 2, AudioFrameInfo::Normal)));
        assert!(mixer.add_source(3, source(999, 1, AudioFrameInfo::Muted)));
        assert!(mixer.add_source(4, source(999, 1, AudioFrameInfo::Error)));
        assert!(!mixer.add_source(1, source(1, 1, AudioFrameInfo::Normal)));

        let mut out = AudioFrame::default();
        let n = mixer.mix(16000, 2, &mut out);

        assert_eq!(n, 2);
        assert!(!out.muted);
        assert_eq!(out.data().len(), 320);
        assert!(out.data().iter().all(|&s| s == 350));
    }

    #[test]
    fn test_mix_without_sources_is_muted() {
        let mixer = AudioMixer::new();
        mixer.add_source(7, source(5, 1, AudioFrameInfo::Normal));
        assert!(mixer.remove_source(7));
        assert!(!mixer.remove_source(7));

        let mut out = AudioFrame::default();
        assert_eq!(mixer.mix(48000, 1, &mut out), 0);
        assert!(out.muted);
        assert_eq!(out.samples_per_channel, 480);
    }
}
