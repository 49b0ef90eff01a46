use std::sync::atomic::Ordering;

use crate::audio::{AudioFrame, AudioFrameInfo};
use crate::stream::coordinator::StreamCore;

/// Pull side of a receive stream, called once per mixer tick.
pub trait MixerSource: Send + Sync {
    /// Fills `frame` with exactly 10 ms at `sample_rate_hz`.
    ///
    /// No data yet, underrun and a stopped stream all yield
    /// [`AudioFrameInfo::Muted`].
    fn get_audio_frame_with_info(&self, sample_rate_hz: u32, frame: &mut AudioFrame)
    -> AudioFrameInfo;

    /// Current remote SSRC. Follows reconfiguration.
    fn ssrc(&self) -> u32;

    /// Native rate of the active codec.
    fn preferred_sample_rate(&self) -> u32;
}

impl MixerSource for StreamCore {
    fn get_audio_frame_with_info(
        &self,
        sample_rate_hz: u32,
        frame: &mut AudioFrame,
    ) -> AudioFrameInfo {
        // Pairs with the Release in start()/stop().
        if !self.playing.load(Ordering::Acquire) {
            frame.mute(sample_rate_hz, frame.num_channels);
            frame.ssrc = self.ssrc();
            return AudioFrameInfo::Muted;
        }
        self.channel.get_audio_frame(sample_rate_hz, frame)
    }

    fn ssrc(&self) -> u32 {
        self.remote_ssrc.load(Ordering::Acquire)
    }

    fn preferred_sample_rate(&self) -> u32 {
        self.channel.preferred_sample_rate()
    }
}
