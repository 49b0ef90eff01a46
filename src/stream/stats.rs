use serde::Serialize;

use crate::channel::{ChannelStats, DecodingStats};
use crate::stream::ReceiveStreamConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Created,
    Started,
    Stopped,
}

/// Snapshot returned by [`crate::AudioReceiveStream::get_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiveStreamStats {
    pub remote_ssrc: u32,
    pub bytes_received: u64,
    pub packets_received: u64,
    pub packets_lost: i32,
    /// Loss since the previous snapshot, 0.0..=1.0.
    pub fraction_lost: f32,
    pub codec_name: Option<String>,
    pub ext_seq_num: u64,
    pub jitter_ms: u32,
    pub jitter_buffer_ms: u32,
    pub jitter_buffer_preferred_ms: u32,
    pub delay_estimate_ms: u32,
    pub audio_level: u16,
    pub total_output_energy: f64,
    pub total_output_duration: f64,
    pub decoding: DecodingStats,
    pub capture_start_ntp_time_ms: Option<i64>,
    pub rtt_ms: Option<i64>,
    pub state: StreamState,
}

impl ReceiveStreamStats {
    pub(crate) fn aggregate(
        channel: ChannelStats,
        config: &ReceiveStreamConfig,
        state: StreamState,
    ) -> Self {
        let codec_name = channel
            .payload_type
            .and_then(|pt| config.decoder_map.get(&pt))
            .map(|format| format.name.clone());

        Self {
            remote_ssrc: config.rtp.remote_ssrc,
            bytes_received: channel.bytes_received,
            packets_received: channel.packets_received,
            packets_lost: channel.packets_lost.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            fraction_lost: channel.fraction_lost as f32 / 256.0,
            codec_name,
            ext_seq_num: channel.ext_seq_num,
            jitter_ms: channel.jitter_ms,
            jitter_buffer_ms: channel.jitter_buffer_ms,
            jitter_buffer_preferred_ms: channel.jitter_buffer_preferred_ms,
            delay_estimate_ms: channel
                .jitter_buffer_ms
                .max(channel.jitter_buffer_preferred_ms),
            audio_level: channel.audio_level,
            total_output_energy: channel.total_output_energy,
            total_output_duration: channel.total_output_duration,
            decoding: channel.decoding,
            capture_start_ntp_time_ms: channel.capture_start_ntp_time_ms,
            rtt_ms: channel.rtt_ms,
            state,
        }
    }
}
