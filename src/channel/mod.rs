//! Decode engine.
//!
//! [`ChannelProxy`] is the seam between the stream coordinator and whatever
//! turns RTP into PCM. [`ChannelReceive`] is the reference engine: it decodes
//! on arrival, orders by sequence number, conceals gaps with silence, and
//! renders 10 ms frames at the mixer's rate.

pub mod decoder;
pub mod nack;
pub mod receive;
pub mod reorder_buffer;
pub mod source_tracker;
pub mod statistics;

use std::collections::BTreeMap;
use std::sync::Weak;

use serde::Serialize;

use crate::audio::{AudioFrame, AudioFrameInfo};
use crate::call::SendStreamRtt;
use crate::error::Result;
use crate::rtp::{ExtensionIds, NtpTime, RtpPacketReceived};

pub use decoder::{AudioDecoder, AudioDecoderFactory, BuiltinDecoderFactory, SdpAudioFormat};
pub use receive::ChannelReceive;
pub use source_tracker::{RtpSource, RtpSourceType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NetworkState {
    #[default]
    Up,
    Down,
}

/// Decoder call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodingStats {
    pub calls_to_get_audio_frame: u64,
    pub decoded_normal: u64,
    pub decoded_concealed: u64,
    pub muted_output: u64,
    pub decode_errors: u64,
}

/// Engine-level receive statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelStats {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_lost: i64,
    /// Loss since the previous snapshot, 1/256 units.
    pub fraction_lost: u8,
    pub ext_seq_num: u64,
    pub jitter_ms: u32,
    pub jitter_buffer_ms: u32,
    pub jitter_buffer_preferred_ms: u32,
    pub decoding: DecodingStats,
    /// Payload type of the last decoded packet.
    pub payload_type: Option<u8>,
    pub capture_start_ntp_time_ms: Option<i64>,
    /// Associated send stream's RTT, else RTT from our own report blocks.
    pub rtt_ms: Option<i64>,
    pub nack_packets_sent: u64,
    pub audio_level: u16,
    pub total_output_energy: f64,
    pub total_output_duration: f64,
    pub last_packet_received_ms: Option<i64>,
}

/// Raw timing the engine exposes for audio/video sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncInfo {
    pub sender_report_ntp: NtpTime,
    pub sender_report_rtp: u32,
    pub latest_received_rtp_timestamp: u32,
    pub latest_receive_ntp: NtpTime,
    pub playout_timestamp_rtp: u32,
    pub clock_rate_hz: u32,
    pub current_delay_ms: i32,
    pub estimated_playout_time_ms: i64,
}

/// A rendered frame as seen by a raw audio sink.
#[derive(Debug)]
pub struct AudioSinkData<'a> {
    pub samples: &'a [i16],
    pub samples_per_channel: usize,
    pub sample_rate_hz: u32,
    pub num_channels: usize,
    pub timestamp: u32,
}

/// Receives a copy of every rendered frame, after gain.
///
/// Called on the mixer thread once the engine state lock is released, so
/// `on_data` may query the channel. It must not call `set_sink`.
pub trait AudioSink: Send {
    fn on_data(&mut self, data: &AudioSinkData<'_>);
}

/// Operations the coordinator needs from a decode engine.
///
/// Every method takes `&self`; implementations synchronize internally.
/// Control and network threads call most methods, the mixer thread calls
/// [`ChannelProxy::get_audio_frame`].
pub trait ChannelProxy: Send + Sync {
    fn set_local_ssrc(&self, ssrc: u32);

    fn set_remote_ssrc(&self, ssrc: u32);

    fn set_extension_ids(&self, ids: ExtensionIds);

    fn set_nack_status(&self, enabled: bool, max_packets: usize);

    fn set_receive_codecs(&self, codecs: &BTreeMap<u8, SdpAudioFormat>) -> Result<()>;

    /// Floor from configuration. Always honored.
    fn set_base_minimum_playout_delay(&self, delay_ms: i32);

    /// Floor requested by audio/video sync.
    fn set_minimum_playout_delay(&self, delay_ms: i32);

    fn start_playout(&self);

    fn stop_playout(&self);

    fn set_network_state(&self, state: NetworkState);

    /// Send stream to ask for RTT before falling back to our own reports.
    fn set_rtt_source(&self, source: Option<Weak<dyn SendStreamRtt>>);

    fn on_rtp_packet(&self, packet: &RtpPacketReceived);

    /// Parses and applies a compound RTCP packet. Nothing is applied on error.
    fn process_rtcp(&self, data: &[u8]) -> Result<()>;

    fn get_audio_frame(&self, sample_rate_hz: u32, frame: &mut AudioFrame) -> AudioFrameInfo;

    fn get_stats(&self) -> ChannelStats;

    /// None until a sender report has arrived and a frame was rendered.
    fn get_sync_info(&self) -> Option<SyncInfo>;

    fn playout_timestamp(&self) -> Option<u32>;

    fn preferred_sample_rate(&self) -> u32;

    fn set_sink(&self, sink: Option<Box<dyn AudioSink>>);

    fn set_gain(&self, gain: f32);

    fn output_level(&self) -> u16;

    fn sources(&self) -> Vec<RtpSource>;
}
