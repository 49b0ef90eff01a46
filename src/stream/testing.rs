//! Shared fixtures for stream tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::audio::{AudioFrame, AudioFrameInfo};
use crate::call::{AudioState, MemoryEventLog, PacketRouter, SendStreamRtt};
use crate::channel::decoder::encode_l16;
use crate::channel::{
    AudioSink, BuiltinDecoderFactory, ChannelProxy, ChannelStats, NetworkState, RtpSource,
    SdpAudioFormat, SyncInfo,
};
use crate::clock::{Clock, SimulatedClock};
use crate::error::Result;
use crate::receiver::SsrcDemuxer;
use crate::rtp::rtcp::serialize_compound;
use crate::rtp::extension::AUDIO_LEVEL_URI;
use crate::rtp::{ExtensionIds, NtpTime, RtcpPacket, RtpExtension, RtpPacketReceived, SenderReport};
use crate::stream::{AudioReceiveStream, MixerSource, PlayoutInfo, ReceiveStreamConfig, Syncable};

pub const PT: u8 = 96;
pub const LOCAL_SSRC: u32 = 0x2222;

/// 16 kHz mono L16 on payload type 96.
pub fn test_config(remote_ssrc: u32) -> ReceiveStreamConfig {
    let mut config = ReceiveStreamConfig::default();
    config.rtp.remote_ssrc = remote_ssrc;
    config.rtp.local_ssrc = LOCAL_SSRC;
    config.rtp.extensions = vec![RtpExtension::new(AUDIO_LEVEL_URI, 1)];
    config
        .decoder_map
        .insert(PT, SdpAudioFormat::new("L16", 16000, 1));
    config.sync_group = "av".to_string();
    config
}

/// 20 ms of 16 kHz mono filled with `value`.
pub fn l16_packet(ssrc: u32, seq: u16, value: i16) -> RtpPacketReceived {
    let samples = vec![value; 320];
    RtpPacketReceived::new(ssrc, seq, seq as u32 * 320, PT, encode_l16(&samples))
}

pub fn sender_report(ssrc: u32, rtp_timestamp: u32, ntp: NtpTime) -> Vec<u8> {
    serialize_compound(&[RtcpPacket::SenderReport(SenderReport {
        ssrc,
        ntp,
        rtp_timestamp,
        packet_count: 1,
        octet_count: 640,
        report_blocks: vec![],
    })])
    .to_vec()
}

pub fn pull(source: &dyn MixerSource, rate: u32) -> (AudioFrameInfo, AudioFrame) {
    let mut frame = AudioFrame::default();
    let info = source.get_audio_frame_with_info(rate, &mut frame);
    (info, frame)
}

pub struct Harness {
    pub clock: Arc<SimulatedClock>,
    pub audio_state: Arc<AudioState>,
    pub demuxer: Arc<SsrcDemuxer>,
    pub router: Arc<PacketRouter>,
    pub events: Arc<MemoryEventLog>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(SimulatedClock::new(10_000));
        let audio_state = Arc::new(AudioState::new(
            Arc::new(BuiltinDecoderFactory),
            clock.clone() as Arc<dyn Clock>,
        ));
        Self {
            clock,
            audio_state,
            demuxer: Arc::new(SsrcDemuxer::new()),
            router: Arc::new(PacketRouter::new()),
            events: Arc::new(MemoryEventLog::new()),
        }
    }

    pub fn stream(&self, config: ReceiveStreamConfig) -> Result<AudioReceiveStream> {
        AudioReceiveStream::new(
            self.demuxer.clone(),
            self.router.clone(),
            config,
            self.audio_state.clone(),
            self.events.clone(),
        )
    }
}

pub struct NullSyncable;

impl Syncable for NullSyncable {
    fn id(&self) -> u32 {
        0
    }

    fn get_info(&self) -> Option<PlayoutInfo> {
        None
    }

    fn get_playout_timestamp(&self) -> u32 {
        0
    }

    fn set_minimum_playout_delay(&self, _delay_ms: i32) {}
}

pub struct FixedRtt {
    pub ssrc: u32,
    pub rtt_ms: i64,
}

impl SendStreamRtt for FixedRtt {
    fn ssrc(&self) -> u32 {
        self.ssrc
    }

    fn rtt_ms(&self) -> Option<i64> {
        Some(self.rtt_ms)
    }
}

/// Engine stand-in that records which setters were called.
#[derive(Default)]
pub struct RecordingChannel {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingChannel {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl ChannelProxy for RecordingChannel {
    fn set_local_ssrc(&self, _ssrc: u32) {
        self.record("set_local_ssrc");
    }

    fn set_remote_ssrc(&self, _ssrc: u32) {
        self.record("set_remote_ssrc");
    }

    fn set_extension_ids(&self, _ids: ExtensionIds) {
        self.record("set_extension_ids");
    }

    fn set_nack_status(&self, _enabled: bool, _max_packets: usize) {
        self.record("set_nack_status");
    }

    fn set_receive_codecs(&self, _codecs: &BTreeMap<u8, SdpAudioFormat>) -> Result<()> {
        self.record("set_receive_codecs");
        Ok(())
    }

    fn set_base_minimum_playout_delay(&self, _delay_ms: i32) {
        self.record("set_base_minimum_playout_delay");
    }

    fn set_minimum_playout_delay(&self, _delay_ms: i32) {
        self.record("set_minimum_playout_delay");
    }

    fn start_playout(&self) {
        self.record("start_playout");
    }

    fn stop_playout(&self) {
        self.record("stop_playout");
    }

    fn set_network_state(&self, _state: NetworkState) {
        self.record("set_network_state");
    }

    fn set_rtt_source(&self, _source: Option<Weak<dyn SendStreamRtt>>) {
        self.record("set_rtt_source");
    }

    fn on_rtp_packet(&self, _packet: &RtpPacketReceived) {
        self.record("on_rtp_packet");
    }

    fn process_rtcp(&self, _data: &[u8]) -> Result<()> {
        self.record("process_rtcp");
        Ok(())
    }

    fn get_audio_frame(&self, sample_rate_hz: u32, frame: &mut AudioFrame) -> AudioFrameInfo {
        self.record("get_audio_frame");
        frame.mute(sample_rate_hz, 1);
        AudioFrameInfo::Muted
    }

    fn get_stats(&self) -> ChannelStats {
        ChannelStats::default()
    }

    fn get_sync_info(&self) -> Option<SyncInfo> {
        None
    }

    fn playout_timestamp(&self) -> Option<u32> {
        None
    }

    fn preferred_sample_rate(&self) -> u32 {
        48000
    }

    fn set_sink(&self, _sink: Option<Box<dyn AudioSink>>) {
        self.record("set_sink");
    }

    fn set_gain(&self, _gain: f32) {
        self.record("set_gain");
    }

    fn output_level(&self) -> u16 {
        0
    }

    fn sources(&self) -> Vec<RtpSource> {
        Vec::new()
    }
}
