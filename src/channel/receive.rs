use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam::atomic::AtomicCell;

use tracing::{debug, error, info, trace, warn};

use crate::audio::frame::{has_whole_10ms_frames, samples_per_10ms};
use crate::audio::gain::Gain;
use crate::audio::level::AudioLevel;
use crate::audio::resampler::PushResampler;
use crate::audio::{AudioFrame, AudioFrameInfo};
use crate::call::{PacketRouter, SendStreamRtt};
use crate::channel::decoder::{AudioDecoder, AudioDecoderFactory, SdpAudioFormat};
use crate::channel::nack::NackTracker;
use crate::channel::reorder_buffer::{PushOutcome, ReorderBuffer, Slot};
use crate::channel::source_tracker::{RtpSource, SourceTracker};
use crate::channel::statistics::StreamStatistician;
use crate::channel::{
    AudioSink, AudioSinkData, ChannelProxy, ChannelStats, DecodingStats, NetworkState, SyncInfo,
};
use crate::clock::Clock;
use crate::error::{Result, StreamError};
use crate::rtp::rtcp::{ReportBlock, parse_compound};
use crate::rtp::{
    ExtensionIds, GenericNack, NtpTime, RtcpPacket, RtpPacketReceived, rtp_to_ntp_ms,
};
use crate::rtp::ntp::compact_ntp_to_ms;

const REORDER_CAPACITY: usize = 64;
/// Buffered audio beyond this (or the minimum delay, if larger) is dropped.
const MAX_BUFFERED_MS: i32 = 1000;
const DEFAULT_SAMPLE_RATE_HZ: u32 = 48000;

struct DecodedPacket {
    rtp_timestamp: u32,
    samples: Vec<i16>,
    sample_rate_hz: u32,
    channels: usize,
}

impl DecodedPacket {
    fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn duration_ms(&self) -> f64 {
        self.samples_per_channel() as f64 * 1000.0 / self.sample_rate_hz as f64
    }
}

struct ReceiveCodec {
    format: SdpAudioFormat,
    decoder: Box<dyn AudioDecoder>,
}

#[derive(Debug, Clone, Copy)]
struct SenderReportInfo {
    ntp: NtpTime,
    rtp_timestamp: u32,
}

/// Decoded samples waiting to be cut into 10 ms output blocks.
#[derive(Default)]
struct PendingAudio {
    samples: VecDeque<i16>,
    /// (sample rate, channels) of `samples`.
    format: Option<(u32, usize)>,
    /// RTP timestamp of the front sample.
    rtp_timestamp: u32,
    /// Samples per channel of the last real packet, used to size concealment.
    last_packet_samples: usize,
}

impl PendingAudio {
    fn frames(&self) -> usize {
        match self.format {
            Some((_, channels)) => self.samples.len() / channels,
            None => 0,
        }
    }

    fn duration_ms(&self) -> f64 {
        match self.format {
            Some((rate, _)) => self.frames() as f64 * 1000.0 / rate as f64,
            None => 0.0,
        }
    }

    fn push_packet(&mut self, packet: DecodedPacket) {
        let format = (packet.sample_rate_hz, packet.channels);
        if self.format != Some(format) {
            if !self.samples.is_empty() {
                debug!(
                    "Format change {:?} -> {:?}, dropping {} pending samples",
                    self.format,
                    format,
                    self.samples.len()
                );
            }
            self.samples.clear();
            self.format = Some(format);
        }
        if self.samples.is_empty() {
            self.rtp_timestamp = packet.rtp_timestamp;
        }
        self.last_packet_samples = packet.samples_per_channel();
        self.samples.extend(packet.samples);
    }

    /// Appends one packet's worth of silence. Returns false if nothing was
    /// ever decoded, so the size is unknown.
    fn conceal(&mut self) -> bool {
        let Some((_, channels)) = self.format else {
            return false;
        };
        let count = self.last_packet_samples * channels;
        self.samples.extend(std::iter::repeat_n(0, count));
        true
    }

    /// Takes 10 ms if available: (rtp timestamp, samples, rate, channels).
    fn take_10ms(&mut self) -> Option<(u32, Vec<i16>, u32, usize)> {
        let (rate, channels) = self.format?;
        let frames = samples_per_10ms(rate);
        if self.frames() < frames {
            return None;
        }
        let samples: Vec<i16> = self.samples.drain(..frames * channels).collect();
        let timestamp = self.rtp_timestamp;
        self.rtp_timestamp = self.rtp_timestamp.wrapping_add(frames as u32);
        Some((timestamp, samples, rate, channels))
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

struct ChannelInner {
    local_ssrc: u32,
    remote_ssrc: u32,
    extension_ids: ExtensionIds,
    playing: bool,
    rtt_source: Option<Weak<dyn SendStreamRtt>>,

    codecs: BTreeMap<u8, ReceiveCodec>,
    last_payload_type: Option<u8>,

    statistician: StreamStatistician,
    nack: NackTracker,
    sources: SourceTracker,

    reorder: ReorderBuffer<DecodedPacket>,
    pending: PendingAudio,
    /// Waiting for enough audio to (re)start playout.
    buffering: bool,
    base_min_delay_ms: i32,
    min_delay_ms: i32,

    resampler: Option<PushResampler>,
    level: AudioLevel,
    decoding: DecodingStats,

    last_sr: Option<SenderReportInfo>,
    rtt_ms: Option<i64>,
    latest_received_rtp: Option<u32>,
    latest_receive_ntp: NtpTime,
    last_packet_received_ms: Option<i64>,
    playout_timestamp: Option<u32>,
    estimated_playout_time_ms: i64,
    capture_start_ntp_time_ms: Option<i64>,
    nack_packets_sent: u64,
}

impl ChannelInner {
    fn new() -> Self {
        Self {
            local_ssrc: 0,
            remote_ssrc: 0,
            extension_ids: ExtensionIds::default(),
            playing: false,
            rtt_source: None,
            codecs: BTreeMap::new(),
            last_payload_type: None,
            statistician: StreamStatistician::new(),
            nack: NackTracker::new(),
            sources: SourceTracker::default(),
            reorder: ReorderBuffer::new(REORDER_CAPACITY),
            pending: PendingAudio::default(),
            buffering: true,
            base_min_delay_ms: 0,
            min_delay_ms: 0,
            resampler: None,
            level: AudioLevel::new(),
            decoding: DecodingStats::default(),
            last_sr: None,
            rtt_ms: None,
            latest_received_rtp: None,
            latest_receive_ntp: NtpTime::default(),
            last_packet_received_ms: None,
            playout_timestamp: None,
            estimated_playout_time_ms: 0,
            capture_start_ntp_time_ms: None,
            nack_packets_sent: 0,
        }
    }

    /// Drops everything tied to the current remote stream.
    fn reset_stream(&mut self) {
        self.statistician.reset();
        self.nack.reset();
        self.sources.clear();
        self.reorder.clear();
        self.pending.clear();
        self.buffering = true;
        self.resampler = None;
        self.level.reset();
        self.last_payload_type = None;
        self.last_sr = None;
        self.latest_received_rtp = None;
        self.latest_receive_ntp = NtpTime::default();
        self.last_packet_received_ms = None;
        self.playout_timestamp = None;
        self.estimated_playout_time_ms = 0;
        self.capture_start_ntp_time_ms = None;
    }

    fn effective_min_delay_ms(&self) -> i32 {
        self.base_min_delay_ms.max(self.min_delay_ms)
    }

    fn buffered_ms(&self) -> i32 {
        let packets: f64 = self.reorder.iter_packets().map(|p| p.duration_ms()).sum();
        (packets + self.pending.duration_ms()).round() as i32
    }

    fn current_delay_ms(&self) -> i32 {
        self.buffered_ms().max(self.effective_min_delay_ms())
    }

    fn current_format(&self) -> Option<&SdpAudioFormat> {
        self.last_payload_type
            .and_then(|pt| self.codecs.get(&pt))
            .map(|codec| &codec.format)
    }

    fn output_channels(&self) -> usize {
        match self.pending.format {
            Some((_, channels)) => channels,
            None => self.current_format().map_or(1, |f| f.num_channels),
        }
    }

    /// Drops the oldest audio once the backlog is far above the target.
    fn catch_up(&mut self) {
        let target = self.effective_min_delay_ms();
        let limit = MAX_BUFFERED_MS.max(target + MAX_BUFFERED_MS / 2);
        let before = self.buffered_ms();
        if before <= limit {
            return;
        }

        self.pending.clear();
        while self.buffered_ms() > target && self.reorder.pop().is_some() {}
        info!(
            "Playout backlog {} ms exceeds {} ms, skipped ahead to {} ms",
            before,
            limit,
            self.buffered_ms()
        );
    }

    /// Pulls from the reorder buffer until 10 ms is ready or it runs dry.
    fn next_block(&mut self) -> Option<(u32, Vec<i16>, u32, usize)> {
        loop {
            if let Some(block) = self.pending.take_10ms() {
                return Some(block);
            }
            match self.reorder.pop()? {
                Slot::Packet(packet) => {
                    self.decoding.decoded_normal += 1;
                    self.pending.push_packet(packet);
                }
                Slot::Missing => {
                    if self.pending.conceal() {
                        self.decoding.decoded_concealed += 1;
                    }
                }
            }
        }
    }

    fn on_report_blocks(&mut self, blocks: &[ReportBlock], now: NtpTime) {
        for block in blocks {
            if block.ssrc != self.local_ssrc || block.last_sr == 0 {
                continue;
            }
            let rtt_compact = now
                .compact()
                .wrapping_sub(block.last_sr)
                .wrapping_sub(block.delay_since_last_sr);
            // Negative means clock skew or a bogus block.
            if rtt_compact & 0x8000_0000 != 0 {
                debug!("Ignoring report block with negative RTT");
                continue;
            }
            let rtt = compact_ntp_to_ms(rtt_compact).max(1);
            trace!("RTT from report block: {} ms", rtt);
            self.rtt_ms = Some(rtt);
        }
    }
}

/// Reference decode engine.
///
/// One mutex guards all stream state. Gain and network state live outside
/// it so they never wait for a decode. The sink has its own lock and is
/// called after the state lock is released.
pub struct ChannelReceive {
    inner: Mutex<ChannelInner>,
    sink: Mutex<Option<Box<dyn AudioSink>>>,
    gain: Gain,
    network_state: AtomicCell<NetworkState>,
    clock: Arc<dyn Clock>,
    decoder_factory: Arc<dyn AudioDecoderFactory>,
    packet_router: Arc<PacketRouter>,
}

impl ChannelReceive {
    pub fn new(
        clock: Arc<dyn Clock>,
        decoder_factory: Arc<dyn AudioDecoderFactory>,
        packet_router: Arc<PacketRouter>,
    ) -> Self {
        Self {
            inner: Mutex::new(ChannelInner::new()),
            sink: Mutex::new(None),
            gain: Gain::default(),
            network_state: AtomicCell::new(NetworkState::Up),
            clock,
            decoder_factory,
            packet_router,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_nack(&self, sender_ssrc: u32, media_ssrc: u32, lost: Vec<u16>) {
        let count = lost.len();
        let nack = RtcpPacket::GenericNack(GenericNack {
            sender_ssrc,
            media_ssrc,
            lost,
        });
        if self.packet_router.send_rtcp(&[nack]) {
            debug!("Sent NACK for {} packet(s) of {:#010x}", count, media_ssrc);
            self.lock().nack_packets_sent += 1;
        }
    }

    fn render(
        &self,
        inner: &mut ChannelInner,
        sample_rate_hz: u32,
        frame: &mut AudioFrame,
    ) -> AudioFrameInfo {
        let channels = inner.output_channels();

        if inner.buffering {
            let buffered = inner.buffered_ms();
            if buffered == 0 || buffered < inner.effective_min_delay_ms() {
                frame.mute(sample_rate_hz, channels);
                return AudioFrameInfo::Muted;
            }
            debug!("Playout starting with {} ms buffered", buffered);
            inner.buffering = false;
        }

        inner.catch_up();

        let Some((timestamp, samples, native_rate, channels)) = inner.next_block() else {
            trace!("Underrun, waiting to rebuffer");
            inner.buffering = true;
            frame.mute(sample_rate_hz, channels);
            return AudioFrameInfo::Muted;
        };

        let output = if native_rate == sample_rate_hz {
            samples
        } else {
            let needs_new = inner
                .resampler
                .as_ref()
                .is_none_or(|r| !r.matches(native_rate, sample_rate_hz, channels));
            if needs_new {
                match PushResampler::new(native_rate, sample_rate_hz, channels) {
                    Ok(r) => inner.resampler = Some(r),
                    Err(e) => {
                        error!("Failed to create resampler: {}", e);
                        frame.mute(sample_rate_hz, channels);
                        return AudioFrameInfo::Error;
                    }
                }
            }
            let resampled = inner
                .resampler
                .as_mut()
                .map(|r| r.process_10ms(&samples));
            match resampled {
                Some(Ok(out)) => out,
                Some(Err(e)) => {
                    error!("Resampling failed: {}", e);
                    frame.mute(sample_rate_hz, channels);
                    return AudioFrameInfo::Error;
                }
                None => {
                    frame.mute(sample_rate_hz, channels);
                    return AudioFrameInfo::Error;
                }
            }
        };

        let samples_per_channel = samples_per_10ms(sample_rate_hz);
        if let Err(e) = frame.update(timestamp, &output, samples_per_channel, sample_rate_hz, channels)
        {
            error!("Failed to fill audio frame: {}", e);
            frame.mute(sample_rate_hz, channels);
            return AudioFrameInfo::Error;
        }
        frame.ssrc = inner.remote_ssrc;

        self.gain.apply(frame);
        inner.level.compute_level(frame, frame.duration_secs());

        inner.playout_timestamp = Some(timestamp);
        let estimated = self.clock.now_ms() + inner.current_delay_ms() as i64;
        inner.estimated_playout_time_ms = inner.estimated_playout_time_ms.max(estimated);

        if inner.capture_start_ntp_time_ms.is_none()
            && let Some(sr) = inner.last_sr
        {
            inner.capture_start_ntp_time_ms =
                Some(rtp_to_ntp_ms(sr.ntp, sr.rtp_timestamp, timestamp, native_rate));
        }

        AudioFrameInfo::Normal
    }
}

impl ChannelProxy for ChannelReceive {
    fn set_local_ssrc(&self, ssrc: u32) {
        self.lock().local_ssrc = ssrc;
    }

    fn set_remote_ssrc(&self, ssrc: u32) {
        let mut inner = self.lock();
        if inner.remote_ssrc == ssrc {
            return;
        }
        info!(
            "Remote SSRC {:#010x} -> {:#010x}, resetting stream state",
            inner.remote_ssrc, ssrc
        );
        inner.remote_ssrc = ssrc;
        inner.reset_stream();
    }

    fn set_extension_ids(&self, ids: ExtensionIds) {
        self.lock().extension_ids = ids;
    }

    fn set_nack_status(&self, enabled: bool, max_packets: usize) {
        self.lock().nack.configure(enabled, max_packets);
    }

    fn set_receive_codecs(&self, codecs: &BTreeMap<u8, SdpAudioFormat>) -> Result<()> {
        if let Some((payload_type, format)) = codecs
            .iter()
            .find(|(_, format)| !self.decoder_factory.is_supported(format))
        {
            return Err(StreamError::Engine(format!(
                "No decoder for payload type {} ({}/{}/{})",
                payload_type, format.name, format.clock_rate_hz, format.num_channels
            )));
        }

        let mut inner = self.lock();
        let mut next = BTreeMap::new();
        for (&payload_type, format) in codecs {
            // Keep decoder state when the format did not change.
            if let Some(existing) = inner.codecs.remove(&payload_type)
                && existing.format == *format
            {
                next.insert(payload_type, existing);
                continue;
            }
            match self.decoder_factory.make_decoder(format) {
                Some(decoder) => {
                    next.insert(
                        payload_type,
                        ReceiveCodec {
                            format: format.clone(),
                            decoder,
                        },
                    );
                }
                None => error!(
                    "Decoder factory refused supported format {} for payload type {}",
                    format.name, payload_type
                ),
            }
        }

        info!("Receive codecs set: {} payload type(s)", next.len());
        inner.codecs = next;
        Ok(())
    }

    fn set_base_minimum_playout_delay(&self, delay_ms: i32) {
        self.lock().base_min_delay_ms = delay_ms.max(0);
    }

    fn set_minimum_playout_delay(&self, delay_ms: i32) {
        let mut inner = self.lock();
        if inner.min_delay_ms != delay_ms {
            debug!("Minimum playout delay {} -> {} ms", inner.min_delay_ms, delay_ms);
        }
        inner.min_delay_ms = delay_ms.max(0);
    }

    fn start_playout(&self) {
        let mut inner = self.lock();
        if !inner.playing {
            inner.playing = true;
            inner.buffering = true;
            info!("Playout started for {:#010x}", inner.remote_ssrc);
        }
    }

    fn stop_playout(&self) {
        let mut inner = self.lock();
        if inner.playing {
            inner.playing = false;
            info!("Playout stopped for {:#010x}", inner.remote_ssrc);
        }
    }

    fn set_network_state(&self, state: NetworkState) {
        let previous = self.network_state.swap(state);
        if previous != state {
            info!("Network state {:?} -> {:?}", previous, state);
        }
    }

    fn set_rtt_source(&self, source: Option<Weak<dyn SendStreamRtt>>) {
        self.lock().rtt_source = source;
    }

    fn on_rtp_packet(&self, packet: &RtpPacketReceived) {
        let now_ms = self.clock.now_ms();
        let now_ntp = self.clock.now_ntp();

        if self.network_state.load() == NetworkState::Down {
            trace!("Network down, dropping packet seq {}", packet.sequence_number);
            return;
        }

        let nack_request = {
            let mut inner = self.lock();
            let inner = &mut *inner;

            if packet.ssrc != inner.remote_ssrc {
                debug!(
                    "Dropping packet for SSRC {:#010x}, expecting {:#010x}",
                    packet.ssrc, inner.remote_ssrc
                );
                return;
            }
            let Some(codec) = inner.codecs.get_mut(&packet.payload_type) else {
                warn!(
                    "Unknown payload type {} from {:#010x}",
                    packet.payload_type, packet.ssrc
                );
                return;
            };

            let arrival_ms = if packet.arrival_time_ms > 0 {
                packet.arrival_time_ms
            } else {
                now_ms
            };
            let ext_seq = inner.statistician.on_packet(
                packet.sequence_number,
                packet.timestamp,
                arrival_ms,
                packet.payload.len(),
                codec.format.clock_rate_hz,
                packet.recovered,
            );
            inner.statistician.update_interval(now_ms);

            match codec.decoder.decode(&packet.payload) {
                Ok(samples) if !samples.is_empty() => {
                    let decoded = DecodedPacket {
                        rtp_timestamp: packet.timestamp,
                        samples,
                        sample_rate_hz: codec.decoder.sample_rate_hz(),
                        channels: codec.decoder.channels(),
                    };
                    match inner.reorder.push(ext_seq, decoded) {
                        PushOutcome::Buffered => {}
                        PushOutcome::Dropped => {
                            trace!("Late or duplicate packet seq {}", packet.sequence_number)
                        }
                        PushOutcome::Reset => {
                            info!(
                                "Sequence jump at {}, reorder buffer restarted",
                                packet.sequence_number
                            );
                            inner.pending.clear();
                        }
                    }
                }
                Ok(_) => trace!("Empty payload seq {}", packet.sequence_number),
                Err(e) => {
                    inner.decoding.decode_errors += 1;
                    warn!("Decode failed for seq {}: {}", packet.sequence_number, e);
                }
            }

            inner.last_payload_type = Some(packet.payload_type);
            inner
                .sources
                .on_packet(packet, now_ms, inner.extension_ids.audio_level);
            inner.latest_received_rtp = Some(packet.timestamp);
            inner.latest_receive_ntp = now_ntp;
            inner.last_packet_received_ms = Some(now_ms);

            if inner.nack.on_packet(ext_seq) {
                Some((inner.local_ssrc, inner.remote_ssrc, inner.nack.missing()))
            } else {
                None
            }
        };

        if let Some((sender_ssrc, media_ssrc, lost)) = nack_request {
            self.send_nack(sender_ssrc, media_ssrc, lost);
        }
    }

    fn process_rtcp(&self, data: &[u8]) -> Result<()> {
        let packets = parse_compound(data)?;
        let now = self.clock.now_ntp();

        let mut inner = self.lock();
        for packet in packets {
            match packet {
                RtcpPacket::SenderReport(sr) => {
                    if sr.ssrc == inner.remote_ssrc {
                        trace!(
                            "SR from {:#010x}: rtp {} ntp {:?}",
                            sr.ssrc, sr.rtp_timestamp, sr.ntp
                        );
                        inner.last_sr = Some(SenderReportInfo {
                            ntp: sr.ntp,
                            rtp_timestamp: sr.rtp_timestamp,
                        });
                    } else {
                        debug!("Ignoring SR from unrelated SSRC {:#010x}", sr.ssrc);
                    }
                    inner.on_report_blocks(&sr.report_blocks, now);
                }
                RtcpPacket::ReceiverReport(rr) => inner.on_report_blocks(&rr.report_blocks, now),
                RtcpPacket::GenericNack(_) | RtcpPacket::Other { .. } => {}
            }
        }
        Ok(())
    }

    fn get_audio_frame(&self, sample_rate_hz: u32, frame: &mut AudioFrame) -> AudioFrameInfo {
        let mut inner = self.lock();
        inner.decoding.calls_to_get_audio_frame += 1;

        if !has_whole_10ms_frames(sample_rate_hz) {
            error!("Mixer rate {} Hz has no whole 10 ms frame", sample_rate_hz);
            let channels = inner.output_channels();
            frame.mute(sample_rate_hz, channels);
            inner.decoding.muted_output += 1;
            return AudioFrameInfo::Error;
        }

        let info = if inner.playing {
            self.render(&mut inner, sample_rate_hz, frame)
        } else {
            let channels = inner.output_channels();
            frame.mute(sample_rate_hz, channels);
            AudioFrameInfo::Muted
        };
        if info != AudioFrameInfo::Normal {
            inner.decoding.muted_output += 1;
            return info;
        }
        drop(inner);

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sink.as_mut() {
            sink.on_data(&AudioSinkData {
                samples: frame.data(),
                samples_per_channel: frame.samples_per_channel,
                sample_rate_hz: frame.sample_rate_hz,
                num_channels: frame.num_channels,
                timestamp: frame.timestamp,
            });
        }
        info
    }

    fn get_stats(&self) -> ChannelStats {
        let inner = self.lock();
        let fraction_lost = inner.statistician.fraction_lost();
        let send_stream_rtt = inner
            .rtt_source
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|s| s.rtt_ms())
            .or_else(|| self.packet_router.send_stream_rtt(inner.local_ssrc));
        ChannelStats {
            packets_received: inner.statistician.packets_received(),
            bytes_received: inner.statistician.bytes_received(),
            packets_lost: inner.statistician.packets_lost(),
            fraction_lost,
            ext_seq_num: inner.statistician.extended_highest_sequence_number(),
            jitter_ms: inner.statistician.jitter_ms(),
            jitter_buffer_ms: inner.buffered_ms().max(0) as u32,
            jitter_buffer_preferred_ms: inner.effective_min_delay_ms().max(0) as u32,
            decoding: inner.decoding,
            payload_type: inner.last_payload_type,
            capture_start_ntp_time_ms: inner.capture_start_ntp_time_ms,
            rtt_ms: send_stream_rtt.or(inner.rtt_ms),
            nack_packets_sent: inner.nack_packets_sent,
            audio_level: inner.level.level(),
            total_output_energy: inner.level.total_energy(),
            total_output_duration: inner.level.total_duration(),
            last_packet_received_ms: inner.last_packet_received_ms,
        }
    }

    fn get_sync_info(&self) -> Option<SyncInfo> {
        let inner = self.lock();
        let sr = inner.last_sr?;
        let playout_timestamp_rtp = inner.playout_timestamp?;
        let latest_received_rtp_timestamp = inner.latest_received_rtp?;
        let clock_rate_hz = inner.current_format()?.clock_rate_hz;

        Some(SyncInfo {
            sender_report_ntp: sr.ntp,
            sender_report_rtp: sr.rtp_timestamp,
            latest_received_rtp_timestamp,
            latest_receive_ntp: inner.latest_receive_ntp,
            playout_timestamp_rtp,
            clock_rate_hz,
            current_delay_ms: inner.current_delay_ms(),
            estimated_playout_time_ms: inner.estimated_playout_time_ms,
        })
    }

    fn playout_timestamp(&self) -> Option<u32> {
        self.lock().playout_timestamp
    }

    fn preferred_sample_rate(&self) -> u32 {
        self.lock()
            .current_format()
            .map_or(DEFAULT_SAMPLE_RATE_HZ, |f| f.clock_rate_hz)
    }

    fn set_sink(&self, sink: Option<Box<dyn AudioSink>>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    fn set_gain(&self, gain: f32) {
        self.gain.set(gain);
    }

    fn output_level(&self) -> u16 {
        self.lock().level.level()
    }

    fn sources(&self) -> Vec<RtpSource> {
        let now_ms = self.clock.now_ms();
        self.lock().sources.sources(now_ms)
    }
}
