use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrame, AudioFrameInfo};
use crate::call::{AudioState, EventLog, PacketRouter, SendStreamRtt, StreamEvent};
use crate::channel::{AudioSink, ChannelProxy, ChannelReceive, NetworkState, RtpSource};
use crate::error::{Result, StreamError};
use crate::receiver::{RtpPacketSink, RtpStreamReceiver, RtpStreamReceiverController};
use crate::rtp::RtpPacketReceived;
use crate::stream::{
    ConfigDiff, ConfigReconciler, MixerSource, PlayoutInfo, ReceiveStreamConfig,
    ReceiveStreamStats, StreamState, Syncable,
};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between the control handle and the pull/sync handles.
pub(crate) struct StreamCore {
    pub(crate) channel: Arc<dyn ChannelProxy>,
    pub(crate) playing: AtomicBool,
    pub(crate) remote_ssrc: AtomicU32,
    pub(crate) sync_id: u32,
}

struct ChannelPacketSink {
    channel: Arc<dyn ChannelProxy>,
}

impl RtpPacketSink for ChannelPacketSink {
    fn on_rtp_packet(&self, packet: &RtpPacketReceived) {
        self.channel.on_rtp_packet(packet);
    }
}

/// One inbound audio stream.
///
/// This is the control handle: construction, reconfiguration, start/stop,
/// RTCP delivery and stats. The mixer and the AV-sync controller get their
/// own handles through [`AudioReceiveStream::mixer_source`] and
/// [`AudioReceiveStream::syncable`].
///
/// `reconfigure` must not run concurrently with a mixer pull. Packet
/// delivery during a re-registration may lose packets unless the caller
/// serializes the two.
pub struct AudioReceiveStream {
    id: u64,
    config: ReceiveStreamConfig,
    core: Arc<StreamCore>,
    audio_state: Arc<AudioState>,
    receiver_controller: Arc<dyn RtpStreamReceiverController>,
    rtp_receiver: Box<dyn RtpStreamReceiver>,
    packet_sink: Arc<dyn RtpPacketSink>,
    event_log: Arc<dyn EventLog>,
    started_once: AtomicBool,
}

impl AudioReceiveStream {
    /// Builds a stream around the reference decode engine.
    ///
    /// Fails with [`StreamError::Registration`] if the SSRC is taken and with
    /// [`StreamError::ConfigRejected`] if the config is invalid. No stream
    /// exists after a failure.
    pub fn new(
        receiver_controller: Arc<dyn RtpStreamReceiverController>,
        packet_router: Arc<PacketRouter>,
        config: ReceiveStreamConfig,
        audio_state: Arc<AudioState>,
        event_log: Arc<dyn EventLog>,
    ) -> Result<Self> {
        let channel = Arc::new(ChannelReceive::new(
            audio_state.clock().clone(),
            audio_state.decoder_factory().clone(),
            packet_router,
        ));
        Self::with_channel(receiver_controller, config, audio_state, event_log, channel)
    }

    /// Like [`AudioReceiveStream::new`] with a caller-supplied decode engine.
    pub fn with_channel(
        receiver_controller: Arc<dyn RtpStreamReceiverController>,
        config: ReceiveStreamConfig,
        audio_state: Arc<AudioState>,
        event_log: Arc<dyn EventLog>,
        channel: Arc<dyn ChannelProxy>,
    ) -> Result<Self> {
        ConfigReconciler::validate(&config, audio_state.decoder_factory().as_ref())?;

        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let core = Arc::new(StreamCore {
            channel: channel.clone(),
            playing: AtomicBool::new(false),
            remote_ssrc: AtomicU32::new(config.rtp.remote_ssrc),
            sync_id: config.rtp.remote_ssrc,
        });
        let packet_sink: Arc<dyn RtpPacketSink> = Arc::new(ChannelPacketSink { channel });

        let rtp_receiver = receiver_controller
            .create_receiver(config.receiver_spec(id), packet_sink.clone())
            .inspect_err(|e| error!("Receive stream {} not created: {}", id, e))?;

        let weak: Weak<StreamCore> = Arc::downgrade(&core);
        let syncable: Weak<dyn Syncable> = weak;
        ConfigReconciler::new(
            core.channel.as_ref(),
            audio_state.decoder_factory().as_ref(),
            audio_state.sync_groups(),
            id,
            syncable,
        )
        .apply(None, &config)?;

        info!(
            "Created receive stream {} for SSRC {:#010x}",
            id, config.rtp.remote_ssrc
        );
        event_log.log(StreamEvent::Created {
            remote_ssrc: config.rtp.remote_ssrc,
            config: config.clone(),
        });

        Ok(Self {
            id,
            config,
            core,
            audio_state,
            receiver_controller,
            rtp_receiver,
            packet_sink,
            event_log,
            started_once: AtomicBool::new(false),
        })
    }

    /// Process-unique stream id. Used as the registration owner and the
    /// mixer key.
    pub fn stream_id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &ReceiveStreamConfig {
        &self.config
    }

    /// Replaces the config.
    ///
    /// Only the fields that differ are pushed to the engine, so an unchanged
    /// SSRC keeps the jitter buffer and playout position. A new SSRC, RTX
    /// setup or extension id set re-registers with the receiver controller.
    /// On error the previous config stays in force.
    pub fn reconfigure(&mut self, config: ReceiveStreamConfig) -> Result<ConfigDiff> {
        let diff = ConfigDiff::between(&self.config, &config);
        if diff.is_empty() {
            debug!("Stream {} reconfigured with identical config", self.id);
            return Ok(diff);
        }

        ConfigReconciler::validate(&config, self.audio_state.decoder_factory().as_ref())
            .inspect_err(|e| warn!("Stream {} keeps its config: {}", self.id, e))?;

        let previous_receiver = if diff.requires_reregistration() {
            let receiver = self
                .receiver_controller
                .create_receiver(config.receiver_spec(self.id), self.packet_sink.clone())
                .map_err(|e| {
                    warn!("Stream {} keeps its config: {}", self.id, e);
                    StreamError::ConfigRejected(e.to_string())
                })?;
            Some(std::mem::replace(&mut self.rtp_receiver, receiver))
        } else {
            None
        };

        let applied = self.reconciler().apply(Some(&self.config), &config);
        if let Err(e) = applied {
            warn!("Stream {} keeps its config: {}", self.id, e);
            if let Some(previous) = previous_receiver {
                self.restore_receiver(previous);
            }
            return Err(e);
        }
        if let Some(previous) = previous_receiver {
            debug!(
                "Stream {} re-registered: {:?} -> {:?}",
                self.id,
                previous.spec(),
                self.rtp_receiver.spec()
            );
            // Releases only the old registration's routes.
            drop(previous);
        }

        self.core
            .remote_ssrc
            .store(config.rtp.remote_ssrc, Ordering::Release);
        self.config = config;

        info!("Reconfigured stream {}: {:?}", self.id, diff);
        self.event_log.log(StreamEvent::Reconfigured {
            remote_ssrc: self.config.rtp.remote_ssrc,
            diff,
        });
        Ok(diff)
    }

    fn restore_receiver(&mut self, previous: Box<dyn RtpStreamReceiver>) {
        // The new registration may have taken over SSRCs the old one shared,
        // so dropping it leaves those unrouted. Claim them again.
        let replacement = std::mem::replace(&mut self.rtp_receiver, previous);
        drop(replacement);
        match self
            .receiver_controller
            .create_receiver(self.config.receiver_spec(self.id), self.packet_sink.clone())
        {
            Ok(receiver) => self.rtp_receiver = receiver,
            Err(e) => error!("Stream {} could not restore its registration: {}", self.id, e),
        }
    }

    fn reconciler(&self) -> ConfigReconciler<'_> {
        let weak: Weak<StreamCore> = Arc::downgrade(&self.core);
        ConfigReconciler::new(
            self.core.channel.as_ref(),
            self.audio_state.decoder_factory().as_ref(),
            self.audio_state.sync_groups(),
            self.id,
            weak,
        )
    }

    /// Starts playout. The first call also adds the stream to the mixer.
    pub fn start(&self) {
        if !self.started_once.swap(true, Ordering::AcqRel) {
            let source: Arc<dyn MixerSource> = self.core.clone();
            self.audio_state.mixer().add_source(self.id, source);
        }

        self.core.channel.start_playout();
        // Pairs with the Acquire on the pull path.
        if self.core.playing.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Stream {} started", self.id);
        self.event_log.log(StreamEvent::Started {
            remote_ssrc: self.ssrc(),
        });
    }

    /// Mutes the pull path. Decode state is kept for an instant resume.
    pub fn stop(&self) {
        if !self.core.playing.swap(false, Ordering::AcqRel) {
            return;
        }
        self.core.channel.stop_playout();
        info!("Stream {} stopped", self.id);
        self.event_log.log(StreamEvent::Stopped {
            remote_ssrc: self.ssrc(),
        });
    }

    pub fn state(&self) -> StreamState {
        if self.core.playing.load(Ordering::Acquire) {
            StreamState::Started
        } else if self.started_once.load(Ordering::Acquire) {
            StreamState::Stopped
        } else {
            StreamState::Created
        }
    }

    pub fn get_stats(&self) -> ReceiveStreamStats {
        ReceiveStreamStats::aggregate(self.core.channel.get_stats(), &self.config, self.state())
    }

    pub fn set_sink(&self, sink: Option<Box<dyn AudioSink>>) {
        self.core.channel.set_sink(sink);
    }

    /// Scales decoded output. Values above 1.0 amplify.
    pub fn set_gain(&self, gain: f32) {
        self.core.channel.set_gain(gain);
    }

    /// Uses `send_stream` for RTT lookups until cleared. Only a weak
    /// reference is kept.
    pub fn associate_send_stream(&self, send_stream: Option<&Arc<dyn SendStreamRtt>>) {
        self.core
            .channel
            .set_rtt_source(send_stream.map(Arc::downgrade));
    }

    pub fn signal_network_state(&self, state: NetworkState) {
        self.core.channel.set_network_state(state);
    }

    /// Hands a compound RTCP packet to the engine.
    ///
    /// Fails with [`StreamError::NotStarted`] before `start` or after `stop`,
    /// and with [`StreamError::MalformedRtcp`] on bad bytes. Nothing changes on
    /// failure. Reports dropped while stopped are not replayed; the RTP to NTP
    /// mapping refreshes with the first sender report after the next `start`.
    pub fn deliver_rtcp(&self, data: &[u8]) -> Result<()> {
        if !self.core.playing.load(Ordering::Acquire) {
            return Err(StreamError::NotStarted);
        }
        self.core
            .channel
            .process_rtcp(data)
            .inspect_err(|e| warn!("Stream {} dropped RTCP: {}", self.id, e))
    }

    /// Feeds a packet straight to the engine, bypassing the receiver
    /// controller.
    pub fn on_rtp_packet(&self, packet: &RtpPacketReceived) {
        self.core.channel.on_rtp_packet(packet);
    }

    pub fn get_output_level(&self) -> u16 {
        self.core.channel.output_level()
    }

    pub fn get_sources(&self) -> Vec<RtpSource> {
        self.core.channel.sources()
    }

    pub fn mixer_source(&self) -> Arc<dyn MixerSource> {
        self.core.clone()
    }

    pub fn syncable(&self) -> Arc<dyn Syncable> {
        self.core.clone()
    }
}

impl MixerSource for AudioReceiveStream {
    fn get_audio_frame_with_info(
        &self,
        sample_rate_hz: u32,
        frame: &mut AudioFrame,
    ) -> AudioFrameInfo {
        self.core.get_audio_frame_with_info(sample_rate_hz, frame)
    }

    fn ssrc(&self) -> u32 {
        MixerSource::ssrc(self.core.as_ref())
    }

    fn preferred_sample_rate(&self) -> u32 {
        self.core.preferred_sample_rate()
    }
}

impl Syncable for AudioReceiveStream {
    fn id(&self) -> u32 {
        self.core.id()
    }

    fn get_info(&self) -> Option<PlayoutInfo> {
        self.core.get_info()
    }

    fn get_playout_timestamp(&self) -> u32 {
        self.core.get_playout_timestamp()
    }

    fn set_minimum_playout_delay(&self, delay_ms: i32) {
        self.core.set_minimum_playout_delay(delay_ms);
    }
}

impl Drop for AudioReceiveStream {
    fn drop(&mut self) {
        if self.core.playing.swap(false, Ordering::AcqRel) {
            self.core.channel.stop_playout();
        }
        self.audio_state
            .sync_groups()
            .leave(&self.config.sync_group, self.id);
        self.audio_state.mixer().remove_source(self.id);
        info!("Destroyed receive stream {}", self.id);
        self.event_log.log(StreamEvent::Destroyed {
            remote_ssrc: self.config.rtp.remote_ssrc,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SdpAudioFormat;
    use crate::clock::Clock;
    use crate::rtp::NtpTime;
    use crate::stream::testing::{
        FixedRtt, Harness, RecordingChannel, l16_packet, pull, sender_report, test_config,
    };

    const SSRC: u32 = 12345;

    fn started(harness: &Harness) -> AudioReceiveStream {
        let stream = harness.stream(test_config(SSRC)).unwrap();
        stream.start();
        stream
    }

    #[test]
    fn test_sender_report_populates_playout_info() {
        let h = Harness::new();
        let stream = started(&h);
        let sync = stream.syncable();

        assert!(h.demuxer.deliver(l16_packet(SSRC, 0, 100)));
        assert!(h.demuxer.deliver(l16_packet(SSRC, 1, 100)));
        assert_eq!(pull(stream.mixer_source().as_ref(), 16000).0, AudioFrameInfo::Normal);
        assert!(sync.get_info().is_none());

        let sr_ntp = h.clock.now_ntp();
        stream.deliver_rtcp(&sender_report(SSRC, 0, sr_ntp)).unwrap();
        let info = sync.get_info().unwrap();
        assert_eq!(info.sender_report_ntp, sr_ntp);
        assert_eq!(info.sender_report_rtp, 0);
        assert_eq!(info.playout_timestamp_rtp, 0);
        assert_eq!(info.estimated_playout_ntp.to_ms(), sr_ntp.to_ms());

        let good = sender_report(SSRC, 16000, NtpTime::from_ms(sr_ntp.to_ms() + 1000));
        let err = stream.deliver_rtcp(&good[..good.len() - 3]).unwrap_err();
        assert!(matches!(err, StreamError::MalformedRtcp(_)));
        assert_eq!(sync.get_info(), Some(info));
    }

    #[test]
    fn test_start_stop_start_resumes_output() {
        let h = Harness::new();
        let stream = started(&h);
        let source = stream.mixer_source();
        for seq in 0..4 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 500));
        }

        assert_eq!(pull(source.as_ref(), 16000).0, AudioFrameInfo::Normal);
        let before = stream.get_playout_timestamp();

        stream.stop();
        stream.stop();
        assert_eq!(stream.state(), StreamState::Stopped);
        let (info, frame) = pull(source.as_ref(), 16000);
        assert_eq!(info, AudioFrameInfo::Muted);
        assert!(frame.data().iter().all(|&s| s == 0));
        assert_eq!(stream.get_playout_timestamp(), before);

        stream.start();
        let (info, frame) = pull(source.as_ref(), 16000);
        assert_eq!(info, AudioFrameInfo::Normal);
        assert!(frame.data().iter().all(|&s| s == 500));
        assert!(stream.get_playout_timestamp() > before);

        let events = h.events.events();
        let transitions = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    StreamEvent::Started { .. } | StreamEvent::Stopped { .. }
                )
            })
            .count();
        assert_eq!(transitions, 3);
    }

    #[test]
    fn test_pull_before_any_packet_is_muted() {
        let h = Harness::new();
        let stream = h.stream(test_config(SSRC)).unwrap();
        assert_eq!(stream.state(), StreamState::Created);
        assert_eq!(pull(&stream, 48000).0, AudioFrameInfo::Muted);

        stream.start();
        let (info, frame) = pull(&stream, 48000);
        assert_eq!(info, AudioFrameInfo::Muted);
        assert_eq!(frame.samples_per_channel, 480);
    }

    #[test]
    fn test_estimated_playout_time_is_monotonic() {
        let h = Harness::new();
        let stream = started(&h);
        stream.on_rtp_packet(&l16_packet(SSRC, 0, 1));
        pull(&stream, 16000);
        stream
            .deliver_rtcp(&sender_report(SSRC, 0, h.clock.now_ntp()))
            .unwrap();

        let mut last = stream.get_info().unwrap().estimated_playout_time_ms;
        for seq in 1..10 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 1));
            h.clock.advance_ms(10);
            pull(&stream, 16000);
            let now = stream.get_info().unwrap().estimated_playout_time_ms;
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_negative_minimum_delay_is_ignored() {
        let h = Harness::new();
        let stream = started(&h);
        for seq in 0..5 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 1));
        }
        stream
            .deliver_rtcp(&sender_report(SSRC, 0, h.clock.now_ntp()))
            .unwrap();
        pull(&stream, 16000);

        let before = stream.get_info().unwrap().current_delay_ms;
        stream.syncable().set_minimum_playout_delay(-1);
        assert_eq!(stream.get_info().unwrap().current_delay_ms, before);
    }

    #[test]
    fn test_codec_change_keeps_playout_position() {
        let h = Harness::new();
        let mut stream = started(&h);
        for seq in 0..4 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 7));
        }
        pull(&stream, 16000);
        pull(&stream, 16000);
        let before = stream.get_playout_timestamp();
        assert_eq!(before, 160);

        let mut config = stream.config().clone();
        config
            .decoder_map
            .insert(97, SdpAudioFormat::new("L16", 48000, 2));
        let diff = stream.reconfigure(config).unwrap();
        assert!(diff.decoder_map);
        assert!(!diff.requires_reregistration());

        h.clock.advance_ms(10);
        pull(&stream, 16000);
        // 10 ms at 16 kHz.
        assert_eq!(stream.get_playout_timestamp(), before + 160);
    }

    #[test]
    fn test_conflicting_ssrc_fails_construction() {
        let h = Harness::new();
        let _first = h.stream(test_config(SSRC)).unwrap();
        let err = h.stream(test_config(SSRC)).err().unwrap();
        assert!(matches!(err, StreamError::Registration { ssrc: SSRC, .. }));
        assert_eq!(h.audio_state.sync_groups().members("av").len(), 1);
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let h = Harness::new();
        let mut config = test_config(SSRC);
        config.initial_min_playout_delay_ms = -10;
        assert!(matches!(
            h.stream(config).err(),
            Some(StreamError::ConfigRejected(_))
        ));
        assert!(!h.demuxer.is_registered(SSRC));
    }

    #[test]
    fn test_ssrc_change_reregisters() {
        let h = Harness::new();
        let mut stream = started(&h);
        let source = stream.mixer_source();

        let mut config = stream.config().clone();
        config.rtp.remote_ssrc = 777;
        let diff = stream.reconfigure(config).unwrap();
        assert!(diff.remote_ssrc);

        assert!(!h.demuxer.is_registered(SSRC));
        assert!(h.demuxer.is_registered(777));
        assert!(!h.demuxer.deliver(l16_packet(SSRC, 0, 1)));
        assert!(h.demuxer.deliver(l16_packet(777, 0, 9)));
        assert_eq!(source.ssrc(), 777);
        // Sync identity stays with the original SSRC.
        assert_eq!(stream.syncable().id(), SSRC);

        let (info, frame) = pull(source.as_ref(), 16000);
        assert_eq!(info, AudioFrameInfo::Normal);
        assert_eq!(frame.ssrc, 777);
    }

    #[test]
    fn test_extension_change_keeps_routing() {
        let h = Harness::new();
        let mut stream = started(&h);
        let mut config = stream.config().clone();
        config.rtp.extensions[0].id = 3;

        let diff = stream.reconfigure(config).unwrap();
        assert!(diff.extension_ids);
        assert!(h.demuxer.is_registered(SSRC));
        assert!(h.demuxer.deliver(l16_packet(SSRC, 0, 1)));
    }

    #[test]
    fn test_rejected_reconfigure_keeps_config() {
        let h = Harness::new();
        let other = h.stream(test_config(999)).unwrap();
        let mut stream = started(&h);
        let original = stream.config().clone();

        let mut unsupported = original.clone();
        unsupported
            .decoder_map
            .insert(111, SdpAudioFormat::new("opus", 48000, 2));
        assert!(matches!(
            stream.reconfigure(unsupported),
            Err(StreamError::ConfigRejected(_))
        ));

        let mut taken = original.clone();
        taken.rtp.remote_ssrc = 999;
        assert!(matches!(
            stream.reconfigure(taken),
            Err(StreamError::ConfigRejected(_))
        ));

        assert_eq!(stream.config(), &original);
        assert!(h.demuxer.deliver(l16_packet(SSRC, 0, 1)));
        assert_eq!(stream.get_stats().packets_received, 1);
        drop(other);
    }

    #[test]
    fn test_rtcp_before_start_fails() {
        let h = Harness::new();
        let stream = h.stream(test_config(SSRC)).unwrap();
        let sr = sender_report(SSRC, 0, h.clock.now_ntp());
        assert_eq!(stream.deliver_rtcp(&sr), Err(StreamError::NotStarted));

        stream.start();
        assert!(stream.deliver_rtcp(&sr).is_ok());

        stream.stop();
        assert_eq!(stream.deliver_rtcp(&sr), Err(StreamError::NotStarted));
    }

    #[test]
    fn test_concurrent_control_stats_and_mixing() {
        let h = Harness::new();
        let stream = started(&h);
        for seq in 0..50 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 300));
        }
        let source = stream.mixer_source();

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..2000 {
                    stream.stop();
                    stream.start();
                }
                stream.stop();
            });
            s.spawn(|| {
                for _ in 0..2000 {
                    let stats = stream.get_stats();
                    assert_eq!(stats.remote_ssrc, SSRC);
                    assert_ne!(stats.state, StreamState::Created);
                }
            });
            s.spawn(|| {
                for _ in 0..2000 {
                    let (info, _) = pull(source.as_ref(), 16000);
                    assert_ne!(info, AudioFrameInfo::Error);
                }
            });
        });

        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.get_stats().state, StreamState::Stopped);
        assert_eq!(pull(source.as_ref(), 16000).0, AudioFrameInfo::Muted);
    }

    #[test]
    fn test_send_stream_rtt_preferred_and_expires() {
        let h = Harness::new();
        let stream = started(&h);
        let send: Arc<dyn SendStreamRtt> = Arc::new(FixedRtt {
            ssrc: 0x5555,
            rtt_ms: 42,
        });

        stream.associate_send_stream(Some(&send));
        assert_eq!(stream.get_stats().rtt_ms, Some(42));

        drop(send);
        assert_eq!(stream.get_stats().rtt_ms, None);
    }

    #[test]
    fn test_gain_above_one_amplifies() {
        let h = Harness::new();
        let stream = started(&h);
        stream.set_gain(2.5);
        for seq in 0..5 {
            stream.on_rtp_packet(&l16_packet(SSRC, seq, 1000));
        }

        // The level is refreshed every tenth frame.
        for _ in 0..10 {
            let (info, frame) = pull(&stream, 16000);
            assert_eq!(info, AudioFrameInfo::Normal);
            assert!(frame.data().iter().all(|&s| s == 2500));
        }
        assert_eq!(stream.get_output_level(), 2500);
    }

    #[test]
    fn test_stats_snapshot() {
        let h = Harness::new();
        let stream = started(&h);
        stream.on_rtp_packet(&l16_packet(SSRC, 0, 1));
        stream.on_rtp_packet(&l16_packet(SSRC, 2, 1));
        pull(&stream, 16000);

        let stats = stream.get_stats();
        assert_eq!(stats.remote_ssrc, SSRC);
        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.packets_lost, 1);
        assert_eq!(stats.codec_name.as_deref(), Some("L16"));
        assert_eq!(stats.state, StreamState::Started);
    }

    #[test]
    fn test_first_start_joins_mixer_and_drop_cleans_up() {
        let h = Harness::new();
        let stream = h.stream(test_config(SSRC)).unwrap();
        assert_eq!(h.audio_state.mixer().source_count(), 0);
        assert_eq!(h.audio_state.sync_groups().members("av").len(), 1);

        stream.start();
        stream.stop();
        stream.start();
        assert_eq!(h.audio_state.mixer().source_count(), 1);

        drop(stream);
        assert_eq!(h.audio_state.mixer().source_count(), 0);
        assert!(h.audio_state.sync_groups().members("av").is_empty());
        assert!(!h.demuxer.is_registered(SSRC));
        assert!(matches!(
            h.events.events().last(),
            Some(StreamEvent::Destroyed { remote_ssrc: SSRC })
        ));
    }

    #[test]
    fn test_forwards_to_custom_engine() {
        let h = Harness::new();
        let channel = Arc::new(RecordingChannel::default());
        let stream = AudioReceiveStream::with_channel(
            h.demuxer.clone(),
            test_config(SSRC),
            h.audio_state.clone(),
            h.events.clone(),
            channel.clone(),
        )
        .unwrap();

        stream.set_gain(0.5);
        stream.signal_network_state(NetworkState::Down);
        stream.start();
        pull(&stream, 48000);
        stream.set_sink(None);

        let calls = channel.calls();
        for expected in [
            "set_gain",
            "set_network_state",
            "start_playout",
            "get_audio_frame",
            "set_sink",
        ] {
            assert!(calls.contains(&expected), "missing {}", expected);
        }
    }
}
