//! Applies configuration snapshots to the decode engine.

use std::sync::Weak;

use tracing::{debug, warn};

use crate::audio::frame::has_whole_10ms_frames;
use crate::call::SyncGroupRegistry;
use crate::channel::{AudioDecoderFactory, ChannelProxy};
use crate::error::{Result, StreamError};
use crate::stream::{ConfigDiff, ReceiveStreamConfig, Syncable};

pub struct ConfigReconciler<'a> {
    channel: &'a dyn ChannelProxy,
    decoder_factory: &'a dyn AudioDecoderFactory,
    sync_groups: &'a SyncGroupRegistry,
    owner: u64,
    syncable: Weak<dyn Syncable>,
}

impl<'a> ConfigReconciler<'a> {
    pub fn new(
        channel: &'a dyn ChannelProxy,
        decoder_factory: &'a dyn AudioDecoderFactory,
        sync_groups: &'a SyncGroupRegistry,
        owner: u64,
        syncable: Weak<dyn Syncable>,
    ) -> Self {
        Self {
            channel,
            decoder_factory,
            sync_groups,
            owner,
            syncable,
        }
    }

    /// Checks a snapshot without touching anything.
    pub fn validate(
        config: &ReceiveStreamConfig,
        decoder_factory: &dyn AudioDecoderFactory,
    ) -> Result<()> {
        if config.initial_min_playout_delay_ms < 0 {
            return Err(StreamError::ConfigRejected(format!(
                "Negative minimum playout delay {} ms",
                config.initial_min_playout_delay_ms
            )));
        }
        for (payload_type, format) in &config.decoder_map {
            if !has_whole_10ms_frames(format.clock_rate_hz) {
                return Err(StreamError::ConfigRejected(format!(
                    "Clock rate {} Hz of payload type {} has no whole 10 ms frame",
                    format.clock_rate_hz, payload_type
                )));
            }
            if !decoder_factory.is_supported(format) {
                return Err(StreamError::ConfigRejected(format!(
                    "Unsupported codec {}/{}/{} for payload type {}",
                    format.name, format.clock_rate_hz, format.num_channels, payload_type
                )));
            }
        }
        Ok(())
    }

    /// Applies `config`. With no `previous` snapshot every subsystem is
    /// initialized; otherwise only the fields that differ are pushed.
    ///
    /// Validation runs first, so a rejected snapshot changes nothing.
    pub fn apply(
        &self,
        previous: Option<&ReceiveStreamConfig>,
        config: &ReceiveStreamConfig,
    ) -> Result<ConfigDiff> {
        Self::validate(config, self.decoder_factory)?;

        let diff = match previous {
            Some(previous) => ConfigDiff::between(previous, config),
            None => ConfigDiff::full(),
        };
        if diff.is_empty() {
            return Ok(diff);
        }

        // Only fallible step; keep it ahead of everything else.
        if diff.decoder_map {
            self.channel
                .set_receive_codecs(&config.decoder_map)
                .inspect_err(|e| warn!("Failed to install receive codecs: {}", e))?;
        }
        if diff.remote_ssrc {
            self.channel.set_remote_ssrc(config.rtp.remote_ssrc);
        }
        if diff.local_ssrc {
            self.channel.set_local_ssrc(config.rtp.local_ssrc);
        }
        if diff.extension_ids {
            self.channel.set_extension_ids(config.extension_ids());
        }
        if diff.nack {
            self.channel
                .set_nack_status(config.rtp.nack.enabled, config.rtp.nack.max_packets);
        }
        if diff.min_playout_delay {
            self.channel
                .set_base_minimum_playout_delay(config.initial_min_playout_delay_ms);
        }
        if diff.sync_group {
            if let Some(previous) = previous {
                self.sync_groups.leave(&previous.sync_group, self.owner);
            }
            self.sync_groups
                .join(&config.sync_group, self.owner, self.syncable.clone());
        }

        debug!("Applied config to stream {}: {:?}", self.owner, diff);
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::channel::decoder::L16Decoder;
    use crate::channel::{AudioDecoder, BuiltinDecoderFactory, SdpAudioFormat};
    use crate::stream::testing::{RecordingChannel, test_config};

    fn reconcile(
        channel: &RecordingChannel,
        registry: &SyncGroupRegistry,
        previous: Option<&ReceiveStreamConfig>,
        config: &ReceiveStreamConfig,
    ) -> Result<ConfigDiff> {
        let syncable: Arc<dyn Syncable> = Arc::new(crate::stream::testing::NullSyncable);
        let reconciler = ConfigReconciler::new(
            channel,
            &BuiltinDecoderFactory,
            registry,
            1,
            Arc::downgrade(&syncable),
        );
        let result = reconciler.apply(previous, config);
        drop(syncable);
        result
    }

    #[test]
    fn test_first_apply_initializes_everything() {
        let channel = RecordingChannel::default();
        let registry = SyncGroupRegistry::default();
        let config = test_config(100);

        let diff = reconcile(&channel, &registry, None, &config).unwrap();
        assert_eq!(diff, ConfigDiff::full());

        let calls = channel.calls();
        for expected in [
            "set_receive_codecs",
            "set_remote_ssrc",
            "set_local_ssrc",
            "set_extension_ids",
            "set_nack_status",
            "set_base_minimum_playout_delay",
        ] {
            assert!(calls.contains(&expected), "missing {}", expected);
        }
        assert_eq!(calls[0], "set_receive_codecs");
    }

    #[test]
    fn test_every_change_reaches_a_subsystem() {
        let old = test_config(100);
        let changes: [(fn(&mut ReceiveStreamConfig), &str); 6] = [
            (|c| c.rtp.remote_ssrc = 200, "set_remote_ssrc"),
            (|c| c.rtp.local_ssrc = 300, "set_local_ssrc"),
            (|c| c.rtp.nack.enabled = true, "set_nack_status"),
            (|c| c.rtp.extensions[0].id = 4, "set_extension_ids"),
            (|c| c.initial_min_playout_delay_ms = 60, "set_base_minimum_playout_delay"),
            (
                |c| {
                    c.decoder_map
                        .insert(97, SdpAudioFormat::new("L16", 48000, 1));
                },
                "set_receive_codecs",
            ),
        ];

        for (change, expected) in changes {
            let channel = RecordingChannel::default();
            let registry = SyncGroupRegistry::default();
            let mut new = old.clone();
            change(&mut new);

            let diff = reconcile(&channel, &registry, Some(&old), &new).unwrap();
            assert!(!diff.is_empty());
            assert_eq!(channel.calls(), vec![expected]);
        }
    }

    #[test]
    fn test_incremental_apply_touches_only_changes() {
        let channel = RecordingChannel::default();
        let registry = SyncGroupRegistry::default();
        let old = test_config(100);
        let mut new = old.clone();
        new.initial_min_playout_delay_ms = 120;

        let diff = reconcile(&channel, &registry, Some(&old), &new).unwrap();
        assert!(diff.min_playout_delay);
        assert_eq!(channel.calls(), vec!["set_base_minimum_playout_delay"]);
    }

    #[test]
    fn test_rejected_config_touches_nothing() {
        let channel = RecordingChannel::default();
        let registry = SyncGroupRegistry::default();
        let old = test_config(100);

        let mut bad_codec = old.clone();
        bad_codec
            .decoder_map
            .insert(111, SdpAudioFormat::new("opus", 48000, 2));
        let err = reconcile(&channel, &registry, Some(&old), &bad_codec).unwrap_err();
        assert!(matches!(err, StreamError::ConfigRejected(_)));

        let mut bad_delay = old.clone();
        bad_delay.initial_min_playout_delay_ms = -5;
        assert!(reconcile(&channel, &registry, Some(&old), &bad_delay).is_err());

        assert!(channel.calls().is_empty());
    }

    /// Accepts L16 at any rate.
    struct AnyRateL16;

    impl AudioDecoderFactory for AnyRateL16 {
        fn is_supported(&self, format: &SdpAudioFormat) -> bool {
            format.is_named("L16")
        }

        fn make_decoder(&self, format: &SdpAudioFormat) -> Option<Box<dyn AudioDecoder>> {
            Some(Box::new(L16Decoder::new(
                format.clock_rate_hz,
                format.num_channels,
            )))
        }
    }

    #[test]
    fn test_fractional_10ms_rate_rejected() {
        let mut config = test_config(100);
        config
            .decoder_map
            .insert(97, SdpAudioFormat::new("L16", 22050, 1));

        assert!(matches!(
            ConfigReconciler::validate(&config, &AnyRateL16),
            Err(StreamError::ConfigRejected(_))
        ));
        assert!(ConfigReconciler::validate(&test_config(100), &AnyRateL16).is_ok());
    }
}
