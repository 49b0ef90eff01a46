//! Contributing source bookkeeping.

use std::collections::HashMap;

use serde::Serialize;

use crate::rtp::RtpPacketReceived;

/// Sources older than this are not reported.
const SOURCE_TIMEOUT_MS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RtpSourceType {
    Ssrc,
    Csrc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtpSource {
    pub source_id: u32,
    pub source_type: RtpSourceType,
    /// Local time of the most recent packet from this source.
    pub timestamp_ms: i64,
    pub rtp_timestamp: u32,
    /// RFC 6464 level in -dBov, when the extension was present.
    pub audio_level: Option<u8>,
}

#[derive(Debug, Default)]
pub struct SourceTracker {
    sources: HashMap<(RtpSourceType, u32), RtpSource>,
}

impl SourceTracker {
    pub fn on_packet(&mut self, packet: &RtpPacketReceived, now_ms: i64, audio_level_id: u8) {
        let audio_level = packet.audio_level(audio_level_id).map(|(_, level)| level);

        let entries = std::iter::once((RtpSourceType::Ssrc, packet.ssrc, audio_level)).chain(
            packet
                .csrcs
                .iter()
                .map(|&csrc| (RtpSourceType::Csrc, csrc, None)),
        );
        for (source_type, source_id, audio_level) in entries {
            self.sources.insert(
                (source_type, source_id),
                RtpSource {
                    source_id,
                    source_type,
                    timestamp_ms: now_ms,
                    rtp_timestamp: packet.timestamp,
                    audio_level,
                },
            );
        }

        self.sources
            .retain(|_, s| now_ms - s.timestamp_ms <= SOURCE_TIMEOUT_MS);
    }

    /// Recent sources, newest first.
    pub fn sources(&self, now_ms: i64) -> Vec<RtpSource> {
        let mut sources: Vec<RtpSource> = self
            .sources
            .values()
            .filter(|s| now_ms - s.timestamp_ms <= SOURCE_TIMEOUT_MS)
            .cloned()
            .collect();
        sources.sort_by(|a, b| {
            b.timestamp_ms
                .cmp(&a.timestamp_ms)
                .then(a.source_id.cmp(&b.source_id))
        });
        sources
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}
