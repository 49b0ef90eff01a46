//! Receive stream configuration.
//!
//! A config is an immutable snapshot. Reconfiguration hands a whole new
//! snapshot to the stream, which diffs it against the current one and
//! applies only what changed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::channel::SdpAudioFormat;
use crate::receiver::{ReceiverSpec, RtxConfig};
use crate::rtp::{ExtensionIds, RtpExtension};

/// One second of 20 ms packets.
const DEFAULT_NACK_MAX_PACKETS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NackConfig {
    pub enabled: bool,
    /// Upper bound on outstanding sequence numbers in one request.
    pub max_packets: usize,
}

impl Default for NackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_packets: DEFAULT_NACK_MAX_PACKETS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpConfig {
    pub remote_ssrc: u32,
    pub local_ssrc: u32,
    pub nack: NackConfig,
    pub rtx: Option<RtxConfig>,
    /// Negotiated header extensions, in negotiation order.
    pub extensions: Vec<RtpExtension>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveStreamConfig {
    pub rtp: RtpConfig,
    /// Payload type -> codec.
    pub decoder_map: BTreeMap<u8, SdpAudioFormat>,
    /// Streams with the same non-empty group are lip-synced together.
    pub sync_group: String,
    /// Playout delay floor. Never lowered by sync requests.
    pub initial_min_playout_delay_ms: i32,
}

impl ReceiveStreamConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid receive stream config")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn extension_ids(&self) -> ExtensionIds {
        ExtensionIds::find(&self.rtp.extensions)
    }

    pub fn receiver_spec(&self, owner: u64) -> ReceiverSpec {
        ReceiverSpec {
            owner,
            remote_ssrc: self.rtp.remote_ssrc,
            rtx: self.rtp.rtx.clone(),
            extension_ids: self.extension_ids(),
        }
    }
}

/// Which parts of a config changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfigDiff {
    pub remote_ssrc: bool,
    pub local_ssrc: bool,
    pub nack: bool,
    pub rtx: bool,
    pub extension_ids: bool,
    pub decoder_map: bool,
    pub sync_group: bool,
    pub min_playout_delay: bool,
}

impl ConfigDiff {
    /// Everything, for the first application.
    pub fn full() -> Self {
        Self {
            remote_ssrc: true,
            local_ssrc: true,
            nack: true,
            rtx: true,
            extension_ids: true,
            decoder_map: true,
            sync_group: true,
            min_playout_delay: true,
        }
    }

    pub fn between(old: &ReceiveStreamConfig, new: &ReceiveStreamConfig) -> Self {
        Self {
            remote_ssrc: old.rtp.remote_ssrc != new.rtp.remote_ssrc,
            local_ssrc: old.rtp.local_ssrc != new.rtp.local_ssrc,
            nack: old.rtp.nack != new.rtp.nack,
            rtx: old.rtp.rtx != new.rtp.rtx,
            extension_ids: old.extension_ids() != new.extension_ids(),
            decoder_map: old.decoder_map != new.decoder_map,
            sync_group: old.sync_group != new.sync_group,
            min_playout_delay: old.initial_min_playout_delay_ms != new.initial_min_playout_delay_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the receiver controller must see a new identity.
    pub fn requires_reregistration(&self) -> bool {
        self.remote_ssrc || self.rtx || self.extension_ids
    }
}
