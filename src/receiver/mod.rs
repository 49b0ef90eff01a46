//! Inbound RTP routing.
//!
//! A stream claims its remote SSRC (and RTX SSRC, if any) with a
//! [`RtpStreamReceiverController`]. The returned [`RtpStreamReceiver`] is a
//! guard: dropping it releases the claim. [`SsrcDemuxer`] is the in-process
//! controller used by the call layer and tests.

pub mod demuxer;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rtp::{ExtensionIds, RtpPacketReceived};

pub use demuxer::SsrcDemuxer;

/// RFC 4588 retransmission stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxConfig {
    pub ssrc: u32,
    /// RTX payload type -> original media payload type.
    #[serde(default)]
    pub payload_types: BTreeMap<u8, u8>,
}

/// Identity a stream registers under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverSpec {
    /// Opaque token of the registering stream. The same owner may replace
    /// its own registration.
    pub owner: u64,
    pub remote_ssrc: u32,
    pub rtx: Option<RtxConfig>,
    pub extension_ids: ExtensionIds,
}

pub trait RtpPacketSink: Send + Sync {
    fn on_rtp_packet(&self, packet: &RtpPacketReceived);
}

/// Live registration. Unregisters on drop.
pub trait RtpStreamReceiver: Send + Sync {
    fn spec(&self) -> &ReceiverSpec;
}

pub trait RtpStreamReceiverController: Send + Sync {
    /// Claims the SSRCs in `spec` and routes their packets to `sink`.
    ///
    /// Fails with [`crate::StreamError::Registration`] when another owner
    /// holds one of the SSRCs or the spec is inconsistent.
    fn create_receiver(
        &self,
        spec: ReceiverSpec,
        sink: Arc<dyn RtpPacketSink>,
    ) -> Result<Box<dyn RtpStreamReceiver>>;
}
