//! RTP/RTCP boundary types.
//!
//! - [`extension`] - Negotiated header extensions and local id lookup
//! - [`packet`] - Parsed inbound RTP packet
//! - [`rtcp`] - RTCP compound parsing and serialization
//! - [`ntp`] - NTP timestamps used by sender reports

pub mod extension;
pub mod ntp;
pub mod packet;
pub mod rtcp;

pub use extension::{ExtensionIds, RtpExtension, find_extension_ids};
pub use ntp::{NtpTime, rtp_to_ntp_ms};
pub use packet::RtpPacketReceived;
pub use rtcp::{GenericNack, ReceiverReport, ReportBlock, RtcpPacket, SenderReport};
