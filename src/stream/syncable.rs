//! Timing capability for the AV-sync controller.

use tracing::debug;

use crate::channel::SyncInfo;
use crate::rtp::{NtpTime, rtp_to_ntp_ms};
use crate::stream::coordinator::StreamCore;

/// Playout timing snapshot.
///
/// Only exists once a sender report has been received and at least one
/// frame has been rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayoutInfo {
    /// Buffered audio, never below the active minimum delay.
    pub current_delay_ms: i32,
    /// RTP timestamp of the first sample of the last rendered frame.
    pub playout_timestamp_rtp: u32,
    /// Local wall clock when the newest RTP packet arrived.
    pub last_packet_received_ntp: NtpTime,
    /// Sender's capture time of the playout timestamp, via the last SR.
    pub estimated_playout_ntp: NtpTime,
    /// Local monotonic time the last rendered frame is expected to be heard.
    pub estimated_playout_time_ms: i64,
    pub sender_report_ntp: NtpTime,
    pub sender_report_rtp: u32,
    pub latest_received_rtp_timestamp: u32,
}

impl From<SyncInfo> for PlayoutInfo {
    fn from(info: SyncInfo) -> Self {
        let estimated_ms = rtp_to_ntp_ms(
            info.sender_report_ntp,
            info.sender_report_rtp,
            info.playout_timestamp_rtp,
            info.clock_rate_hz,
        );
        Self {
            current_delay_ms: info.current_delay_ms,
            playout_timestamp_rtp: info.playout_timestamp_rtp,
            last_packet_received_ntp: info.latest_receive_ntp,
            estimated_playout_ntp: NtpTime::from_ms(estimated_ms),
            estimated_playout_time_ms: info.estimated_playout_time_ms,
            sender_report_ntp: info.sender_report_ntp,
            sender_report_rtp: info.sender_report_rtp,
            latest_received_rtp_timestamp: info.latest_received_rtp_timestamp,
        }
    }
}

pub trait Syncable: Send + Sync {
    /// Stable for the stream's lifetime, even across SSRC changes.
    fn id(&self) -> u32;

    fn get_info(&self) -> Option<PlayoutInfo>;

    /// Last rendered RTP timestamp, 0 before the first frame.
    fn get_playout_timestamp(&self) -> u32;

    /// Raises the playout delay floor. Negative values are ignored.
    fn set_minimum_playout_delay(&self, delay_ms: i32);
}

impl Syncable for StreamCore {
    fn id(&self) -> u32 {
        self.sync_id
    }

    fn get_info(&self) -> Option<PlayoutInfo> {
        self.channel.get_sync_info().map(PlayoutInfo::from)
    }

    fn get_playout_timestamp(&self) -> u32 {
        self.channel.playout_timestamp().unwrap_or(0)
    }

    fn set_minimum_playout_delay(&self, delay_ms: i32) {
        if delay_ms < 0 {
            debug!("Ignoring negative minimum playout delay {}", delay_ms);
            return;
        }
        self.channel.set_minimum_playout_delay(delay_ms);
    }
}
