//! NTP timestamps as carried in RTCP sender reports.
//!
//! RTCP uses the 64-bit NTP format: 32 bits of seconds since 1900-01-01 and
//! 32 bits of binary fraction. Report blocks use the "compact" middle 32 bits
//! (16.16 fixed point) for LSR/DLSR.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const NTP_UNIX_EPOCH_OFFSET_SECS: u64 = 2_208_988_800;

const FRACTIONS_PER_SECOND: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtpTime {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTime {
    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// An all-zero timestamp means "no time" in RTCP.
    pub const fn is_valid(self) -> bool {
        self.seconds != 0 || self.fraction != 0
    }

    /// Builds a timestamp from milliseconds since the NTP epoch.
    pub fn from_ms(ms: i64) -> Self {
        let ms = ms.max(0) as u64;
        let seconds = ms / 1000;
        let fraction = ((ms % 1000) * FRACTIONS_PER_SECOND) / 1000;
        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    /// Milliseconds since the NTP epoch, rounded to nearest.
    pub fn to_ms(self) -> i64 {
        let frac_ms = (self.fraction as u64 * 1000 + FRACTIONS_PER_SECOND / 2) >> 32;
        self.seconds as i64 * 1000 + frac_ms as i64
    }

    pub fn from_unix_micros(micros: u64) -> Self {
        let seconds = micros / 1_000_000 + NTP_UNIX_EPOCH_OFFSET_SECS;
        let fraction = ((micros % 1_000_000) * FRACTIONS_PER_SECOND) / 1_000_000;
        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }

    pub fn to_unix_micros(self) -> u64 {
        let seconds = (self.seconds as u64).saturating_sub(NTP_UNIX_EPOCH_OFFSET_SECS);
        let micros = (self.fraction as u64 * 1_000_000) >> 32;
        seconds * 1_000_000 + micros
    }

    /// Current wall clock in NTP format.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::from_unix_micros(micros)
    }

    /// Middle 32 bits, as used by LSR/DLSR in report blocks.
    pub const fn compact(self) -> u32 {
        (self.seconds << 16) | (self.fraction >> 16)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let micros = self.to_unix_micros();
        Utc.timestamp_micros(micros as i64).single()
    }
}

/// Converts a compact (16.16) NTP interval to milliseconds.
pub fn compact_ntp_to_ms(compact: u32) -> i64 {
    (compact as i64 * 1000 + 0x8000) >> 16
}

/// Maps an RTP timestamp to NTP milliseconds through a sender report.
///
/// The RTP difference is taken as signed so timestamps slightly before the
/// report map backwards instead of wrapping around.
pub fn rtp_to_ntp_ms(
    sender_report_ntp: NtpTime,
    sender_report_rtp: u32,
    rtp_timestamp: u32,
    clock_rate_hz: u32,
) -> i64 {
    if clock_rate_hz == 0 {
        return sender_report_ntp.to_ms();
    }
    let delta = rtp_timestamp.wrapping_sub(sender_report_rtp) as i32 as i64;
    sender_report_ntp.to_ms() + delta * 1000 / clock_rate_hz as i64
}
