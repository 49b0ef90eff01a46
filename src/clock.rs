//! Time sources.
//!
//! The receive path needs two clocks: a monotonic one for arrival and
//! render times, and a wall clock in NTP format for RTCP arithmetic.
//! [`SimulatedClock`] drives both from one counter so tests are deterministic.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use crate::rtp::NtpTime;

pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> i64;

    /// Wall clock in NTP format.
    fn now_ntp(&self) -> NtpTime;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    fn now_ntp(&self) -> NtpTime {
        NtpTime::now()
    }
}

/// Manually advanced clock. NTP time is `ntp_origin_ms + now_ms()`.
pub struct SimulatedClock {
    now_ms: AtomicI64,
    ntp_origin_ms: i64,
}

impl SimulatedClock {
    /// 2023-08-01 in NTP milliseconds; any realistic value works.
    pub const DEFAULT_NTP_ORIGIN_MS: i64 = 3_899_836_800_000;

    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            ntp_origin_ms: Self::DEFAULT_NTP_ORIGIN_MS,
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn now_ntp(&self) -> NtpTime {
        NtpTime::from_ms(self.ntp_origin_ms + self.now_ms())
    }
}
