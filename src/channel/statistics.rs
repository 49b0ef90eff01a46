//! RFC 3550 receive statistics.

/// Loss fraction is recomputed once per RTCP report interval for audio.
pub const LOSS_INTERVAL_MS: i64 = 5000;

/// Extends 16-bit RTP sequence numbers to a monotonic 64-bit space.
#[derive(Debug, Default, Clone)]
pub struct SeqNumUnwrapper {
    last: Option<u64>,
}

impl SeqNumUnwrapper {
    pub fn unwrap(&mut self, seq: u16) -> u64 {
        let Some(last) = self.last else {
            // Start one cycle in so small backward steps stay non-negative.
            let value = (1 << 16) + seq as u64;
            self.last = Some(value);
            return value;
        };

        let last_seq = last as u16;
        let delta = seq.wrapping_sub(last_seq) as i16 as i64;
        let value = (last as i64 + delta).max(0) as u64;
        if value > last {
            self.last = Some(value);
        }
        value
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Per-SSRC receive counters.
#[derive(Debug, Default, Clone)]
pub struct StreamStatistician {
    unwrapper: SeqNumUnwrapper,
    base_seq: Option<u64>,
    highest_seq: u64,
    packets_received: u64,
    bytes_received: u64,
    /// Interarrival jitter in RTP units, Q4 fixed point.
    jitter_q4: u64,
    last_transit: Option<i64>,
    clock_rate_hz: u32,
    expected_prior: u64,
    received_prior: u64,
    last_fraction_lost: u8,
    interval_start_ms: Option<i64>,
}

impl StreamStatistician {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one packet and returns its extended sequence number.
    pub fn on_packet(
        &mut self,
        seq: u16,
        rtp_timestamp: u32,
        arrival_time_ms: i64,
        payload_len: usize,
        clock_rate_hz: u32,
        retransmitted: bool,
    ) -> u64 {
        let ext_seq = self.unwrapper.unwrap(seq);
        self.packets_received += 1;
        self.bytes_received += payload_len as u64;

        let base = *self.base_seq.get_or_insert(ext_seq);
        if ext_seq < base {
            self.base_seq = Some(ext_seq);
        }
        let in_order = ext_seq > self.highest_seq || self.packets_received == 1;
        if in_order {
            self.highest_seq = ext_seq;
        }

        if clock_rate_hz != self.clock_rate_hz {
            self.clock_rate_hz = clock_rate_hz;
            self.last_transit = None;
        }
        if in_order && !retransmitted && clock_rate_hz > 0 {
            self.update_jitter(rtp_timestamp, arrival_time_ms);
        }

        ext_seq
    }

    fn update_jitter(&mut self, rtp_timestamp: u32, arrival_time_ms: i64) {
        let arrival_rtp = arrival_time_ms * self.clock_rate_hz as i64 / 1000;
        let transit = arrival_rtp.wrapping_sub(rtp_timestamp as i64);
        if let Some(last) = self.last_transit {
            let d = (transit - last).unsigned_abs();
            // J += (|D| - J) / 16, rounded.
            let jq4 = self.jitter_q4 as i64;
            let next = jq4 + (((d as i64) << 4) - jq4 + 8) / 16;
            self.jitter_q4 = next.max(0) as u64;
        }
        self.last_transit = Some(transit);
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn extended_highest_sequence_number(&self) -> u64 {
        self.highest_seq
    }

    pub fn expected_packets(&self) -> u64 {
        match self.base_seq {
            Some(base) => self.highest_seq - base + 1,
            None => 0,
        }
    }

    /// Cumulative loss. Negative when duplicates outnumber losses.
    pub fn packets_lost(&self) -> i64 {
        self.expected_packets() as i64 - self.packets_received as i64
    }

    /// Jitter in RTP timestamp units.
    pub fn jitter(&self) -> u32 {
        (self.jitter_q4 >> 4) as u32
    }

    pub fn jitter_ms(&self) -> u32 {
        if self.clock_rate_hz == 0 {
            return 0;
        }
        (self.jitter() as u64 * 1000 / self.clock_rate_hz as u64) as u32
    }

    /// Loss fraction of the last closed interval, in 1/256 units.
    pub fn fraction_lost(&self) -> u8 {
        self.last_fraction_lost
    }

    /// Closes the loss interval once [`LOSS_INTERVAL_MS`] has passed since
    /// it opened. The first call only opens it.
    pub fn update_interval(&mut self, now_ms: i64) {
        match self.interval_start_ms {
            None => self.interval_start_ms = Some(now_ms),
            Some(start) if now_ms - start >= LOSS_INTERVAL_MS => {
                self.close_interval();
                self.interval_start_ms = Some(now_ms);
            }
            Some(_) => {}
        }
    }

    /// Computes the loss fraction since the previous close.
    pub fn close_interval(&mut self) -> u8 {
        let expected = self.expected_packets();
        let expected_interval = expected.saturating_sub(self.expected_prior);
        let received_interval = self.packets_received.saturating_sub(self.received_prior);
        self.expected_prior = expected;
        self.received_prior = self.packets_received;

        if expected_interval == 0 {
            return self.last_fraction_lost;
        }
        let lost = expected_interval.saturating_sub(received_interval);
        self.last_fraction_lost = ((lost << 8) / expected_interval).min(255) as u8;
        self.last_fraction_lost
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
