use std::collections::BTreeSet;

use tracing::debug;

/// Tracks sequence-number gaps for retransmission requests.
#[derive(Debug, Default)]
pub struct NackTracker {
    enabled: bool,
    max_packets: usize,
    newest_seq: Option<u64>,
    missing: BTreeSet<u64>,
}

impl NackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, enabled: bool, max_packets: usize) {
        self.enabled = enabled && max_packets > 0;
        self.max_packets = max_packets;
        if !self.enabled {
            self.missing.clear();
        }
        self.trim();
    }

    /// Records an arrival. Returns true if new gaps were found.
    pub fn on_packet(&mut self, ext_seq: u64) -> bool {
        if !self.enabled {
            self.newest_seq = Some(self.newest_seq.map_or(ext_seq, |n| n.max(ext_seq)));
            return false;
        }

        self.missing.remove(&ext_seq);

        let Some(newest) = self.newest_seq else {
            self.newest_seq = Some(ext_seq);
            return false;
        };
        if ext_seq <= newest {
            return false;
        }

        let first_missing = (newest + 1).max(ext_seq.saturating_sub(self.max_packets as u64));
        let found_gap = first_missing < ext_seq;
        self.missing.extend(first_missing..ext_seq);
        self.newest_seq = Some(ext_seq);
        self.trim();

        if found_gap {
            debug!("NACK: {} packet(s) outstanding", self.missing.len());
        }
        found_gap
    }

    fn trim(&mut self) {
        while self.missing.len() > self.max_packets {
            self.missing.pop_first();
        }
    }

    /// Outstanding sequence numbers, oldest first.
    pub fn missing(&self) -> Vec<u16> {
        self.missing.iter().map(|&s| s as u16).collect()
    }

    pub fn reset(&mut self) {
        self.newest_seq = None;
        self.missing.clear();
    }
}
