//! Received RTP packet as handed over by the transport.
//!
//! Wire parsing happens upstream; this is the already-parsed view the receiver
//! controller routes and the decode engine consumes.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub struct RtpPacketReceived {
    pub ssrc: u32,
    pub csrcs: Vec<u32>,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_type: u8,
    pub marker: bool,
    /// Header extension elements keyed by local id.
    pub extensions: Vec<(u8, Bytes)>,
    pub payload: Bytes,
    /// Local monotonic arrival time.
    pub arrival_time_ms: i64,
    /// Set when the packet was restored from an RTX retransmission.
    pub recovered: bool,
}

impl RtpPacketReceived {
    pub fn new(
        ssrc: u32,
        sequence_number: u16,
        timestamp: u32,
        payload_type: u8,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            ssrc,
            csrcs: Vec::new(),
            sequence_number,
            timestamp,
            payload_type,
            marker: false,
            extensions: Vec::new(),
            payload: payload.into(),
            arrival_time_ms: 0,
            recovered: false,
        }
    }

    pub fn with_arrival_time(mut self, arrival_time_ms: i64) -> Self {
        self.arrival_time_ms = arrival_time_ms;
        self
    }

    pub fn with_extension(mut self, id: u8, data: impl Into<Bytes>) -> Self {
        self.extensions.push((id, data.into()));
        self
    }

    pub fn with_csrcs(mut self, csrcs: Vec<u32>) -> Self {
        self.csrcs = csrcs;
        self
    }

    /// Raw extension element for a local id. Id 0 never matches.
    pub fn extension(&self, id: u8) -> Option<&[u8]> {
        if id == 0 {
            return None;
        }
        self.extensions
            .iter()
            .find(|(ext_id, _)| *ext_id == id)
            .map(|(_, data)| data.as_ref())
    }

    /// RFC 6464 client-to-mixer audio level: (voice activity, -dBov level 0..=127).
    pub fn audio_level(&self, id: u8) -> Option<(bool, u8)> {
        let data = self.extension(id)?;
        let byte = *data.first()?;
        Some((byte & 0x80 != 0, byte & 0x7f))
    }

    pub fn transport_sequence_number(&self, id: u8) -> Option<u16> {
        let data = self.extension(id)?;
        if data.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([data[0], data[1]]))
    }
}
