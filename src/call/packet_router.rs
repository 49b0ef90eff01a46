//! Outbound RTCP path for receive streams, and the send-stream RTT lookup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use dashmap::DashMap;

use tracing::{debug, warn};

use crate::rtp::RtcpPacket;
use crate::rtp::rtcp::serialize_compound;

/// Where serialized RTCP goes. Usually the call's network transport.
pub trait RtcpTransport: Send + Sync {
    /// Returns false if the packet could not be sent.
    fn send_rtcp(&self, data: &[u8]) -> bool;
}

/// An outbound stream that can report round-trip time.
pub trait SendStreamRtt: Send + Sync {
    fn ssrc(&self) -> u32;

    /// None until the remote side has reported back.
    fn rtt_ms(&self) -> Option<i64>;
}

/// Routes feedback from receive streams to the bound transport.
#[derive(Default)]
pub struct PacketRouter {
    transport: RwLock<Option<Arc<dyn RtcpTransport>>>,
    packets_sent: AtomicU64,
    send_streams: DashMap<u32, Weak<dyn SendStreamRtt>>,
}

impl PacketRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transport(&self, transport: Option<Arc<dyn RtcpTransport>>) {
        *self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transport;
    }

    /// Serializes `packets` into one compound packet and sends it.
    pub fn send_rtcp(&self, packets: &[RtcpPacket]) -> bool {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(transport) = transport else {
            debug!("No RTCP transport bound, dropping {} packet(s)", packets.len());
            return false;
        };

        let data = serialize_compound(packets);
        if !transport.send_rtcp(&data) {
            warn!("RTCP transport refused {} bytes", data.len());
            return false;
        }
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    pub fn register_send_stream(&self, stream: &Arc<dyn SendStreamRtt>) {
        debug!("Send stream {:#010x} registered", stream.ssrc());
        self.send_streams.insert(stream.ssrc(), Arc::downgrade(stream));
    }

    pub fn unregister_send_stream(&self, ssrc: u32) {
        self.send_streams.remove(&ssrc);
    }

    /// RTT of the live send stream using `ssrc`, if any.
    pub fn send_stream_rtt(&self, ssrc: u32) -> Option<i64> {
        let stream = self.send_streams.get(&ssrc)?.upgrade();
        match stream {
            Some(stream) => stream.rtt_ms(),
            None => {
                self.send_streams.remove(&ssrc);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::rtp::GenericNack;
    use crate::rtp::rtcp::parse_compound;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl RtcpTransport for CapturingTransport {
        fn send_rtcp(&self, data: &[u8]) -> bool {
            self.sent.lock().unwrap().push(data.to_vec());
            true
        }
    }

    struct FixedRtt(u32, i64);

    impl SendStreamRtt for FixedRtt {
        fn ssrc(&self) -> u32 {
            self.0
        }

        fn rtt_ms(&self) -> Option<i64> {
            Some(self.1)
        }
    }

    #[test]
    fn test_send_stream_registry() {
        let router = PacketRouter::new();
        let stream: Arc<dyn SendStreamRtt> = Arc::new(FixedRtt(42, 80));
        router.register_send_stream(&stream);

        assert_eq!(router.send_stream_rtt(42), Some(80));
        assert_eq!(router.send_stream_rtt(43), None);

        drop(stream);
        assert_eq!(router.send_stream_rtt(42), None);

        let stream: Arc<dyn SendStreamRtt> = Arc::new(FixedRtt(7, 30));
        router.register_send_stream(&stream);
        router.unregister_send_stream(7);
        assert_eq!(router.send_stream_rtt(7), None);
    }

    #[test]
    fn test_send_without_transport_fails() {
        let router = PacketRouter::new();
        assert!(!router.send_rtcp(&[RtcpPacket::Other { packet_type: 204 }]));
        assert_eq!(router.packets_sent(), 0);
    }

    #[test]
    fn test_nack_reaches_transport() {
        let router = PacketRouter::new();
        let transport = Arc::new(CapturingTransport::default());
        router.set_transport(Some(transport.clone()));

        let nack = RtcpPacket::GenericNack(GenericNack {
            sender_ssrc: 1,
            media_ssrc: 2,
            lost: vec![10, 12],
        });
        assert!(router.send_rtcp(&[nack.clone()]));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(parse_compound(&sent[0]).unwrap(), vec![nack]);
        assert_eq!(router.packets_sent(), 1);
    }
}
