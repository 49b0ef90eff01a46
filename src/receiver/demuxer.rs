use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, StreamError};
use crate::receiver::{ReceiverSpec, RtpPacketSink, RtpStreamReceiver, RtpStreamReceiverController};
use crate::rtp::RtpPacketReceived;

#[derive(Clone)]
enum RouteKind {
    Media,
    Rtx {
        media_ssrc: u32,
        payload_types: BTreeMap<u8, u8>,
    },
}

#[derive(Clone)]
struct Route {
    owner: u64,
    registration: u64,
    kind: RouteKind,
    sink: Arc<dyn RtpPacketSink>,
}

type RouteTable = DashMap<u32, Route>;

/// Routes packets to registered streams by SSRC.
///
/// RTX packets are unwrapped (original sequence number restored, payload
/// type mapped back) before they reach the media stream's sink.
#[derive(Default)]
pub struct SsrcDemuxer {
    routes: Arc<RouteTable>,
    next_registration: AtomicU64,
}

impl SsrcDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, ssrc: u32) -> bool {
        self.routes.contains_key(&ssrc)
    }

    /// Delivers one packet. Returns false if no stream claimed its SSRC or
    /// an RTX packet could not be unwrapped.
    pub fn deliver(&self, packet: RtpPacketReceived) -> bool {
        // Clone out so no shard lock is held while the sink decodes.
        let Some(route) = self.routes.get(&packet.ssrc).map(|r| r.clone()) else {
            trace!("No receiver for SSRC {:#010x}", packet.ssrc);
            return false;
        };

        match route.kind {
            RouteKind::Media => {
                route.sink.on_rtp_packet(&packet);
                true
            }
            RouteKind::Rtx {
                media_ssrc,
                ref payload_types,
            } => match unwrap_rtx(packet, media_ssrc, payload_types) {
                Some(restored) => {
                    route.sink.on_rtp_packet(&restored);
                    true
                }
                None => false,
            },
        }
    }

    fn claim(&self, ssrc: u32, owner: u64) -> Result<()> {
        match self.routes.get(&ssrc) {
            Some(existing) if existing.owner != owner => Err(StreamError::Registration {
                ssrc,
                reason: format!("already claimed by stream {}", existing.owner),
            }),
            _ => Ok(()),
        }
    }
}

fn unwrap_rtx(
    mut packet: RtpPacketReceived,
    media_ssrc: u32,
    payload_types: &BTreeMap<u8, u8>,
) -> Option<RtpPacketReceived> {
    if packet.payload.len() < 2 {
        debug!("RTX packet seq {} too short", packet.sequence_number);
        return None;
    }
    let Some(&media_pt) = payload_types.get(&packet.payload_type) else {
        warn!(
            "RTX payload type {} has no associated media type",
            packet.payload_type
        );
        return None;
    };

    let original_seq = u16::from_be_bytes([packet.payload[0], packet.payload[1]]);
    packet.payload = packet.payload.slice(2..);
    packet.ssrc = media_ssrc;
    packet.sequence_number = original_seq;
    packet.payload_type = media_pt;
    packet.recovered = true;
    Some(packet)
}

impl RtpStreamReceiverController for SsrcDemuxer {
    fn create_receiver(
        &self,
        spec: ReceiverSpec,
        sink: Arc<dyn RtpPacketSink>,
    ) -> Result<Box<dyn RtpStreamReceiver>> {
        if spec.remote_ssrc == 0 {
            return Err(StreamError::Registration {
                ssrc: 0,
                reason: "SSRC 0 is reserved".to_string(),
            });
        }
        if let Some(rtx) = &spec.rtx
            && rtx.ssrc == spec.remote_ssrc
        {
            return Err(StreamError::Registration {
                ssrc: rtx.ssrc,
                reason: "RTX SSRC equals media SSRC".to_string(),
            });
        }

        self.claim(spec.remote_ssrc, spec.owner)?;
        if let Some(rtx) = &spec.rtx {
            self.claim(rtx.ssrc, spec.owner)?;
        }

        let registration = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let mut ssrcs = vec![spec.remote_ssrc];
        self.routes.insert(
            spec.remote_ssrc,
            Route {
                owner: spec.owner,
                registration,
                kind: RouteKind::Media,
                sink: sink.clone(),
            },
        );
        if let Some(rtx) = &spec.rtx {
            ssrcs.push(rtx.ssrc);
            self.routes.insert(
                rtx.ssrc,
                Route {
                    owner: spec.owner,
                    registration,
                    kind: RouteKind::Rtx {
                        media_ssrc: spec.remote_ssrc,
                        payload_types: rtx.payload_types.clone(),
                    },
                    sink,
                },
            );
        }

        info!(
            "Registered stream {} for SSRC(s) {:x?} (registration {})",
            spec.owner, ssrcs, registration
        );
        Ok(Box::new(DemuxReceiver {
            routes: self.routes.clone(),
            spec,
            ssrcs,
            registration,
        }))
    }
}

struct DemuxReceiver {
    routes: Arc<RouteTable>,
    spec: ReceiverSpec,
    ssrcs: Vec<u32>,
    registration: u64,
}

impl RtpStreamReceiver for DemuxReceiver {
    fn spec(&self) -> &ReceiverSpec {
        &self.spec
    }
}

impl Drop for DemuxReceiver {
    fn drop(&mut self) {
        for ssrc in &self.ssrcs {
            // A newer registration by the same owner may have replaced ours.
            self.routes
                .remove_if(ssrc, |_, route| route.registration == self.registration);
        }
        debug!(
            "Released registration {} of stream {}",
            self.registration, self.spec.owner
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::receiver::RtxConfig;
    use crate::rtp::ExtensionIds;

    #[derive(Default)]
    struct CollectingSink {
        packets: Mutex<Vec<RtpPacketReceived>>,
    }

    impl RtpPacketSink for CollectingSink {
        fn on_rtp_packet(&self, packet: &RtpPacketReceived) {
            self.packets.lock().unwrap().push(packet.clone());
        }
    }

    fn spec(owner: u64, ssrc: u32, rtx: Option<RtxConfig>) -> ReceiverSpec {
        ReceiverSpec {
            owner,
            remote_ssrc: ssrc,
            rtx,
            extension_ids: ExtensionIds::default(),
        }
    }

    #[test]
    fn test_routes_by_ssrc() {
        let demuxer = SsrcDemuxer::new();
        let sink = Arc::new(CollectingSink::default());
        let _receiver = demuxer.create_receiver(spec(1, 100, None), sink.clone()).unwrap();

        assert!(demuxer.deliver(RtpPacketReceived::new(100, 1, 0, 96, vec![0u8; 2])));
        assert!(!demuxer.deliver(RtpPacketReceived::new(200, 1, 0, 96, vec![0u8; 2])));
        assert_eq!(sink.packets.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_ssrc_from_other_owner_rejected() {
        let demuxer = SsrcDemuxer::new();
        let sink = Arc::new(CollectingSink::default());
        let _first = demuxer.create_receiver(spec(1, 100, None), sink.clone()).unwrap();

        let err = demuxer
            .create_receiver(spec(2, 100, None), sink.clone())
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::Registration { ssrc: 100, .. }));
    }

    #[test]
    fn test_same_owner_replaces_and_old_guard_is_inert() {
        let demuxer = SsrcDemuxer::new();
        let sink = Arc::new(CollectingSink::default());
        let first = demuxer.create_receiver(spec(1, 100, None), sink.clone()).unwrap();
        let second = demuxer.create_receiver(spec(1, 100, None), sink.clone()).unwrap();

        drop(first);
        assert!(demuxer.is_registered(100));

        drop(second);
        assert!(!demuxer.is_registered(100));
    }

    #[test]
    fn test_rtx_packets_are_unwrapped() {
        let demuxer = SsrcDemuxer::new();
        let sink = Arc::new(CollectingSink::default());
        let rtx = RtxConfig {
            ssrc: 101,
            payload_types: BTreeMap::from([(97, 96)]),
        };
        let _receiver = demuxer
            .create_receiver(spec(1, 100, Some(rtx)), sink.clone())
            .unwrap();

        let mut payload = 513u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&[9, 9, 9, 9]);
        assert!(demuxer.deliver(RtpPacketReceived::new(101, 7, 4800, 97, payload)));
        // Unknown RTX payload type.
        assert!(!demuxer.deliver(RtpPacketReceived::new(101, 8, 4800, 98, vec![0u8; 4])));

        let packets = sink.packets.lock().unwrap();
        assert_eq!(packets.len(), 1);
        let restored = &packets[0];
        assert_eq!(restored.ssrc, 100);
        assert_eq!(restored.sequence_number, 513);
        assert_eq!(restored.payload_type, 96);
        assert_eq!(restored.payload.as_ref(), &[9, 9, 9, 9]);
        assert!(restored.recovered);
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let demuxer = SsrcDemuxer::new();
        let sink = Arc::new(CollectingSink::default());
        assert!(demuxer.create_receiver(spec(1, 0, None), sink.clone()).is_err());

        let rtx = RtxConfig {
            ssrc: 100,
            payload_types: BTreeMap::new(),
        };
        assert!(demuxer.create_receiver(spec(1, 100, Some(rtx)), sink).is_err());
        assert!(!demuxer.is_registered(100));
    }
}
