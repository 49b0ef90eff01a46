//! RTCP compound packets (RFC 3550 SR/RR, RFC 4585 generic NACK).
//!
//! Only what the receive path needs is decoded: sender reports for the
//! RTP/NTP mapping, report blocks for round-trip estimation, and generic NACK
//! for retransmission requests. Other packet types are skipped by length.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::RtcpError;
use crate::rtp::ntp::NtpTime;

pub const RTCP_VERSION: u8 = 2;
pub const RTCP_HEADER_SIZE: usize = 4;

pub const PT_SENDER_REPORT: u8 = 200;
pub const PT_RECEIVER_REPORT: u8 = 201;
pub const PT_TRANSPORT_FEEDBACK: u8 = 205;
pub const FMT_GENERIC_NACK: u8 = 1;

const SENDER_INFO_SIZE: usize = 24;
const NACK_FIXED_SIZE: usize = 8;
const MAX_REPORT_BLOCKS: usize = 31;

/// Report block in SR/RR packets (RFC 3550 6.4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// 24-bit signed on the wire.
    pub cumulative_lost: i32,
    pub highest_seq: u32,
    pub jitter: u32,
    /// Compact NTP of the last SR received from `ssrc`'s sender.
    pub last_sr: u32,
    /// Delay since that SR, 1/65536 seconds.
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    pub const SIZE: usize = 24;

    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            fraction_lost: 0,
            cumulative_lost: 0,
            highest_seq: 0,
            jitter: 0,
            last_sr: 0,
            delay_since_last_sr: 0,
        }
    }

    fn parse(buf: &mut impl Buf) -> Self {
        let ssrc = buf.get_u32();
        let fraction_lost = buf.get_u8();
        let raw_lost = (buf.get_u8() as u32) << 16 | (buf.get_u8() as u32) << 8 | buf.get_u8() as u32;
        let cumulative_lost = if raw_lost & 0x80_0000 != 0 {
            (raw_lost | 0xff00_0000) as i32
        } else {
            raw_lost as i32
        };

        Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq: buf.get_u32(),
            jitter: buf.get_u32(),
            last_sr: buf.get_u32(),
            delay_since_last_sr: buf.get_u32(),
        }
    }

    fn serialize(&self, buf: &mut BytesMut) {
        let lost = (self.cumulative_lost as u32) & 0x00ff_ffff;
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_u8((lost >> 16) as u8);
        buf.put_u8((lost >> 8) as u8);
        buf.put_u8(lost as u8);
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp: NtpTime,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub report_blocks: Vec<ReportBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub report_blocks: Vec<ReportBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub lost: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    GenericNack(GenericNack),
    /// Any packet type the receive path does not interpret.
    Other { packet_type: u8 },
}

/// Parses a compound RTCP packet.
///
/// Either every packet in the buffer is well formed and the full list is
/// returned, or an error is returned and nothing should be applied.
pub fn parse_compound(data: &[u8]) -> Result<Vec<RtcpPacket>, RtcpError> {
    if data.is_empty() {
        return Err(RtcpError::Empty);
    }

    let mut packets = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        if rest.len() < RTCP_HEADER_SIZE {
            return Err(RtcpError::Truncated {
                required: RTCP_HEADER_SIZE,
                available: rest.len(),
            });
        }

        let first_byte = rest[0];
        let version = first_byte >> 6;
        if version != RTCP_VERSION {
            return Err(RtcpError::BadVersion(version));
        }
        let padding = first_byte & 0x20 != 0;
        let count = first_byte & 0x1f;
        let packet_type = rest[1];
        let length = (u16::from_be_bytes([rest[2], rest[3]]) as usize + 1) * 4;

        if rest.len() < length {
            return Err(RtcpError::Truncated {
                required: length,
                available: rest.len(),
            });
        }

        let mut body = &rest[RTCP_HEADER_SIZE..length];
        if padding {
            let pad = *body.last().ok_or(RtcpError::BadLength)? as usize;
            if pad == 0 || pad > body.len() {
                return Err(RtcpError::BadLength);
            }
            body = &body[..body.len() - pad];
        }

        packets.push(parse_packet(packet_type, count, body)?);
        rest = &rest[length..];
    }

    Ok(packets)
}

fn ensure_len(body: &[u8], required: usize) -> Result<(), RtcpError> {
    if body.len() < required {
        return Err(RtcpError::Truncated {
            required,
            available: body.len(),
        });
    }
    Ok(())
}

fn parse_packet(packet_type: u8, count: u8, mut body: &[u8]) -> Result<RtcpPacket, RtcpError> {
    match packet_type {
        PT_SENDER_REPORT => {
            ensure_len(body, SENDER_INFO_SIZE + count as usize * ReportBlock::SIZE)?;
            let ssrc = body.get_u32();
            let ntp = NtpTime::new(body.get_u32(), body.get_u32());
            let rtp_timestamp = body.get_u32();
            let packet_count = body.get_u32();
            let octet_count = body.get_u32();
            let report_blocks = (0..count).map(|_| ReportBlock::parse(&mut body)).collect();

            Ok(RtcpPacket::SenderReport(SenderReport {
                ssrc,
                ntp,
                rtp_timestamp,
                packet_count,
                octet_count,
                report_blocks,
            }))
        }
        PT_RECEIVER_REPORT => {
            ensure_len(body, 4 + count as usize * ReportBlock::SIZE)?;
            let ssrc = body.get_u32();
            let report_blocks = (0..count).map(|_| ReportBlock::parse(&mut body)).collect();

            Ok(RtcpPacket::ReceiverReport(ReceiverReport {
                ssrc,
                report_blocks,
            }))
        }
        PT_TRANSPORT_FEEDBACK if count == FMT_GENERIC_NACK => {
            ensure_len(body, NACK_FIXED_SIZE)?;
            if (body.len() - NACK_FIXED_SIZE) % 4 != 0 {
                return Err(RtcpError::BadLength);
            }
            let sender_ssrc = body.get_u32();
            let media_ssrc = body.get_u32();

            let mut lost = Vec::new();
            while body.has_remaining() {
                let pid = body.get_u16();
                let blp = body.get_u16();
                lost.push(pid);
                for bit in 0..16u16 {
                    if blp & (1 << bit) != 0 {
                        lost.push(pid.wrapping_add(bit + 1));
                    }
                }
            }

            Ok(RtcpPacket::GenericNack(GenericNack {
                sender_ssrc,
                media_ssrc,
                lost,
            }))
        }
        _ => Ok(RtcpPacket::Other { packet_type }),
    }
}

fn put_header(buf: &mut BytesMut, count: u8, packet_type: u8, body_len: usize) {
    let words = (RTCP_HEADER_SIZE + body_len) / 4 - 1;
    buf.put_u8((RTCP_VERSION << 6) | (count & 0x1f));
    buf.put_u8(packet_type);
    buf.put_u16(words as u16);
}

fn nack_items(lost: &[u16]) -> Vec<(u16, u16)> {
    let mut sorted = lost.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut items: Vec<(u16, u16)> = Vec::new();
    for seq in sorted {
        if let Some((pid, blp)) = items.last_mut() {
            let diff = seq.wrapping_sub(*pid);
            if (1..=16).contains(&diff) {
                *blp |= 1 << (diff - 1);
                continue;
            }
        }
        items.push((seq, 0));
    }
    items
}

impl RtcpPacket {
    /// Appends the wire form to `buf`. `Other` packets carry no body and are
    /// not written.
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            RtcpPacket::SenderReport(sr) => {
                let blocks = &sr.report_blocks[..sr.report_blocks.len().min(MAX_REPORT_BLOCKS)];
                put_header(
                    buf,
                    blocks.len() as u8,
                    PT_SENDER_REPORT,
                    SENDER_INFO_SIZE + blocks.len() * ReportBlock::SIZE,
                );
                buf.put_u32(sr.ssrc);
                buf.put_u32(sr.ntp.seconds);
                buf.put_u32(sr.ntp.fraction);
                buf.put_u32(sr.rtp_timestamp);
                buf.put_u32(sr.packet_count);
                buf.put_u32(sr.octet_count);
                for block in blocks {
                    block.serialize(buf);
                }
            }
            RtcpPacket::ReceiverReport(rr) => {
                let blocks = &rr.report_blocks[..rr.report_blocks.len().min(MAX_REPORT_BLOCKS)];
                put_header(
                    buf,
                    blocks.len() as u8,
                    PT_RECEIVER_REPORT,
                    4 + blocks.len() * ReportBlock::SIZE,
                );
                buf.put_u32(rr.ssrc);
                for block in blocks {
                    block.serialize(buf);
                }
            }
            RtcpPacket::GenericNack(nack) => {
                let items = nack_items(&nack.lost);
                put_header(
                    buf,
                    FMT_GENERIC_NACK,
                    PT_TRANSPORT_FEEDBACK,
                    NACK_FIXED_SIZE + items.len() * 4,
                );
                buf.put_u32(nack.sender_ssrc);
                buf.put_u32(nack.media_ssrc);
                for (pid, blp) in items {
                    buf.put_u16(pid);
                    buf.put_u16(blp);
                }
            }
            RtcpPacket::Other { .. } => {}
        }
    }
}

pub fn serialize_compound(packets: &[RtcpPacket]) -> Bytes {
    let mut buf = BytesMut::new();
    for packet in packets {
        packet.serialize(&mut buf);
    }
    buf.freeze()
}
