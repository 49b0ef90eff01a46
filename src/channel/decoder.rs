//! Decoder construction.
//!
//! Codecs are described by [`SdpAudioFormat`] and instantiated through an
//! [`AudioDecoderFactory`]. The built-in factory understands linear PCM
//! (`L16`, RFC 3551), which is enough for loopback and tests; real codecs
//! plug in through the same trait.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpAudioFormat {
    pub name: String,
    pub clock_rate_hz: u32,
    pub num_channels: usize,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl SdpAudioFormat {
    pub fn new(name: impl Into<String>, clock_rate_hz: u32, num_channels: usize) -> Self {
        Self {
            name: name.into(),
            clock_rate_hz,
            num_channels,
            parameters: BTreeMap::new(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

pub trait AudioDecoder: Send {
    fn sample_rate_hz(&self) -> u32;

    fn channels(&self) -> usize;

    /// Decodes one RTP payload into interleaved PCM.
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>>;
}

pub trait AudioDecoderFactory: Send + Sync {
    fn is_supported(&self, format: &SdpAudioFormat) -> bool;

    fn make_decoder(&self, format: &SdpAudioFormat) -> Option<Box<dyn AudioDecoder>>;
}

/// Big-endian 16-bit linear PCM.
pub struct L16Decoder {
    sample_rate_hz: u32,
    channels: usize,
}

impl L16Decoder {
    pub fn new(sample_rate_hz: u32, channels: usize) -> Self {
        Self {
            sample_rate_hz,
            channels,
        }
    }
}

impl AudioDecoder for L16Decoder {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        if payload.len() % (2 * self.channels) != 0 {
            anyhow::bail!(
                "L16 payload of {} bytes is not a whole number of {}-channel samples",
                payload.len(),
                self.channels
            );
        }
        Ok(payload
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .collect())
    }
}

/// Factory for the codecs this crate decodes natively.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDecoderFactory;

impl BuiltinDecoderFactory {
    const SUPPORTED_RATES: [u32; 5] = [8000, 16000, 32000, 44100, 48000];
}

impl AudioDecoderFactory for BuiltinDecoderFactory {
    fn is_supported(&self, format: &SdpAudioFormat) -> bool {
        format.is_named("L16")
            && Self::SUPPORTED_RATES.contains(&format.clock_rate_hz)
            && (1..=2).contains(&format.num_channels)
    }

    fn make_decoder(&self, format: &SdpAudioFormat) -> Option<Box<dyn AudioDecoder>> {
        if !self.is_supported(format) {
            return None;
        }
        Some(Box::new(L16Decoder::new(
            format.clock_rate_hz,
            format.num_channels,
        )))
    }
}

/// Encodes PCM as an L16 payload. Used by the loopback sender and tests.
pub fn encode_l16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}
