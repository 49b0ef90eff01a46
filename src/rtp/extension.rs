//! RTP header extensions negotiated for a receive stream.
//!
//! RFC 5285: each distinct extension has a unique local id in `1..=14`. The
//! value 0 is reserved for padding and never names an extension, so it is
//! used here to mean "not negotiated".

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
pub const TRANSPORT_SEQUENCE_NUMBER_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

pub const MIN_EXTENSION_ID: u8 = 1;
pub const MAX_EXTENSION_ID: u8 = 14;

/// One negotiated header extension: URI plus local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RtpExtension {
    pub uri: String,
    pub id: u8,
}

impl RtpExtension {
    pub fn new(uri: impl Into<String>, id: u8) -> Self {
        Self {
            uri: uri.into(),
            id,
        }
    }

    pub fn is_valid_id(id: u8) -> bool {
        (MIN_EXTENSION_ID..=MAX_EXTENSION_ID).contains(&id)
    }
}

/// Local ids of the extensions this stream reads. 0 = not negotiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExtensionIds {
    pub audio_level: u8,
    pub transport_sequence_number: u8,
}

impl ExtensionIds {
    pub fn find(extensions: &[RtpExtension]) -> Self {
        find_extension_ids(extensions)
    }
}

/// Maps the ordered extension list to the ids for audio level and transport
/// sequence number.
///
/// The first valid occurrence of each kind wins. Entries with an id outside
/// `1..=14` are skipped.
pub fn find_extension_ids(extensions: &[RtpExtension]) -> ExtensionIds {
    let mut ids = ExtensionIds::default();

    for extension in extensions {
        if !RtpExtension::is_valid_id(extension.id) {
            warn!(
                "Ignoring extension {} with invalid local id {}",
                extension.uri, extension.id
            );
            continue;
        }

        let slot = match extension.uri.as_str() {
            AUDIO_LEVEL_URI => &mut ids.audio_level,
            TRANSPORT_SEQUENCE_NUMBER_URI => &mut ids.transport_sequence_number,
            _ => continue,
        };

        if *slot == 0 {
            *slot = extension.id;
        }
    }

    ids
}
