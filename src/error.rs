//! Error types for the receive stream.
//!
//! Only two kinds of failure ever reach a caller: registration failures at
//! construction (fatal, no object is produced) and local non-fatal failures
//! such as malformed RTCP or a rejected configuration. Buffer underruns are
//! not errors at all; they surface as muted frames.

use thiserror::Error;

/// Errors raised while parsing an RTCP compound packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtcpError {
    #[error("RTCP buffer too small: required {required} bytes, available {available}")]
    Truncated { required: usize, available: usize },

    #[error("Invalid RTCP version: {0}")]
    BadVersion(u8),

    #[error("RTCP length field does not match packet contents")]
    BadLength,

    #[error("Empty RTCP packet")]
    Empty,
}

/// Main error type for the receive stream and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The receiver controller refused the stream identity (duplicate or
    /// invalid SSRC). Fatal when raised during construction.
    #[error("Failed to register receiver for SSRC {ssrc}: {reason}")]
    Registration { ssrc: u32, reason: String },

    /// RTCP bytes could not be parsed. No state was changed.
    #[error("Malformed RTCP: {0}")]
    MalformedRtcp(#[from] RtcpError),

    /// The operation requires a started stream.
    #[error("Stream is not started")]
    NotStarted,

    /// A configuration snapshot was refused; the previous one stays in force.
    #[error("Configuration rejected: {0}")]
    ConfigRejected(String),

    /// The decode engine failed internally.
    #[error("Decode engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtcp_error_converts_to_stream_error() {
        let err: StreamError = RtcpError::Truncated {
            required: 28,
            available: 12,
        }
        .into();

        assert!(matches!(err, StreamError::MalformedRtcp(_)));
        assert_eq!(
            err.to_string(),
            "Malformed RTCP: RTCP buffer too small: required 28 bytes, available 12"
        );
    }
}
