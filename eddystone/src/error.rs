/*!
Decode error types for Eddystone frames.

Malformed radio input is routine, so every failure here is a plain value the
caller is expected to log and drop before carrying on with the scan.
*/

use crate::beacon::BeaconType;
use crate::frame::FrameType;
use thiserror::Error;

/// Common result type used throughout the eddystone library
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors that can occur while decoding a service-data buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the classified frame type requires
    #[error("Truncated {frame_type} frame: expected at least {expected} bytes, got {actual}")]
    TruncatedFrame {
        frame_type: FrameType,
        expected: usize,
        actual: usize,
    },

    /// URL frame scheme byte outside the scheme table
    #[error("Invalid URL scheme code: 0x{0:02x}")]
    InvalidScheme(u8),

    /// The reconstructed URL does not parse
    #[error("Malformed URL {url:?}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Leading byte matches no frame type (`None` for an empty buffer)
    #[error("Unrecognized frame type: {}", describe_leading_byte(.0))]
    UnrecognizedFrameType(Option<u8>),

    /// A type-specific decoder was handed a frame of another type
    #[error("Expected {expected} frame, found {found}")]
    UnexpectedFrameType { expected: FrameType, found: FrameType },

    /// Identifier does not have the length its beacon type mandates
    #[error("Invalid {beacon_type} identifier: expected {expected} bytes, got {actual}")]
    InvalidIdentifier {
        beacon_type: BeaconType,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    /// Create a new truncated frame error
    pub fn truncated(frame_type: FrameType, expected: usize, actual: usize) -> Self {
        Self::TruncatedFrame {
            frame_type,
            expected,
            actual,
        }
    }
}

fn describe_leading_byte(byte: &Option<u8>) -> String {
    match byte {
        Some(b) => format!("0x{:02x}", b),
        None => "empty buffer".to_string(),
    }
}
