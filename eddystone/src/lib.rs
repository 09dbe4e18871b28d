/*!
# Eddystone Frame Decoding

This crate turns the service data advertised under the Eddystone service
UUID (`0xFEAA`) into typed beacon observations. Everything here is pure and
stateless: a decode call reads only its input buffer and allocates only its
own result, so it can be called from any thread.

## Core Types

- [`FrameType`] - Frame classification from the leading byte
- [`Frame`] - A fully decoded frame of any type
- [`BeaconObservation`] - Decoded UID/EID beacon sighting
- [`EddystoneUrl`] - Reconstructed Eddystone-URL
- [`TelemetryFrame`] - Raw TLM payload

## Modules

- [`frame`] - Classification and one-shot decoding
- [`beacon`] - UID/EID frame decoding
- [`url_frame`] - Eddystone-URL compression tables and decoding
- [`service_data`] - Locating Eddystone service data in an advertisement
- [`error`] - Decode error types
*/

pub mod beacon;
pub mod error;
pub mod frame;
pub mod service_data;
pub mod url_frame;

// Re-export commonly used types
pub use beacon::{decode_eid, decode_uid, BeaconObservation, BeaconType};
pub use error::{DecodeError, Result};
pub use frame::{classify, decode, decode_telemetry, Frame, FrameType, TelemetryFrame};
pub use service_data::{eddystone_service_data, select_service_data};
pub use url_frame::{decode_url, encode_url, EddystoneUrl, UrlEncodeError};

/// Version information for the eddystone library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// UID frame type code
    pub const FRAME_TYPE_UID: u8 = 0x00;

    /// URL frame type code
    pub const FRAME_TYPE_URL: u8 = 0x10;

    /// TLM frame type code
    pub const FRAME_TYPE_TLM: u8 = 0x20;

    /// EID frame type code
    pub const FRAME_TYPE_EID: u8 = 0x30;

    /// Empty frame type code
    pub const FRAME_TYPE_EMPTY: u8 = 0x40;

    /// Offset of the signed transmit power byte in UID, EID and URL frames
    pub const TX_POWER_OFFSET: usize = 1;

    /// Offset of the beacon identifier in UID and EID frames
    pub const IDENTIFIER_OFFSET: usize = 2;

    /// Length of a UID beacon identifier (10-byte namespace + 6-byte instance)
    pub const UID_IDENTIFIER_LEN: usize = 16;

    /// Length of the namespace part of a UID identifier
    pub const UID_NAMESPACE_LEN: usize = 10;

    /// Length of an EID ephemeral identifier
    pub const EID_IDENTIFIER_LEN: usize = 8;

    /// Shortest UID frame we accept; the two trailing RFU bytes are optional
    pub const UID_FRAME_MIN_LEN: usize = IDENTIFIER_OFFSET + UID_IDENTIFIER_LEN;

    /// Shortest EID frame we accept
    pub const EID_FRAME_MIN_LEN: usize = IDENTIFIER_OFFSET + EID_IDENTIFIER_LEN;

    /// Offset of the URL scheme code in a URL frame
    pub const URL_SCHEME_OFFSET: usize = 2;

    /// Shortest URL frame we accept (frame type, tx power, scheme)
    pub const URL_FRAME_MIN_LEN: usize = URL_SCHEME_OFFSET + 1;
}
