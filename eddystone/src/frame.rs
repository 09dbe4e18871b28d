/*!
Frame classification and one-shot decoding.

The first byte of the Eddystone service data selects the frame type. This
module maps that byte to a [`FrameType`] and dispatches the buffer to the
matching decoder, yielding a [`Frame`].
*/

use crate::beacon::{decode_eid, decode_uid, BeaconObservation};
use crate::error::{DecodeError, Result};
use crate::protocol::{
    FRAME_TYPE_EID, FRAME_TYPE_EMPTY, FRAME_TYPE_TLM, FRAME_TYPE_UID, FRAME_TYPE_URL,
};
use crate::url_frame::{decode_url, EddystoneUrl};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Eddystone frame types, keyed by the leading service-data byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Uid,
    Url,
    Telemetry,
    Eid,
    Empty,
    Unknown,
}

impl FrameType {
    /// Classify a frame type byte; unrecognized codes map to `Unknown`
    pub fn from_u8(value: u8) -> Self {
        match value {
            FRAME_TYPE_UID => Self::Uid,
            FRAME_TYPE_URL => Self::Url,
            FRAME_TYPE_TLM => Self::Telemetry,
            FRAME_TYPE_EID => Self::Eid,
            FRAME_TYPE_EMPTY => Self::Empty,
            _ => Self::Unknown,
        }
    }

    /// The wire code for this frame type, if it has one
    pub fn code(self) -> Option<u8> {
        match self {
            Self::Uid => Some(FRAME_TYPE_UID),
            Self::Url => Some(FRAME_TYPE_URL),
            Self::Telemetry => Some(FRAME_TYPE_TLM),
            Self::Eid => Some(FRAME_TYPE_EID),
            Self::Empty => Some(FRAME_TYPE_EMPTY),
            Self::Unknown => None,
        }
    }

    /// Short display name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Url => "URL",
            Self::Telemetry => "TLM",
            Self::Eid => "EID",
            Self::Empty => "Empty",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a service-data buffer by its first byte.
///
/// Never fails: an empty buffer or an unrecognized leading byte is
/// [`FrameType::Unknown`].
pub fn classify(service_data: &[u8]) -> FrameType {
    service_data
        .first()
        .map_or(FrameType::Unknown, |&b| FrameType::from_u8(b))
}

/// Check that a buffer classifies as `expected` before a typed decoder reads it
pub(crate) fn expect_frame_type(service_data: &[u8], expected: FrameType) -> Result<()> {
    let found = classify(service_data);
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedFrameType { expected, found })
    }
}

/// Raw payload of a TLM frame (everything after the frame type byte).
///
/// TLM frames carry no identifier, so attaching one to a beacon is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(with = "hex::serde")]
    payload: Vec<u8>,
}

impl TelemetryFrame {
    /// Wrap raw telemetry bytes
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take the payload bytes out of the frame
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Extract the raw payload of a TLM frame
pub fn decode_telemetry(service_data: &[u8]) -> Result<TelemetryFrame> {
    expect_frame_type(service_data, FrameType::Telemetry)?;
    Ok(TelemetryFrame::new(&service_data[1..]))
}

/// A decoded frame of any type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "frame", content = "data", rename_all = "snake_case")]
pub enum Frame {
    Uid(BeaconObservation),
    Eid(BeaconObservation),
    Url(EddystoneUrl),
    Telemetry(TelemetryFrame),
    Empty,
}

impl Frame {
    /// The frame type this frame was decoded from
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Uid(_) => FrameType::Uid,
            Frame::Eid(_) => FrameType::Eid,
            Frame::Url(_) => FrameType::Url,
            Frame::Telemetry(_) => FrameType::Telemetry,
            Frame::Empty => FrameType::Empty,
        }
    }
}

/// Classify and decode a service-data buffer in one step.
///
/// `rssi` is only used by UID and EID frames.
pub fn decode(service_data: &[u8], rssi: i16) -> Result<Frame> {
    let frame_type = classify(service_data);
    trace!("Decoding {} frame ({} bytes)", frame_type, service_data.len());

    let frame = match frame_type {
        FrameType::Uid => Frame::Uid(decode_uid(service_data, rssi)?),
        FrameType::Eid => Frame::Eid(decode_eid(service_data, rssi)?),
        FrameType::Url => Frame::Url(decode_url(service_data)?),
        FrameType::Telemetry => Frame::Telemetry(decode_telemetry(service_data)?),
        FrameType::Empty => Frame::Empty,
        FrameType::Unknown => {
            return Err(DecodeError::UnrecognizedFrameType(
                service_data.first().copied(),
            ))
        }
    };

    Ok(frame)
}
