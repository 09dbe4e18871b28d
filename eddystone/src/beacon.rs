/*!
UID and EID beacon frames.

Both frame types share a layout: frame type byte, signed transmit power,
then the beacon identifier. UID frames carry a static 16-byte identifier
(10-byte namespace + 6-byte instance) followed by two optional RFU bytes;
EID frames carry an 8-byte rotating identifier, taken as-is without any
cryptographic check.
*/

use crate::error::{DecodeError, Result};
use crate::frame::{expect_frame_type, FrameType, TelemetryFrame};
use crate::protocol::{
    EID_FRAME_MIN_LEN, EID_IDENTIFIER_LEN, IDENTIFIER_OFFSET, TX_POWER_OFFSET,
    UID_FRAME_MIN_LEN, UID_IDENTIFIER_LEN, UID_NAMESPACE_LEN,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Kind of identifier a beacon broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BeaconType {
    /// Static, unprotected identifier
    Uid,
    /// Rotating, encrypted ephemeral identifier
    Eid,
}

impl BeaconType {
    /// Required identifier length in bytes
    pub fn identifier_len(self) -> usize {
        match self {
            Self::Uid => UID_IDENTIFIER_LEN,
            Self::Eid => EID_IDENTIFIER_LEN,
        }
    }

    /// Shortest frame that holds the whole identifier
    pub fn min_frame_len(self) -> usize {
        match self {
            Self::Uid => UID_FRAME_MIN_LEN,
            Self::Eid => EID_FRAME_MIN_LEN,
        }
    }

    /// Frame type that carries this kind of beacon
    pub fn frame_type(self) -> FrameType {
        match self {
            Self::Uid => FrameType::Uid,
            Self::Eid => FrameType::Eid,
        }
    }
}

impl fmt::Display for BeaconType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.frame_type().as_str())
    }
}

/// One decoded UID or EID advertisement.
///
/// Observations are immutable; attaching telemetry produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeaconObservation {
    #[serde(with = "hex::serde")]
    identifier: Vec<u8>,
    beacon_type: BeaconType,
    rssi: i16,
    tx_power: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    telemetry: Option<TelemetryFrame>,
}

impl BeaconObservation {
    /// Build an observation, rejecting identifiers of the wrong length
    pub fn new(
        beacon_type: BeaconType,
        identifier: impl Into<Vec<u8>>,
        tx_power: i8,
        rssi: i16,
    ) -> Result<Self> {
        let identifier = identifier.into();
        let expected = beacon_type.identifier_len();
        if identifier.len() != expected {
            return Err(DecodeError::InvalidIdentifier {
                beacon_type,
                expected,
                actual: identifier.len(),
            });
        }

        Ok(Self {
            identifier,
            beacon_type,
            rssi,
            tx_power,
            telemetry: None,
        })
    }

    /// Return a copy of this observation carrying the given telemetry
    pub fn with_telemetry(self, telemetry: TelemetryFrame) -> Self {
        Self {
            telemetry: Some(telemetry),
            ..self
        }
    }

    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Identifier as lowercase, zero-padded hex
    pub fn identifier_hex(&self) -> String {
        hex::encode(&self.identifier)
    }

    pub fn beacon_type(&self) -> BeaconType {
        self.beacon_type
    }

    /// Received signal strength in dBm, as reported by the scanner
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Calibrated transmit power in dBm
    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    /// Raw telemetry payload, if a TLM frame was attached
    pub fn telemetry(&self) -> Option<&[u8]> {
        self.telemetry.as_ref().map(TelemetryFrame::payload)
    }

    /// Namespace part of a UID identifier
    pub fn namespace(&self) -> Option<&[u8]> {
        match self.beacon_type {
            BeaconType::Uid => Some(&self.identifier[..UID_NAMESPACE_LEN]),
            BeaconType::Eid => None,
        }
    }

    /// Instance part of a UID identifier
    pub fn instance(&self) -> Option<&[u8]> {
        match self.beacon_type {
            BeaconType::Uid => Some(&self.identifier[UID_NAMESPACE_LEN..]),
            BeaconType::Eid => None,
        }
    }

    /// Rough distance to the beacon in meters, from the RSSI/tx power ratio.
    ///
    /// `None` when either reading is zero, since the ratio is meaningless then.
    pub fn estimated_distance(&self) -> Option<f64> {
        if self.rssi == 0 || self.tx_power == 0 {
            return None;
        }

        let ratio = f64::from(self.rssi) / f64::from(self.tx_power);
        let distance = if ratio < 1.0 {
            ratio.powi(10)
        } else {
            0.89976 * ratio.powf(7.7095) + 0.111
        };

        Some(distance)
    }
}

/// Decode a UID frame.
///
/// Needs at least 18 bytes; the two RFU bytes that normally follow the
/// identifier are ignored when present.
pub fn decode_uid(service_data: &[u8], rssi: i16) -> Result<BeaconObservation> {
    decode_beacon(service_data, rssi, BeaconType::Uid)
}

/// Decode an EID frame. Needs at least 10 bytes.
pub fn decode_eid(service_data: &[u8], rssi: i16) -> Result<BeaconObservation> {
    decode_beacon(service_data, rssi, BeaconType::Eid)
}

fn decode_beacon(
    service_data: &[u8],
    rssi: i16,
    beacon_type: BeaconType,
) -> Result<BeaconObservation> {
    let frame_type = beacon_type.frame_type();
    expect_frame_type(service_data, frame_type)?;

    let min_len = beacon_type.min_frame_len();
    if service_data.len() < min_len {
        return Err(DecodeError::truncated(frame_type, min_len, service_data.len()));
    }

    // Two's complement: 0xCE is -50 dBm
    let tx_power = service_data[TX_POWER_OFFSET] as i8;
    let identifier_end = IDENTIFIER_OFFSET + beacon_type.identifier_len();
    let identifier = &service_data[IDENTIFIER_OFFSET..identifier_end];

    trace!(
        "{} beacon {} tx_power={} rssi={}",
        beacon_type,
        hex::encode(identifier),
        tx_power,
        rssi
    );

    BeaconObservation::new(beacon_type, identifier, tx_power, rssi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid_frame(len: usize) -> Vec<u8> {
        let mut data = vec![0x00, 0xce];
        data.extend((0..len.saturating_sub(2)).map(|i| i as u8 + 1));
        data.truncate(len);
        data
    }

    #[test]
    fn test_decode_uid() {
        let data = uid_frame(20);
        let obs = decode_uid(&data, -72).unwrap();

        assert_eq!(obs.beacon_type(), BeaconType::Uid);
        assert_eq!(obs.identifier().len(), 16);
        assert_eq!(obs.identifier(), &data[2..18]);
        assert_eq!(obs.tx_power(), -50);
        assert_eq!(obs.rssi(), -72);
        assert!(obs.telemetry().is_none());
    }

    #[test]
    fn test_decode_uid_without_rfu() {
        let obs = decode_uid(&uid_frame(18), -60).unwrap();
        assert_eq!(obs.identifier().len(), 16);
    }

    #[test]
    fn test_decode_uid_truncated() {
        for len in 1..18 {
            let result = decode_uid(&uid_frame(len), -60);
            assert_eq!(
                result,
                Err(DecodeError::TruncatedFrame {
                    frame_type: FrameType::Uid,
                    expected: 18,
                    actual: len,
                })
            );
        }
    }

    #[test]
    fn test_decode_eid() {
        let data = [0x30, 0xf4, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        let obs = decode_eid(&data, -80).unwrap();

        assert_eq!(obs.beacon_type(), BeaconType::Eid);
        assert_eq!(obs.identifier(), &[0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(obs.identifier_hex(), "deadbeef01020304");
        assert_eq!(obs.tx_power(), -12);
        assert!(obs.namespace().is_none());
        assert!(obs.instance().is_none());
    }

    #[test]
    fn test_decode_eid_truncated() {
        let data = [0x30, 0xf4, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03];
        assert!(matches!(
            decode_eid(&data, -80),
            Err(DecodeError::TruncatedFrame { expected: 10, actual: 9, .. })
        ));
    }

    #[test]
    fn test_wrong_frame_type_rejected() {
        let mut data = uid_frame(20);
        data[0] = 0x30;
        assert_eq!(
            decode_uid(&data, 0),
            Err(DecodeError::UnexpectedFrameType {
                expected: FrameType::Uid,
                found: FrameType::Eid,
            })
        );
    }

    #[test]
    fn test_tx_power_is_signed() {
        let mut data = uid_frame(18);
        data[1] = 0xce;
        assert_eq!(decode_uid(&data, 0).unwrap().tx_power(), -50);
        data[1] = 0x04;
        assert_eq!(decode_uid(&data, 0).unwrap().tx_power(), 4);
    }

    #[test]
    fn test_identifier_length_enforced() {
        assert_eq!(
            BeaconObservation::new(BeaconType::Uid, vec![0u8; 8], 0, 0),
            Err(DecodeError::InvalidIdentifier {
                beacon_type: BeaconType::Uid,
                expected: 16,
                actual: 8,
            })
        );
        assert!(BeaconObservation::new(BeaconType::Eid, vec![0u8; 16], 0, 0).is_err());
        assert!(BeaconObservation::new(BeaconType::Eid, vec![0u8; 8], 0, 0).is_ok());
    }

    #[test]
    fn test_namespace_and_instance() {
        let obs = decode_uid(&uid_frame(20), -60).unwrap();
        assert_eq!(obs.namespace().unwrap(), &obs.identifier()[..10]);
        assert_eq!(obs.instance().unwrap(), &obs.identifier()[10..]);
        assert_eq!(obs.instance().unwrap().len(), 6);
    }

    #[test]
    fn test_identifier_hex_is_zero_padded() {
        let mut data = vec![0x00, 0x00];
        data.extend([0x0a; 16]);
        let obs = decode_uid(&data, 0).unwrap();
        assert_eq!(obs.identifier_hex(), "0a".repeat(16));
    }

    #[test]
    fn test_with_telemetry() {
        let obs = decode_uid(&uid_frame(18), -60).unwrap();
        let with_tlm = obs.clone().with_telemetry(TelemetryFrame::new(vec![0x00, 0x0b, 0xb8]));

        assert!(obs.telemetry().is_none());
        assert_eq!(with_tlm.telemetry(), Some(&[0x00, 0x0b, 0xb8][..]));
        assert_eq!(with_tlm.identifier(), obs.identifier());
    }

    #[test]
    fn test_estimated_distance() {
        let near = BeaconObservation::new(BeaconType::Eid, vec![0u8; 8], -59, -30).unwrap();
        let d = near.estimated_distance().unwrap();
        assert!(d > 0.0 && d < 1.0, "distance {}", d);

        let far = BeaconObservation::new(BeaconType::Eid, vec![0u8; 8], -59, -80).unwrap();
        assert!(far.estimated_distance().unwrap() > 1.0);

        let at_reference = BeaconObservation::new(BeaconType::Eid, vec![0u8; 8], -59, -59).unwrap();
        assert!((at_reference.estimated_distance().unwrap() - 1.01076).abs() < 1e-6);

        let no_rssi = BeaconObservation::new(BeaconType::Eid, vec![0u8; 8], -59, 0).unwrap();
        assert_eq!(no_rssi.estimated_distance(), None);
    }

    #[test]
    fn test_observation_serializes_hex() {
        let data = [0x30, 0xf4, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        let obs = decode_eid(&data, -80).unwrap();
        let json = serde_json::to_value(&obs).unwrap();

        assert_eq!(json["identifier"], "deadbeef01020304");
        assert_eq!(json["beacon_type"], "EID");
        assert_eq!(json["tx_power"], -12);
        assert_eq!(json["rssi"], -80);
        assert!(json.get("telemetry").is_none());
    }
}
