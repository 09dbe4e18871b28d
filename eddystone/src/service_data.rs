/*!
Locating Eddystone service data in a BLE advertisement.

Scanners expose service data either as a UUID-keyed map or as the raw
advertising payload (a run of `[len][type][data]` AD structures). Both
shapes are handled here. The configuration service UUID is accepted as a
fallback because beacons in configuration mode advertise under it instead of
`0xFEAA`.
*/

use uuid::Uuid;

/// Bluetooth Base UUID (`00000000-0000-1000-8000-00805f9b34fb`)
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// 16-bit Eddystone service UUID
pub const EDDYSTONE_SERVICE_UUID_16: u16 = 0xFEAA;

/// Eddystone service UUID in 128-bit form
pub const EDDYSTONE_SERVICE_UUID: Uuid = uuid_from_u16(EDDYSTONE_SERVICE_UUID_16);

/// Eddystone GATT configuration service UUID
pub const CONFIGURATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xa3c8_7500_8ed3_4bdf_8a39_a01b_ebed_e295);

/// AD type: Service Data, 16-bit UUID
const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;

/// AD type: Service Data, 128-bit UUID
const AD_TYPE_SERVICE_DATA_128: u8 = 0x21;

/// Expand a 16-bit SIG UUID onto the Bluetooth Base UUID
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Parse a service UUID given in 16-bit short form (`"FEAA"`) or as a full UUID
pub fn parse_service_uuid(s: &str) -> Option<Uuid> {
    let s = s.trim();
    if s.len() == 4 {
        return u16::from_str_radix(s, 16).ok().map(uuid_from_u16);
    }
    Uuid::parse_str(s).ok()
}

/// Pick the Eddystone service data out of a UUID-keyed collection.
///
/// Non-empty data under `0xFEAA` wins; otherwise data under the configuration
/// service UUID is returned if present.
pub fn select_service_data<'a, I, D>(entries: I) -> Option<&'a [u8]>
where
    I: IntoIterator<Item = (&'a Uuid, &'a D)>,
    D: AsRef<[u8]> + ?Sized + 'a,
{
    let mut fallback = None;

    for (uuid, data) in entries {
        let data = data.as_ref();
        if *uuid == EDDYSTONE_SERVICE_UUID && !data.is_empty() {
            return Some(data);
        }
        if *uuid == CONFIGURATION_SERVICE_UUID {
            fallback = Some(data);
        }
    }

    fallback
}

/// Find the Eddystone service data in a raw advertising payload.
///
/// Walks the AD structures, returning the payload of the first 16-bit
/// Service Data structure for `0xFEAA`, or else of a 128-bit Service Data
/// structure for the configuration service. A structure whose length runs
/// past the end of the buffer ends the walk.
pub fn eddystone_service_data(adv_data: &[u8]) -> Option<&[u8]> {
    let mut fallback = None;
    let mut i = 0usize;

    while i < adv_data.len() {
        let len = usize::from(adv_data[i]);
        i += 1;
        if len == 0 {
            continue;
        }
        if i + len > adv_data.len() {
            break;
        }

        let ad_type = adv_data[i];
        let data = &adv_data[i + 1..i + len];
        i += len;

        match ad_type {
            AD_TYPE_SERVICE_DATA_16 if data.len() >= 2 => {
                let uuid = u16::from_le_bytes([data[0], data[1]]);
                if uuid == EDDYSTONE_SERVICE_UUID_16 {
                    return Some(&data[2..]);
                }
            }
            AD_TYPE_SERVICE_DATA_128 if data.len() >= 16 && fallback.is_none() => {
                let mut uuid_le = [0u8; 16];
                uuid_le.copy_from_slice(&data[..16]);
                if Uuid::from_u128(u128::from_le_bytes(uuid_le)) == CONFIGURATION_SERVICE_UUID {
                    fallback = Some(&data[16..]);
                }
            }
            _ => {}
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_uuid_constants() {
        assert_eq!(
            EDDYSTONE_SERVICE_UUID.to_string(),
            "0000feaa-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            CONFIGURATION_SERVICE_UUID.to_string(),
            "a3c87500-8ed3-4bdf-8a39-a01bebede295"
        );
    }

    #[test]
    fn test_parse_service_uuid() {
        assert_eq!(parse_service_uuid("FEAA"), Some(EDDYSTONE_SERVICE_UUID));
        assert_eq!(parse_service_uuid("feaa"), Some(EDDYSTONE_SERVICE_UUID));
        assert_eq!(
            parse_service_uuid("0000FEAA-0000-1000-8000-00805F9B34FB"),
            Some(EDDYSTONE_SERVICE_UUID)
        );
        assert_eq!(parse_service_uuid("zzzz"), None);
        assert_eq!(parse_service_uuid("not-a-uuid"), None);
    }

    #[test]
    fn test_select_service_data() {
        let mut map: HashMap<Uuid, Vec<u8>> = HashMap::new();
        map.insert(uuid_from_u16(0x180f), vec![0x64]);
        assert_eq!(select_service_data(&map), None);

        map.insert(CONFIGURATION_SERVICE_UUID, vec![0x40]);
        assert_eq!(select_service_data(&map), Some(&[0x40][..]));

        map.insert(EDDYSTONE_SERVICE_UUID, vec![0x00, 0x01]);
        assert_eq!(select_service_data(&map), Some(&[0x00, 0x01][..]));

        // Empty Eddystone data falls back to the configuration service
        map.insert(EDDYSTONE_SERVICE_UUID, Vec::new());
        assert_eq!(select_service_data(&map), Some(&[0x40][..]));
    }

    #[test]
    fn test_eddystone_service_data_from_adv() {
        // Flags, complete 16-bit UUID list, then service data for 0xFEAA
        let adv = [
            0x02, 0x01, 0x06,
            0x03, 0x03, 0xaa, 0xfe,
            0x06, 0x16, 0xaa, 0xfe, 0x10, 0xeb, 0x03,
        ];
        assert_eq!(eddystone_service_data(&adv), Some(&[0x10, 0xeb, 0x03][..]));
    }

    #[test]
    fn test_eddystone_service_data_skips_other_uuids() {
        let adv = [0x04, 0x16, 0x0f, 0x18, 0x64];
        assert_eq!(eddystone_service_data(&adv), None);
    }

    #[test]
    fn test_eddystone_service_data_configuration_fallback() {
        let mut adv = vec![0x12, 0x21];
        adv.extend_from_slice(&CONFIGURATION_SERVICE_UUID.as_u128().to_le_bytes());
        adv.push(0x40);
        assert_eq!(eddystone_service_data(&adv), Some(&[0x40][..]));
    }

    #[test]
    fn test_eddystone_service_data_truncated_structure() {
        let adv = [0x02, 0x01, 0x06, 0x09, 0x16, 0xaa, 0xfe];
        assert_eq!(eddystone_service_data(&adv), None);
        assert_eq!(eddystone_service_data(&[]), None);
    }
}
