//! BLE Service and Characteristic UUIDs.
//!
//! Standard Bluetooth SIG assigned numbers used by heart-rate straps.

use uuid::Uuid;

/// Base UUID for 16-bit Bluetooth SIG assigned numbers.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

// Heart Rate Service (Standard BLE)
/// Standard BLE Heart Rate Service UUID.
pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180d_0000_1000_8000_00805f9b34fb);
/// Heart Rate Measurement characteristic UUID (Notify).
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_00805f9b34fb);
/// Body Sensor Location characteristic UUID (Read).
pub const BODY_SENSOR_LOCATION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a38_0000_1000_8000_00805f9b34fb);

/// Default advertised-name fragment for the supported straps.
pub const DEFAULT_NAME_FILTER: &str = "XOSS";

/// Expand a 16-bit assigned number into a full 128-bit UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Check if a service UUID is the standard Heart Rate service.
pub fn is_heart_rate_service(uuid: &Uuid) -> bool {
    *uuid == HEART_RATE_SERVICE_UUID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_rate_measurement_uuid_string() {
        assert_eq!(
            HEART_RATE_MEASUREMENT_UUID.to_string(),
            "00002a37-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_uuid_from_u16() {
        assert_eq!(uuid_from_u16(0x180d), HEART_RATE_SERVICE_UUID);
        assert_eq!(uuid_from_u16(0x2a37), HEART_RATE_MEASUREMENT_UUID);
        assert_eq!(uuid_from_u16(0x2a38), BODY_SENSOR_LOCATION_UUID);
    }

    #[test]
    fn test_is_heart_rate_service() {
        assert!(is_heart_rate_service(&HEART_RATE_SERVICE_UUID));
        assert!(!is_heart_rate_service(&HEART_RATE_MEASUREMENT_UUID));
    }
}
