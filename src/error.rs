//! Error types for the hrv-monitor-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No advertising device matched the configured name filter.
    #[error("No device found matching \"{filter}\"")]
    DeviceNotFound {
        /// The name filter that was searched for.
        filter: String,
    },

    /// Operation requires a connection but the sensor is not connected.
    #[error("Sensor not connected")]
    NotConnected,

    /// Failed to establish a connection to the sensor.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A notification payload could not be decoded.
    ///
    /// Recoverable: the payload is skipped and collection continues.
    #[error("Malformed payload: {context}")]
    MalformedPayload {
        /// Description of what was wrong with the payload.
        context: String,
    },

    /// The requested operation is not supported by the sensor.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Description of the unsupported operation.
        operation: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },
}

impl Error {
    /// Whether the error only affects a single payload and collection may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
