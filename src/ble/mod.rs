//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy layer for discovering,
//! connecting to and receiving notifications from heart-rate sensors.

pub mod characteristics;
pub mod connection;
pub mod notifications;
pub mod scanner;
pub mod uuids;

pub use characteristics::{CharacteristicHandler, CharacteristicSummary, ServiceSummary};
pub use connection::{ConnectionManager, ConnectionState};
pub use notifications::HeartRateNotifications;
pub use scanner::{BleScanner, DeviceDiscoveryEvent};
pub use uuids::*;
