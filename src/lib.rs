// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # hrv-monitor-ble
//!
//! A cross-platform Rust library for reading BLE heart-rate straps and
//! deriving heart rate variability from their RR intervals.
//!
//! The library discovers a strap by advertised name (`XOSS` by default),
//! subscribes to the standard Heart Rate Measurement characteristic (`2A37`),
//! decodes every notification, accumulates RR intervals over a fixed window
//! and computes RMSSD once the window closes.
//!
//! ## Features
//!
//! - **Discovery**: Find a sensor by case-insensitive name fragment
//! - **Service Listing**: Enumerate GATT services and characteristics
//! - **Decoding**: Heart Rate Measurement payloads with 8 or 16-bit heart rate
//! - **Collection**: Ordered RR accumulation over a fixed window
//! - **RMSSD**: Root mean square of successive differences
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hrv_monitor_ble::{HeartRateMonitor, MonitorConfig, Result};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MonitorConfig::default().with_collection_duration(Duration::from_secs(30));
//!     let monitor = HeartRateMonitor::discover(config).await?;
//!     monitor.connect().await?;
//!
//!     let result = monitor.collect_hrv().await?;
//!     match result.rmssd_ms {
//!         Some(rmssd) => println!("RMSSD: {:.2} ms", rmssd),
//!         None => println!("Not enough RR intervals ({})", result.sample_count),
//!     }
//!
//!     monitor.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## RR Units
//!
//! RR intervals are reported and used for RMSSD exactly as the sensor sends
//! them, without the 1/1024 s to millisecond conversion. Use
//! [`Reading::rr_intervals_as_millis`] or [`rr_ticks_to_millis`] when converted
//! values are needed.
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod collector;
pub mod config;
pub mod data;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod utils;

// Re-exports for convenience
pub use collector::{Collector, NotificationSource};
pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use monitor::{CallbackHandle, HeartRateMonitor};
pub use utils::{rr_millis_to_bpm, rr_ticks_to_millis};

// Re-export commonly used types from submodules
pub use ble::connection::ConnectionState;
pub use ble::uuids::{HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID};
pub use data::{compute_rmssd, HrvResult, SessionAggregator, SessionState};
pub use protocol::{decode, BodySensorLocation, HeartRateFlags, Reading};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let _ = std::any::TypeId::of::<HeartRateMonitor>();
        let _ = std::any::TypeId::of::<SessionAggregator>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<Reading>();
        let _ = std::any::TypeId::of::<HrvResult>();
        let _ = std::any::TypeId::of::<Collector>();
    }

    #[test]
    fn test_decode_to_rmssd_pipeline() {
        let mut session = SessionAggregator::new();
        session.start(std::time::Duration::from_secs(1));

        for payload in [
            &[0x10, 0x48, 0xE8, 0x03][..],
            &[0x10, 0x48, 0xFC, 0x03][..],
        ] {
            session.on_reading(&decode(payload).unwrap());
        }

        assert_eq!(session.finalize().rmssd_ms, Some(20.0));
    }
}
