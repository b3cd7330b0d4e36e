//! Protocol module for parsing standard Heart Rate service characteristics.
//!
//! This module contains the implementations for:
//! - Heart Rate Measurement notification decoding
//! - Body Sensor Location parsing

pub mod body_sensor;
pub mod heart_rate;

pub use body_sensor::BodySensorLocation;
pub use heart_rate::{decode, HeartRateFlags, Reading};
