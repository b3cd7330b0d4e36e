//! Heart Rate Measurement characteristic parsing.
//!
//! Decodes notifications from the standard Heart Rate Measurement
//! characteristic (UUID `2A37`). Only the value-format and RR-interval flag
//! bits are interpreted.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::utils::rr_ticks_to_millis;

/// Offset of the flags byte.
const FLAGS_OFFSET: usize = 0;
/// Offset of the first heart rate value byte.
const HEART_RATE_OFFSET: usize = FLAGS_OFFSET + 1;
/// Width of the heart rate field when the value format bit is clear.
const HEART_RATE_U8_WIDTH: usize = 1;
/// Width of the heart rate field when the value format bit is set.
const HEART_RATE_U16_WIDTH: usize = 2;
/// Width of a single RR interval.
const RR_INTERVAL_WIDTH: usize = 2;

/// Flags byte at the start of a Heart Rate Measurement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeartRateFlags(u8);

impl HeartRateFlags {
    /// Bit 0: heart rate value is a 16-bit integer.
    pub const HEART_RATE_U16: u8 = 0x01;
    /// Bit 4: one or more RR intervals follow the heart rate value.
    pub const RR_INTERVALS_PRESENT: u8 = 0x10;

    /// Wrap a raw flags byte.
    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw flags byte.
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Check if the heart rate value is 16 bits wide.
    pub fn is_heart_rate_u16(&self) -> bool {
        self.0 & Self::HEART_RATE_U16 != 0
    }

    /// Check if RR intervals are present.
    pub fn has_rr_intervals(&self) -> bool {
        self.0 & Self::RR_INTERVALS_PRESENT != 0
    }

    /// Width in bytes of the heart rate field.
    pub fn heart_rate_width(&self) -> usize {
        if self.is_heart_rate_u16() {
            HEART_RATE_U16_WIDTH
        } else {
            HEART_RATE_U8_WIDTH
        }
    }

    /// Byte offset where RR interval data begins.
    ///
    /// Sensor contact and energy expended bits are not taken into account.
    pub fn rr_offset(&self) -> usize {
        HEART_RATE_OFFSET + self.heart_rate_width()
    }
}

/// One decoded Heart Rate Measurement notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Heart rate in beats per minute, normalized from an 8 or 16-bit field.
    pub heart_rate_bpm: u16,
    /// RR intervals in payload order.
    ///
    /// These are the raw 16-bit values as sent by the sensor. No 1/1024 s
    /// conversion is applied; see [`Reading::rr_intervals_as_millis`].
    pub rr_intervals_ms: Vec<u16>,
    /// Whether the payload carried RR interval data.
    pub has_rr_data: bool,
    /// Flags byte the reading was decoded from.
    pub flags: HeartRateFlags,
}

impl Reading {
    /// RR intervals converted from 1/1024 s units to milliseconds.
    pub fn rr_intervals_as_millis(&self) -> Vec<f64> {
        self.rr_intervals_ms
            .iter()
            .copied()
            .map(rr_ticks_to_millis)
            .collect()
    }
}

/// Decode a Heart Rate Measurement payload.
///
/// Layout:
/// - Byte 0: Flags (bit 0: heart rate is u16, bit 4: RR intervals present)
/// - Byte 1 (or bytes 1-2, little-endian): Heart rate value
/// - Remaining bytes: RR intervals (u16 little-endian each), when bit 4 is set
///
/// A trailing byte that cannot form a complete RR interval is dropped.
/// A heart rate field shorter than its declared width is read best-effort,
/// missing bytes counting as zero.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] if `data` is empty.
pub fn decode(data: &[u8]) -> Result<Reading> {
    trace!("Decoding heart rate payload: {:02X?}", data);

    let flags = data
        .get(FLAGS_OFFSET)
        .copied()
        .map(HeartRateFlags::from_raw)
        .ok_or_else(|| Error::MalformedPayload {
            context: "Empty heart rate measurement payload".to_string(),
        })?;

    let heart_rate_bpm = read_heart_rate(data, flags);

    if !flags.has_rr_intervals() {
        return Ok(Reading {
            heart_rate_bpm,
            rr_intervals_ms: Vec::new(),
            has_rr_data: false,
            flags,
        });
    }

    let rr_data = data.get(flags.rr_offset()..).unwrap_or_default();
    let rr_intervals_ms: Vec<u16> = rr_data
        .chunks_exact(RR_INTERVAL_WIDTH)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    if rr_data.len() % RR_INTERVAL_WIDTH != 0 {
        debug!(
            "Dropping trailing byte after {} RR intervals",
            rr_intervals_ms.len()
        );
    }

    Ok(Reading {
        heart_rate_bpm,
        rr_intervals_ms,
        has_rr_data: true,
        flags,
    })
}

/// Read the heart rate field, zero-filling any bytes missing from a short payload.
fn read_heart_rate(data: &[u8], flags: HeartRateFlags) -> u16 {
    let width = flags.heart_rate_width();
    let end = HEART_RATE_OFFSET + width;

    if data.len() < end {
        debug!(
            "Heart rate field truncated: {} bytes, need {}",
            data.len(),
            end
        );
    }

    let byte = |i: usize| data.get(HEART_RATE_OFFSET + i).copied().unwrap_or(0);

    if flags.is_heart_rate_u16() {
        u16::from_le_bytes([byte(0), byte(1)])
    } else {
        u16::from(byte(0))
    }
}
