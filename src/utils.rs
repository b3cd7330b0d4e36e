//! Utility functions for the hrv-monitor-ble crate.

/// RR interval resolution defined by the Heart Rate service (1/1024 second).
pub const RR_TICKS_PER_SECOND: f64 = 1024.0;

/// Convert an RR interval from 1/1024 second ticks to milliseconds.
///
/// # Arguments
///
/// * `ticks` - RR interval as reported in the Heart Rate Measurement payload
///
/// # Returns
///
/// RR interval in milliseconds
///
/// # Example
///
/// ```
/// use hrv_monitor_ble::rr_ticks_to_millis;
///
/// let millis = rr_ticks_to_millis(1024);
/// assert!((millis - 1000.0).abs() < 0.001);
/// ```
#[inline]
pub fn rr_ticks_to_millis(ticks: u16) -> f64 {
    f64::from(ticks) * 1000.0 / RR_TICKS_PER_SECOND
}

/// Instantaneous heart rate implied by an RR interval in milliseconds.
///
/// Returns `None` for a zero interval.
///
/// # Example
///
/// ```
/// use hrv_monitor_ble::rr_millis_to_bpm;
///
/// assert_eq!(rr_millis_to_bpm(1000.0), Some(60.0));
/// assert_eq!(rr_millis_to_bpm(0.0), None);
/// ```
#[inline]
pub fn rr_millis_to_bpm(millis: f64) -> Option<f64> {
    if millis > 0.0 {
        Some(60_000.0 / millis)
    } else {
        None
    }
}
