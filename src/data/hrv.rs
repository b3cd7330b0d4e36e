//! Heart rate variability metrics.
//!
//! RMSSD is computed once, from the complete RR sequence, when a collection
//! session is finalized.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Calculate the Root Mean Square of Successive Differences over RR intervals.
///
/// Successive differences are taken in sequence order, squared, averaged and
/// square-rooted. Summation is strictly sequential so identical input always
/// yields a bit-identical result.
///
/// Returns `None` when fewer than two intervals are available.
///
/// # Example
///
/// ```
/// use hrv_monitor_ble::compute_rmssd;
///
/// assert_eq!(compute_rmssd(&[1000, 1020]), Some(20.0));
/// assert_eq!(compute_rmssd(&[1000]), None);
/// ```
pub fn compute_rmssd(rr_intervals: &[u16]) -> Option<f64> {
    if rr_intervals.len() < 2 {
        return None;
    }

    let sum_of_squares: f64 = rr_intervals
        .windows(2)
        .map(|pair| {
            let diff = f64::from(pair[1]) - f64::from(pair[0]);
            diff * diff
        })
        .sum();

    let count = (rr_intervals.len() - 1) as f64;
    Some((sum_of_squares / count).sqrt())
}

/// Outcome of a finalized collection session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HrvResult {
    /// Number of RR intervals collected.
    pub sample_count: usize,
    /// RMSSD of the collected intervals, `None` with fewer than two samples.
    pub rmssd_ms: Option<f64>,
    /// The collected RR intervals in arrival order.
    pub rr_intervals_ms: Vec<u16>,
    /// Number of decoded readings received.
    pub readings: u64,
    /// Number of payloads skipped because they could not be decoded.
    pub malformed_payloads: u64,
    /// Heart rate from the most recent reading.
    pub last_heart_rate_bpm: Option<u16>,
    /// Wall-clock time the session started.
    pub started_at: DateTime<Utc>,
    /// How long the session actually collected for.
    pub elapsed: Duration,
}

impl HrvResult {
    /// Check if enough samples were collected to compute RMSSD.
    pub fn is_sufficient(&self) -> bool {
        self.rmssd_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmssd_constant_sequence_is_zero() {
        assert_eq!(compute_rmssd(&[1000, 1000, 1000]), Some(0.0));
    }

    #[test]
    fn test_rmssd_single_difference() {
        assert_eq!(compute_rmssd(&[1000, 1020]), Some(20.0));
        assert_eq!(compute_rmssd(&[1020, 1000]), Some(20.0));
    }

    #[test]
    fn test_rmssd_insufficient_samples() {
        assert_eq!(compute_rmssd(&[1000]), None);
        assert_eq!(compute_rmssd(&[]), None);
    }

    #[test]
    fn test_rmssd_multiple_differences() {
        // diffs: 10, -20, 30 -> squares 100, 400, 900 -> mean 466.67
        let rmssd = compute_rmssd(&[800, 810, 790, 820]).unwrap();
        assert!((rmssd - (1400.0_f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_rmssd_is_order_sensitive() {
        let a = compute_rmssd(&[800, 900, 800, 900]).unwrap();
        let b = compute_rmssd(&[800, 800, 900, 900]).unwrap();
        assert!(a > b);
    }

    #[test]
    fn test_rmssd_handles_full_u16_range() {
        assert_eq!(compute_rmssd(&[0, u16::MAX]), Some(f64::from(u16::MAX)));
    }

    #[test]
    fn test_rmssd_is_deterministic() {
        let rr: Vec<u16> = (0..500).map(|i| 700 + ((i * 37) % 211) as u16).collect();
        let first = compute_rmssd(&rr).unwrap();
        let second = compute_rmssd(&rr).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }
}
