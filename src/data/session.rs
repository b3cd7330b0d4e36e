//! RR interval collection sessions.
//!
//! A session accumulates RR intervals from decoded readings for a fixed
//! window and is consumed exactly once to produce an [`HrvResult`].

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::data::hrv::{compute_rmssd, HrvResult};
use crate::protocol::Reading;

/// Lifecycle of a collection session.
///
/// `Finalized` is reached by [`SessionAggregator::finalize`], which consumes
/// the aggregator, so it is never observed on a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Created but not yet started.
    #[default]
    Created,
    /// Accepting readings.
    Collecting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Collecting => write!(f, "Collecting"),
        }
    }
}

/// Accumulates RR intervals over one collection window.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    /// RR intervals in arrival order.
    rr_intervals_ms: Vec<u16>,
    /// Current state.
    state: SessionState,
    /// Monotonic start time.
    started_at: Option<Instant>,
    /// Wall-clock start time.
    started_at_utc: Option<DateTime<Utc>>,
    /// Configured window length.
    duration: Duration,
    /// Readings passed to `on_reading`.
    readings: u64,
    /// Readings that carried RR data.
    readings_with_rr: u64,
    /// Payloads skipped by the caller as undecodable.
    malformed_payloads: u64,
    /// Heart rate from the most recent reading.
    last_heart_rate_bpm: Option<u16>,
}

impl SessionAggregator {
    /// Create an empty session in the `Created` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting for `duration`.
    ///
    /// Clears any previously collected data and arms the deadline.
    pub fn start(&mut self, duration: Duration) {
        debug_assert_eq!(self.state, SessionState::Created, "session already started");

        *self = Self {
            state: SessionState::Collecting,
            started_at: Some(Instant::now()),
            started_at_utc: Some(Utc::now()),
            duration,
            ..Self::default()
        };

        info!("Collection session started ({:?} window)", duration);
    }

    /// Append the RR intervals of a decoded reading.
    ///
    /// Readings without RR data only update the heart rate and counters.
    pub fn on_reading(&mut self, reading: &Reading) {
        debug_assert_eq!(
            self.state,
            SessionState::Collecting,
            "on_reading called before start"
        );
        if self.state != SessionState::Collecting {
            warn!("Ignoring reading received in state {}", self.state);
            return;
        }

        self.readings += 1;
        self.last_heart_rate_bpm = Some(reading.heart_rate_bpm);

        if reading.has_rr_data {
            self.readings_with_rr += 1;
            self.rr_intervals_ms
                .extend_from_slice(&reading.rr_intervals_ms);
        }

        debug!(
            "Reading {}: {} bpm, +{} RR ({} total)",
            self.readings,
            reading.heart_rate_bpm,
            reading.rr_intervals_ms.len(),
            self.rr_intervals_ms.len()
        );
    }

    /// Count a payload that was skipped because it could not be decoded.
    pub fn record_malformed(&mut self) {
        self.malformed_payloads += 1;
    }

    /// Close the session and compute RMSSD over everything collected.
    ///
    /// Valid at any point after creation; an early call finalizes whatever
    /// has been collected so far.
    pub fn finalize(self) -> HrvResult {
        let elapsed = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let rmssd_ms = compute_rmssd(&self.rr_intervals_ms);

        info!(
            "Collection session finalized: {} RR intervals from {} readings, RMSSD {:?}",
            self.rr_intervals_ms.len(),
            self.readings,
            rmssd_ms
        );

        HrvResult {
            sample_count: self.rr_intervals_ms.len(),
            rmssd_ms,
            rr_intervals_ms: self.rr_intervals_ms,
            readings: self.readings,
            malformed_payloads: self.malformed_payloads,
            last_heart_rate_bpm: self.last_heart_rate_bpm,
            started_at: self.started_at_utc.unwrap_or_else(Utc::now),
            elapsed,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the configured window length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// RR intervals collected so far.
    pub fn rr_intervals_ms(&self) -> &[u16] {
        &self.rr_intervals_ms
    }

    /// Number of RR intervals collected so far.
    pub fn sample_count(&self) -> usize {
        self.rr_intervals_ms.len()
    }

    /// Number of readings that carried RR data.
    pub fn readings_with_rr(&self) -> u64 {
        self.readings_with_rr
    }

    /// Instant at which the window closes, once started.
    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|started| started + self.duration)
    }

    /// Time left in the window. Zero once expired or if never started.
    pub fn remaining(&self) -> Duration {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Check if the window has elapsed.
    pub fn is_expired(&self) -> bool {
        self.deadline()
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HeartRateFlags;
    use pretty_assertions::assert_eq;

    fn reading(heart_rate_bpm: u16, rr: &[u16]) -> Reading {
        Reading {
            heart_rate_bpm,
            rr_intervals_ms: rr.to_vec(),
            has_rr_data: !rr.is_empty(),
            flags: HeartRateFlags::default(),
        }
    }

    #[test]
    fn test_new_session_is_created() {
        let session = SessionAggregator::new();
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.deadline(), None);
        assert!(!session.is_expired());
        assert_eq!(session.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_start_arms_deadline() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(20));
        assert_eq!(session.state(), SessionState::Collecting);
        assert_eq!(session.duration(), Duration::from_secs(20));
        assert!(session.deadline().is_some());
        assert!(!session.is_expired());
        assert!(session.remaining() > Duration::from_secs(19));
    }

    #[test]
    fn test_zero_window_is_immediately_expired() {
        let mut session = SessionAggregator::new();
        session.start(Duration::ZERO);
        assert!(session.is_expired());
    }

    #[test]
    fn test_readings_accumulate_in_order() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(20));

        session.on_reading(&reading(70, &[800, 810]));
        session.on_reading(&reading(71, &[]));
        session.on_reading(&reading(72, &[820]));

        assert_eq!(session.rr_intervals_ms(), &[800, 810, 820]);
        assert_eq!(session.readings_with_rr(), 2);

        let result = session.finalize();
        assert_eq!(result.rr_intervals_ms, vec![800, 810, 820]);
        assert_eq!(result.sample_count, 3);
        assert_eq!(result.readings, 3);
        assert_eq!(result.last_heart_rate_bpm, Some(72));
    }

    #[test]
    fn test_reading_without_rr_flag_contributes_nothing() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(1));

        let mut no_rr = reading(60, &[]);
        no_rr.has_rr_data = false;
        session.on_reading(&no_rr);

        assert_eq!(session.sample_count(), 0);
        let result = session.finalize();
        assert_eq!(result.rmssd_ms, None);
        assert!(!result.is_sufficient());
        assert_eq!(result.last_heart_rate_bpm, Some(60));
    }

    #[test]
    fn test_finalize_computes_rmssd() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(1));
        session.on_reading(&reading(60, &[1000]));
        session.on_reading(&reading(60, &[1020]));

        let result = session.finalize();
        assert_eq!(result.rmssd_ms, Some(20.0));
        assert!(result.is_sufficient());
    }

    #[test]
    fn test_finalize_with_single_sample_is_insufficient() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(1));
        session.on_reading(&reading(60, &[1000]));

        let result = session.finalize();
        assert_eq!(result.sample_count, 1);
        assert_eq!(result.rmssd_ms, None);
    }

    #[test]
    fn test_finalize_before_start_is_empty() {
        let result = SessionAggregator::new().finalize();
        assert_eq!(result.sample_count, 0);
        assert_eq!(result.rmssd_ms, None);
        assert_eq!(result.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_malformed_payloads_counted() {
        let mut session = SessionAggregator::new();
        session.start(Duration::from_secs(1));
        session.record_malformed();
        session.record_malformed();
        assert_eq!(session.finalize().malformed_payloads, 2);
    }

    #[test]
    fn test_identical_input_gives_identical_rmssd() {
        let run = || {
            let mut session = SessionAggregator::new();
            session.start(Duration::from_secs(1));
            for chunk in [[812u16, 797], [845, 803], [790, 830]] {
                session.on_reading(&reading(75, &chunk));
            }
            session.finalize().rmssd_ms.unwrap()
        };
        assert_eq!(run().to_bits(), run().to_bits());
    }
}
