//! Notification-to-session pipeline.
//!
//! The [`Collector`] owns a [`SessionAggregator`] for one window, pulls raw
//! payloads from a [`NotificationSource`], decodes them and finalizes the
//! session when the window closes.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::data::{HrvResult, SessionAggregator};
use crate::error::Result;
use crate::protocol::{decode, Reading};

/// A stream of raw Heart Rate Measurement payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSource: Send {
    /// Wait for the next payload. `None` once the source has ended.
    async fn next_payload(&mut self) -> Option<Bytes>;

    /// Stop delivering payloads.
    async fn stop(&mut self) -> Result<()>;
}

/// Runs a single collection window over a notification source.
#[derive(Debug, Clone)]
pub struct Collector {
    /// Window length.
    window: Duration,
    /// Optional channel every decoded reading is forwarded to.
    reading_tx: Option<broadcast::Sender<Reading>>,
}

impl Collector {
    /// Create a collector for a window of `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            reading_tx: None,
        }
    }

    /// Forward every decoded reading to `tx`.
    pub fn with_reading_broadcast(mut self, tx: broadcast::Sender<Reading>) -> Self {
        self.reading_tx = Some(tx);
        self
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Collect until the window elapses or the source ends, then stop the
    /// source and finalize.
    ///
    /// Undecodable payloads are logged and skipped. A failure to stop the
    /// source is logged and does not discard the result.
    pub async fn run<S>(&self, source: &mut S) -> HrvResult
    where
        S: NotificationSource + ?Sized,
    {
        let mut session = SessionAggregator::new();
        session.start(self.window);

        let deadline = tokio::time::Instant::now() + self.window;
        let window_elapsed = tokio::time::sleep_until(deadline);
        tokio::pin!(window_elapsed);

        loop {
            tokio::select! {
                _ = &mut window_elapsed => {
                    debug!("Collection window elapsed");
                    break;
                }
                payload = source.next_payload() => match payload {
                    Some(payload) => self.handle_payload(&mut session, &payload),
                    None => {
                        info!(
                            "Notification source ended with {:?} of the window left",
                            session.remaining()
                        );
                        break;
                    }
                },
            }
        }

        if let Err(e) = source.stop().await {
            warn!("Failed to stop notification source: {}", e);
        }

        session.finalize()
    }

    /// Decode one payload and feed it to the session.
    fn handle_payload(&self, session: &mut SessionAggregator, payload: &[u8]) {
        match decode(payload) {
            Ok(reading) => {
                session.on_reading(&reading);
                if let Some(tx) = &self.reading_tx {
                    let _ = tx.send(reading);
                }
            }
            Err(e) => {
                warn!("Skipping payload {:02X?}: {}", payload, e);
                session.record_malformed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// In-memory source that optionally stays open after its payloads run out.
    struct ScriptedSource {
        payloads: VecDeque<Bytes>,
        hold_open: bool,
        stopped: bool,
    }

    impl ScriptedSource {
        fn new(payloads: &[&[u8]], hold_open: bool) -> Self {
            Self {
                payloads: payloads
                    .iter()
                    .map(|p| Bytes::copy_from_slice(p))
                    .collect(),
                hold_open,
                stopped: false,
            }
        }
    }

    #[async_trait]
    impl NotificationSource for ScriptedSource {
        async fn next_payload(&mut self) -> Option<Bytes> {
            match self.payloads.pop_front() {
                Some(payload) => Some(payload),
                None if self.hold_open => std::future::pending().await,
                None => None,
            }
        }

        async fn stop(&mut self) -> Result<()> {
            self.stopped = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_collects_rr_across_readings_in_order() {
        let mut source = ScriptedSource::new(
            &[
                &[0x10, 0x48, 0x20, 0x03, 0x34, 0x03],
                &[0x00, 0x48],
                &[0x10, 0x49, 0x48, 0x03],
            ],
            false,
        );

        let result = Collector::new(Duration::from_secs(5)).run(&mut source).await;

        assert!(source.stopped);
        assert_eq!(result.rr_intervals_ms, vec![800, 820, 840]);
        assert_eq!(result.sample_count, 3);
        assert_eq!(result.readings, 3);
        assert_eq!(result.rmssd_ms, Some(20.0));
        assert_eq!(result.last_heart_rate_bpm, Some(73));
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_abort_collection() {
        let mut source = ScriptedSource::new(
            &[&[0x10, 0x48, 0xE8, 0x03], &[], &[0x10, 0x48, 0xFC, 0x03]],
            false,
        );

        let result = Collector::new(Duration::from_secs(5)).run(&mut source).await;

        assert_eq!(result.malformed_payloads, 1);
        assert_eq!(result.rr_intervals_ms, vec![1000, 1020]);
        assert_eq!(result.rmssd_ms, Some(20.0));
    }

    #[tokio::test]
    async fn test_window_elapses_while_source_is_idle() {
        let mut source = ScriptedSource::new(&[&[0x10, 0x48, 0xE8, 0x03]], true);

        let result = Collector::new(Duration::from_millis(50))
            .run(&mut source)
            .await;

        assert!(source.stopped);
        assert_eq!(result.sample_count, 1);
        assert_eq!(result.rmssd_ms, None);
        assert!(result.elapsed >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_readings_are_broadcast() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut source = ScriptedSource::new(&[&[0x10, 0x48, 0x20, 0x03]], false);

        Collector::new(Duration::from_secs(5))
            .with_reading_broadcast(tx)
            .run(&mut source)
            .await;

        let reading = rx.recv().await.unwrap();
        assert_eq!(reading.heart_rate_bpm, 72);
        assert_eq!(reading.rr_intervals_ms, vec![800]);
    }

    #[tokio::test]
    async fn test_stop_failure_keeps_result() {
        let mut payloads: VecDeque<Bytes> = VecDeque::from(vec![
            Bytes::from_static(&[0x10, 0x48, 0xE8, 0x03]),
            Bytes::from_static(&[0x10, 0x48, 0xFC, 0x03]),
        ]);

        let mut source = MockNotificationSource::new();
        source
            .expect_next_payload()
            .returning(move || payloads.pop_front());
        source
            .expect_stop()
            .times(1)
            .returning(|| Err(Error::NotConnected));

        let result = Collector::new(Duration::from_secs(5)).run(&mut source).await;
        assert_eq!(result.rr_intervals_ms, vec![1000, 1020]);
    }

    #[test]
    fn test_collector_window() {
        let collector = Collector::new(Duration::from_secs(20));
        assert_eq!(collector.window(), Duration::from_secs(20));
    }
}
