//! Heart Rate Measurement notification source backed by a BLE connection.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ble::characteristics::{CharacteristicHandler, NotificationEvent};
use crate::ble::uuids::HEART_RATE_MEASUREMENT_UUID;
use crate::collector::NotificationSource;
use crate::error::Result;

/// Subscription to Heart Rate Measurement notifications.
///
/// Created by subscribing to the characteristic; [`NotificationSource::stop`]
/// unsubscribes and stops the listener task.
pub struct HeartRateNotifications {
    /// Handler owning the subscription.
    handler: Arc<CharacteristicHandler>,
    /// Receiver for broadcast notification events.
    rx: broadcast::Receiver<NotificationEvent>,
    /// Characteristic whose notifications are passed through.
    characteristic_uuid: Uuid,
    /// Whether `stop` has already run.
    stopped: bool,
}

impl HeartRateNotifications {
    /// Subscribe to Heart Rate Measurement notifications and start listening.
    pub async fn subscribe(handler: Arc<CharacteristicHandler>) -> Result<Self> {
        // Take the receiver first so no notification is missed between
        // subscribing and the first `next_payload` call.
        let rx = handler.subscribe_notifications();

        handler.subscribe(&HEART_RATE_MEASUREMENT_UUID).await?;
        handler.start_notifications().await?;

        Ok(Self {
            handler,
            rx,
            characteristic_uuid: HEART_RATE_MEASUREMENT_UUID,
            stopped: false,
        })
    }
}

#[async_trait]
impl NotificationSource for HeartRateNotifications {
    async fn next_payload(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.characteristic_uuid == self.characteristic_uuid => {
                    return Some(event.data);
                }
                Ok(event) => {
                    debug!(
                        "Ignoring notification from {}",
                        event.characteristic_uuid
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification receiver lagged, {} payloads lost", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let unsubscribed = self.handler.unsubscribe(&self.characteristic_uuid).await;
        self.handler.stop_notifications().await;
        unsubscribed
    }
}
