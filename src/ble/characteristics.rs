//! GATT characteristic handling.
//!
//! Provides functionality for enumerating, reading and subscribing to
//! BLE characteristics on heart-rate sensors.

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use bytes::Bytes;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::ble::uuids::*;
use crate::error::{Error, Result};
use crate::protocol::BodySensorLocation;

/// Notification event from a characteristic.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification data.
    pub data: Bytes,
}

/// Summary of one characteristic for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicSummary {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Supported operations, e.g. `["read", "notify"]`.
    pub properties: Vec<&'static str>,
}

/// Summary of one GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    /// Service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub primary: bool,
    /// Characteristics in the service.
    pub characteristics: Vec<CharacteristicSummary>,
}

impl std::fmt::Display for ServiceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Service: {}", self.uuid)?;
        for characteristic in &self.characteristics {
            write!(
                f,
                "\n  └─ Characteristic: {} ({})",
                characteristic.uuid,
                characteristic.properties.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Names of the property flags set on a characteristic.
pub fn property_names(flags: CharPropFlags) -> Vec<&'static str> {
    [
        (CharPropFlags::BROADCAST, "broadcast"),
        (CharPropFlags::READ, "read"),
        (CharPropFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
        (CharPropFlags::WRITE, "write"),
        (CharPropFlags::NOTIFY, "notify"),
        (CharPropFlags::INDICATE, "indicate"),
        (
            CharPropFlags::AUTHENTICATED_SIGNED_WRITES,
            "authenticated-signed-writes",
        ),
        (CharPropFlags::EXTENDED_PROPERTIES, "extended-properties"),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, name)| name)
    .collect()
}

/// Handler for GATT characteristics on a sensor.
pub struct CharacteristicHandler {
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Cached characteristics by UUID.
    characteristics: Arc<RwLock<HashMap<Uuid, Characteristic>>>,
    /// Channel for notification events.
    notification_tx: broadcast::Sender<NotificationEvent>,
    /// Whether we're currently listening for notifications.
    is_listening: Arc<RwLock<bool>>,
    /// Handle to the notification listener task.
    listener_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a peripheral.
    ///
    /// Note: Services must be discovered before using this handler.
    pub fn new(peripheral: Peripheral) -> Self {
        let (notification_tx, _) = broadcast::channel(256);

        Self {
            peripheral,
            characteristics: Arc::new(RwLock::new(HashMap::new())),
            notification_tx,
            is_listening: Arc::new(RwLock::new(false)),
            listener_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Discover and cache all characteristics.
    ///
    /// This should be called after connecting and discovering services.
    pub fn discover_characteristics(&self) -> usize {
        let services = self.peripheral.services();

        let mut chars = self.characteristics.write();
        chars.clear();

        for service in services {
            for characteristic in service.characteristics {
                trace!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid,
                    service.uuid
                );
                chars.insert(characteristic.uuid, characteristic);
            }
        }

        debug!("Discovered {} characteristics", chars.len());

        chars.len()
    }

    /// List every discovered service with its characteristics.
    pub fn services(&self) -> Vec<ServiceSummary> {
        let mut services: Vec<ServiceSummary> = self
            .peripheral
            .services()
            .into_iter()
            .map(|service| {
                let mut characteristics: Vec<CharacteristicSummary> = service
                    .characteristics
                    .into_iter()
                    .map(|c| CharacteristicSummary {
                        uuid: c.uuid,
                        properties: property_names(c.properties),
                    })
                    .collect();
                characteristics.sort_by_key(|c| c.uuid);

                ServiceSummary {
                    uuid: service.uuid,
                    primary: service.primary,
                    characteristics,
                }
            })
            .collect();

        services.sort_by_key(|s| s.uuid);
        services
    }

    /// Get a characteristic by UUID.
    pub fn get_characteristic(&self, uuid: &Uuid) -> Option<Characteristic> {
        self.characteristics.read().get(uuid).cloned()
    }

    /// Check if a characteristic exists.
    pub fn has_characteristic(&self, uuid: &Uuid) -> bool {
        self.characteristics.read().contains_key(uuid)
    }

    /// Look up a cached characteristic or fail with `CharacteristicNotFound`.
    fn require(&self, uuid: &Uuid) -> Result<Characteristic> {
        self.get_characteristic(uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Ensure the Heart Rate Measurement characteristic exists and can notify.
    pub fn verify_heart_rate_measurement(&self) -> Result<()> {
        let characteristic = self.require(&HEART_RATE_MEASUREMENT_UUID)?;

        if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
            return Err(Error::NotSupported {
                operation: format!(
                    "notifications on {} (properties: {:?})",
                    HEART_RATE_MEASUREMENT_UUID, characteristic.properties
                ),
            });
        }

        Ok(())
    }

    /// Read a characteristic value.
    pub async fn read(&self, uuid: &Uuid) -> Result<Vec<u8>> {
        let characteristic = self.require(uuid)?;

        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        trace!("Read {} bytes from characteristic {}", data.len(), uuid);

        Ok(data)
    }

    /// Read the Body Sensor Location characteristic.
    pub async fn read_body_sensor_location(&self) -> Result<BodySensorLocation> {
        let data = self.read(&BODY_SENSOR_LOCATION_UUID).await?;
        BodySensorLocation::parse(&data)
    }

    /// Subscribe to notifications from a characteristic.
    pub async fn subscribe(&self, uuid: &Uuid) -> Result<()> {
        let characteristic = self.require(uuid).map_err(|e| {
            for k in self.characteristics.read().keys() {
                debug!("  Available characteristic: {}", k);
            }
            e
        })?;

        debug!(
            "Subscribing to {}, properties: {:?}",
            uuid, characteristic.properties
        );

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Subscribed to notifications from {}", uuid);

        Ok(())
    }

    /// Unsubscribe from notifications from a characteristic.
    pub async fn unsubscribe(&self, uuid: &Uuid) -> Result<()> {
        let characteristic = self.require(uuid)?;

        self.peripheral
            .unsubscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Unsubscribed from notifications from {}", uuid);

        Ok(())
    }

    /// Start listening for notifications.
    ///
    /// Notifications will be sent through the channel returned by `subscribe_notifications()`.
    pub async fn start_notifications(&self) -> Result<()> {
        if *self.is_listening.read() {
            return Ok(());
        }

        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_listening.write() = true;

        let is_listening = self.is_listening.clone();
        let notification_tx = self.notification_tx.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification listener entering main loop");

            while *is_listening.read() {
                tokio::select! {
                    notification = notifications.next() => {
                        let Some(notification) = notification else {
                            error!("Notification stream closed by peripheral");
                            break;
                        };

                        trace!(
                            "Notification from {}: {:02X?}",
                            notification.uuid,
                            notification.value
                        );

                        let _ = notification_tx.send(NotificationEvent {
                            characteristic_uuid: notification.uuid,
                            data: Bytes::from(notification.value),
                        });
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
                }
            }

            *is_listening.write() = false;
            debug!("Notification listener stopped");
        });

        *self.listener_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop listening for notifications.
    pub async fn stop_notifications(&self) {
        *self.is_listening.write() = false;

        let handle = self.listener_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Check if the notification listener is running.
    pub fn is_listening(&self) -> bool {
        *self.is_listening.read()
    }

    /// Get a receiver for notification events.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notification_tx.subscribe()
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        *self.is_listening.write() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_names() {
        assert_eq!(
            property_names(CharPropFlags::NOTIFY),
            vec!["notify"]
        );
        assert_eq!(
            property_names(CharPropFlags::READ | CharPropFlags::WRITE),
            vec!["read", "write"]
        );
        assert!(property_names(CharPropFlags::empty()).is_empty());
    }

    #[test]
    fn test_service_summary_display() {
        let summary = ServiceSummary {
            uuid: HEART_RATE_SERVICE_UUID,
            primary: true,
            characteristics: vec![CharacteristicSummary {
                uuid: HEART_RATE_MEASUREMENT_UUID,
                properties: vec!["notify"],
            }],
        };
        assert_eq!(
            summary.to_string(),
            "Service: 0000180d-0000-1000-8000-00805f9b34fb\n  \
             └─ Characteristic: 00002a37-0000-1000-8000-00805f9b34fb (notify)"
        );
    }

    #[test]
    fn test_notification_event_clone() {
        let event = NotificationEvent {
            characteristic_uuid: HEART_RATE_MEASUREMENT_UUID,
            data: Bytes::from_static(&[0x10, 0x48]),
        };
        let cloned = event.clone();
        assert_eq!(event.characteristic_uuid, cloned.characteristic_uuid);
        assert_eq!(event.data, cloned.data);
    }
}
