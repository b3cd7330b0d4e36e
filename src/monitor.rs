//! Heart rate monitor orchestration.
//!
//! Ties the BLE layer to the collection pipeline: find a sensor by name,
//! connect, verify the Heart Rate Measurement characteristic, collect RR
//! intervals for a window and disconnect.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::ble::characteristics::{CharacteristicHandler, ServiceSummary};
use crate::ble::connection::{ConnectionManager, ConnectionState};
use crate::ble::notifications::HeartRateNotifications;
use crate::ble::scanner::{BleScanner, DeviceDiscoveryEvent};
use crate::collector::Collector;
use crate::config::MonitorConfig;
use crate::data::HrvResult;
use crate::error::{Error, Result};
use crate::protocol::{BodySensorLocation, Reading};

/// Callback handle for unregistering callbacks.
///
/// The callback is unregistered when the handle is dropped.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// A heart-rate sensor found by name.
pub struct HeartRateMonitor {
    /// BLE identifier.
    identifier: String,
    /// Advertised name.
    name: String,
    /// Signal strength at discovery.
    rssi: Option<i16>,
    /// Configuration.
    config: MonitorConfig,
    /// Connection manager.
    connection: ConnectionManager,
    /// Characteristic handler, present once connected.
    characteristics: RwLock<Option<Arc<CharacteristicHandler>>>,
    /// Decoded reading channel.
    reading_tx: broadcast::Sender<Reading>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
}

impl HeartRateMonitor {
    /// Scan for the first device matching `config.name_filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an invalid configuration,
    /// [`Error::BluetoothUnavailable`] without an adapter and
    /// [`Error::DeviceNotFound`] if nothing matched within the scan timeout.
    pub async fn discover(config: MonitorConfig) -> Result<Self> {
        config.validate()?;

        info!("Scanning for BLE devices matching \"{}\"", config.name_filter);

        let scanner = BleScanner::new(config.name_filter.clone()).await?;
        let event = scanner.find_first(config.scan_timeout).await?;

        Ok(Self::from_discovery(event, config))
    }

    /// Create a monitor for an already discovered device.
    pub fn from_discovery(event: DeviceDiscoveryEvent, config: MonitorConfig) -> Self {
        let (reading_tx, _) = broadcast::channel(64);

        let mut connection = ConnectionManager::new(event.peripheral);
        connection.set_retry_params(config.connect_attempts, config.reconnect_delay);

        Self {
            identifier: event.identifier,
            name: event.name,
            rssi: event.rssi,
            config,
            connection,
            characteristics: RwLock::new(None),
            reading_tx,
            callback_counter: AtomicU64::new(0),
        }
    }

    /// Get the BLE identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Get the advertised name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal strength at discovery, in dBm.
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Get the configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get the connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connect, discover characteristics and verify the Heart Rate Measurement
    /// characteristic is present and notifiable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] or [`Error::NotSupported`]
    /// if the sensor cannot deliver heart rate notifications. The connection
    /// is closed again in that case.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await?;

        let handler = CharacteristicHandler::new(self.connection.peripheral().clone());
        handler.discover_characteristics();

        if let Err(e) = handler.verify_heart_rate_measurement() {
            warn!("{} cannot deliver heart rate notifications: {}", self.name, e);
            if let Err(disconnect_err) = self.connection.disconnect().await {
                warn!("Error disconnecting: {}", disconnect_err);
            }
            return Err(e);
        }

        *self.characteristics.write() = Some(Arc::new(handler));

        info!("Connected to {} ({})", self.name, self.identifier);

        Ok(())
    }

    /// Disconnect from the sensor.
    pub async fn disconnect(&self) -> Result<()> {
        let handler = self.characteristics.write().take();
        if let Some(handler) = handler {
            handler.stop_notifications().await;
        }

        self.connection.disconnect().await
    }

    /// Get the characteristic handler of a connected sensor.
    fn handler(&self) -> Result<Arc<CharacteristicHandler>> {
        self.characteristics
            .read()
            .clone()
            .ok_or(Error::NotConnected)
    }

    /// List the sensor's services and characteristics.
    pub fn services(&self) -> Result<Vec<ServiceSummary>> {
        Ok(self.handler()?.services())
    }

    /// Read where the sensor is worn.
    pub async fn read_body_sensor_location(&self) -> Result<BodySensorLocation> {
        self.handler()?.read_body_sensor_location().await
    }

    /// Collect RR intervals for the configured window.
    pub async fn collect_hrv(&self) -> Result<HrvResult> {
        self.collect_hrv_for(self.config.collection_duration).await
    }

    /// Collect RR intervals for `duration` and compute RMSSD.
    ///
    /// Decoded readings are forwarded to [`subscribe_readings`](Self::subscribe_readings)
    /// receivers as they arrive.
    pub async fn collect_hrv_for(&self, duration: Duration) -> Result<HrvResult> {
        let handler = self.handler()?;
        let mut notifications = HeartRateNotifications::subscribe(handler).await?;

        info!("Collecting heart rate data for {:?}", duration);

        let result = Collector::new(duration)
            .with_reading_broadcast(self.reading_tx.clone())
            .run(&mut notifications)
            .await;

        Ok(result)
    }

    /// Subscribe to decoded readings.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<Reading> {
        self.reading_tx.subscribe()
    }

    /// Register a callback for every decoded reading.
    pub fn on_reading<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(Reading) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.reading_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(reading) => callback(reading),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Reading callback lagged, {} readings skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }
}

impl std::fmt::Debug for HeartRateMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartRateMonitor")
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("rssi", &self.rssi)
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_callback_handle_unregisters_on_drop() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let handle = CallbackHandle::new(7, move || flag.store(true, Ordering::SeqCst));
        assert_eq!(handle.id(), 7);
        assert!(!called.load(Ordering::SeqCst));

        drop(handle);
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_callback_handle_unregister_runs_once() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();

        let handle = CallbackHandle::new(0, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.unregister();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discover_rejects_invalid_config() {
        let config = MonitorConfig::new().with_name_filter("");
        let err = HeartRateMonitor::discover(config).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
