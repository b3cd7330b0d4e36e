//! BLE scanning functionality.
//!
//! Provides the scanner for discovering heart-rate sensors by advertised name.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};

/// Event emitted when a matching device is discovered or updated.
#[derive(Debug, Clone)]
pub struct DeviceDiscoveryEvent {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// The peripheral handle.
    pub peripheral: Peripheral,
    /// Advertised local name.
    pub name: String,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

/// Check if an advertised name contains `filter`, ignoring case.
pub fn matches_name_filter(name: &str, filter: &str) -> bool {
    name.to_uppercase().contains(&filter.to_uppercase())
}

/// BLE scanner for discovering heart-rate sensors.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Case-insensitive name fragment devices must advertise.
    name_filter: String,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Discovered peripherals.
    discovered: Arc<RwLock<HashMap<String, DeviceDiscoveryEvent>>>,
    /// Channel for discovery events.
    event_tx: broadcast::Sender<DeviceDiscoveryEvent>,
    /// Handle to the scanning task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new(name_filter: impl Into<String>) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapter = manager
            .adapters()
            .await
            .map_err(Error::Bluetooth)?
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter, name_filter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter, name_filter: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(32);

        Self {
            adapter,
            name_filter: name_filter.into(),
            is_scanning: Arc::new(RwLock::new(false)),
            discovered: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            scan_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start scanning for matching devices.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started.
    pub async fn start_scanning(&self) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan for devices named \"{}\"", self.name_filter);

        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let name_filter = self.name_filter.clone();
        let is_scanning = self.is_scanning.clone();
        let discovered = self.discovered.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while *is_scanning.read() {
                tokio::select! {
                    event = events.next() => {
                        let Some(event) = event else {
                            error!("Adapter event stream ended");
                            break;
                        };
                        match event {
                            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                                trace!("Device seen: {:?}", id);
                                Self::process_peripheral(
                                    &adapter,
                                    id,
                                    &name_filter,
                                    &discovered,
                                    &event_tx,
                                ).await;
                            }
                            CentralEvent::DeviceDisconnected(id) => {
                                debug!("Device disconnected: {:?}", id);
                            }
                            _ => {}
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }

            debug!("Scan event loop ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop scanning.
    pub async fn stop_scanning(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let handle = self.scan_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Scan until the first matching device appears or `timeout` elapses.
    ///
    /// Scanning is stopped before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if nothing matched in time.
    pub async fn find_first(&self, timeout: Duration) -> Result<DeviceDiscoveryEvent> {
        let mut rx = self.event_tx.subscribe();
        self.start_scanning().await?;

        let already_found = self.discovered.read().values().next().cloned();
        let found = match already_found {
            Some(event) => Some(event),
            None => tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(event) => break Some(event),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break None,
                    }
                }
            })
            .await
            .ok()
            .flatten(),
        };

        self.stop_scanning().await?;

        found.ok_or_else(|| Error::DeviceNotFound {
            filter: self.name_filter.clone(),
        })
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// Get the name filter.
    pub fn name_filter(&self) -> &str {
        &self.name_filter
    }

    /// Get all discovered devices.
    pub fn discovered_devices(&self) -> HashMap<String, DeviceDiscoveryEvent> {
        self.discovered.read().clone()
    }

    /// Subscribe to discovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceDiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Process a discovered peripheral.
    async fn process_peripheral(
        adapter: &Adapter,
        id: PeripheralId,
        name_filter: &str,
        discovered: &Arc<RwLock<HashMap<String, DeviceDiscoveryEvent>>>,
        event_tx: &broadcast::Sender<DeviceDiscoveryEvent>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        // Unnamed advertisers can never match
        let Some(name) = properties.local_name else {
            return;
        };

        if !matches_name_filter(&name, name_filter) {
            return;
        }

        let identifier = id.to_string();

        if !discovered.read().contains_key(&identifier) {
            info!("Found device: {} ({})", name, peripheral.address());
        }

        let event = DeviceDiscoveryEvent {
            identifier: identifier.clone(),
            peripheral,
            name,
            rssi: properties.rssi,
        };

        discovered.write().insert(identifier, event.clone());

        let _ = event_tx.send(event);
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_name_filter() {
        assert!(matches_name_filter("XOSS X2 1234", "XOSS"));
        assert!(matches_name_filter("xoss-hr", "XOSS"));
        assert!(matches_name_filter("XOSS", "xoss"));
        assert!(!matches_name_filter("Polar H10", "XOSS"));
        assert!(!matches_name_filter("", "XOSS"));
    }

    #[test]
    fn test_discovery_event_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<DeviceDiscoveryEvent>();
    }
}
