//! BLE connection management.
//!
//! Handles connecting to and disconnecting from heart-rate sensors.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Connection state for a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and services discovered.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Event for connection state changes.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// The identifier of the peripheral.
    pub identifier: String,
    /// The new connection state.
    pub state: ConnectionState,
}

/// Manages the connection to one sensor.
pub struct ConnectionManager {
    /// The peripheral to manage.
    peripheral: Peripheral,
    /// Current connection state.
    state: Arc<RwLock<ConnectionState>>,
    /// Channel for connection events.
    event_tx: broadcast::Sender<ConnectionEvent>,
    /// Maximum connection attempts.
    max_attempts: u32,
    /// Delay between attempts.
    retry_delay: Duration,
}

impl ConnectionManager {
    /// Create a new connection manager for a peripheral.
    pub fn new(peripheral: Peripheral) -> Self {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            peripheral,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            event_tx,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Set the retry parameters.
    pub fn set_retry_params(&mut self, max_attempts: u32, delay: Duration) {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = delay;
    }

    /// Connect and discover services, retrying up to the configured limit.
    pub async fn connect(&self) -> Result<()> {
        let current_state = self.state();

        if current_state.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        if current_state.is_transitioning() {
            return Err(Error::ConnectionFailed {
                reason: format!("Connection is {}", current_state),
            });
        }

        self.set_state(ConnectionState::Connecting);

        for attempt in 1..=self.max_attempts {
            debug!("Connection attempt {} of {}", attempt, self.max_attempts);

            match self.try_connect().await {
                Ok(()) => {
                    info!("Connected to sensor");
                    self.set_state(ConnectionState::Connected);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);

                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(Error::ConnectionFailed {
            reason: format!("Failed after {} attempts", self.max_attempts),
        })
    }

    /// One connection attempt including service discovery.
    async fn try_connect(&self) -> Result<()> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.connect().await?;
        }

        // Without services there is no characteristic to subscribe to
        self.peripheral.discover_services().await?;

        Ok(())
    }

    /// Disconnect from the sensor.
    pub async fn disconnect(&self) -> Result<()> {
        let current_state = self.state();

        if matches!(
            current_state,
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        ) {
            return Ok(());
        }

        self.set_state(ConnectionState::Disconnecting);

        let result = self.peripheral.disconnect().await;
        self.set_state(ConnectionState::Disconnected);

        match result {
            Ok(_) => {
                info!("Disconnected from sensor");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    /// Update the connection state and emit an event.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);

            let _ = self.event_tx.send(ConnectionEvent {
                identifier: self.peripheral.id().to_string(),
                state: new_state,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(ConnectionState::Disconnecting.is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connecting), "Connecting");
        assert_eq!(format!("{}", ConnectionState::Disconnecting), "Disconnecting");
    }
}
