//! Hardware transport trait and error types.
//!
//! This module defines:
//! - `HapticTransport` trait - Interface to the connection layer of the devices
//! - `TransportError` enum - Error types for transport operations
//! - `PlayCommand` struct - One dense motor frame addressed to a device
//! - `ConnectivityEvent` struct - Connect/disconnect notification

use crate::consts::MAX_MOTORS;
use crate::position::PhysicalPosition;
use thiserror::Error;
use tokio::sync::broadcast;

/// Dense per-device motor intensities, 0..=100 each.
pub type MotorArray = heapless::Vec<u8, MAX_MOTORS>;

/// Error types for transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Target device is not connected.
    #[error("device not connected: {0}")]
    NotConnected(PhysicalPosition),

    /// Link-level communication failure.
    #[error("transport communication error: {0}")]
    Communication(String),

    /// Device refused the command.
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Play a motor frame for a duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCommand {
    /// Pattern / device key scoping the submission channel.
    pub key: String,
    /// Play duration [ms].
    pub duration_ms: u16,
    /// Addressed device.
    pub position: PhysicalPosition,
    /// Dense motor intensities sized for `position`.
    pub motors: MotorArray,
}

/// A device became reachable or unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
    /// Device whose state changed.
    pub position: PhysicalPosition,
    /// New state.
    pub connected: bool,
}

/// Trait defining the connection layer to the haptic hardware.
///
/// Implementations are shared between the sampling thread and the registry
/// tasks, so every method takes `&self`.
///
/// # Timing Contracts
///
/// | Operation | Called from | Constraint |
/// |-----------|-------------|------------|
/// | `is_connected()` | tick loop (cached, ≤ 1/s per position) | fast |
/// | `play()` | tick loop | must not block on I/O |
/// | `stop()` / `stop_all()` | registry / shutdown | none |
pub trait HapticTransport: Send + Sync {
    /// Returns the transport's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Whether a device is reachable at `position`.
    fn is_connected(&self, position: PhysicalPosition) -> bool;

    /// Play a motor frame.
    fn play(&self, command: &PlayCommand) -> Result<(), TransportError>;

    /// Stop the pattern registered under `key`.
    fn stop(&self, key: &str) -> Result<(), TransportError>;

    /// Stop all output on every device.
    fn stop_all(&self) -> Result<(), TransportError>;

    /// Subscribe to connectivity changes.
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::NotConnected(PhysicalPosition::VestBack);
        assert!(err.to_string().contains("vest_back"));

        let err = TransportError::Communication("link lost".to_string());
        assert!(err.to_string().contains("link lost"));
    }

    #[test]
    fn test_motor_array_capacity() {
        let mut motors = MotorArray::new();
        for _ in 0..MAX_MOTORS {
            assert!(motors.push(1).is_ok());
        }
        assert!(motors.push(1).is_err());
    }
}
