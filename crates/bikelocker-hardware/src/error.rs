//! Error types for hardware operations.
//!
//! This module defines the errors returned by the collaborator drivers: the
//! sled motor, the door solenoid, the LED ring, the NFC reader and the limit
//! switch bank.

use bikelocker_core::SwitchId;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A value the device cannot accept.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// The edge interrupt handler for a switch could not be installed.
    #[error("Failed to install edge handler for {switch}: {message}")]
    EdgeHandlerInstall { switch: SwitchId, message: String },

    /// Failure injected by a mock device.
    #[error("Injected failure: {operation}")]
    Injected { operation: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new edge handler installation error.
    pub fn edge_handler_install(switch: SwitchId, message: impl Into<String>) -> Self {
        Self::EdgeHandlerInstall {
            switch,
            message: message.into(),
        }
    }

    /// Create a new injected failure.
    pub fn injected(operation: impl Into<String>) -> Self {
        Self::Injected {
            operation: operation.into(),
        }
    }
}
