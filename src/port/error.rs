//! Port-specific error types.
//!
//! Driver failures are kept separate from session-level errors; the session
//! wraps them when an operation fails.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur inside a port driver or device directory.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial device was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No complete line arrived within the driver's read timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device went away underneath an open handle.
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// A line grew past the driver's buffering limit without a terminator.
    #[error("Line exceeds {0} bytes without a terminator")]
    LineTooLong(usize),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Create a Disconnected error for the given device path.
    pub fn disconnected(port_name: impl Into<String>) -> Self {
        Self::Disconnected(port_name.into())
    }

    /// Whether this error only means "no data yet" rather than a broken device.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
