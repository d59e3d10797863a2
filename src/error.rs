//! Session-level error taxonomy.
//!
//! These errors never reach callers of the blocking API directly: the session
//! logs them and reports `false`/`None`. They are public so that observers,
//! logs and tests can name the failure precisely.

use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Only one device may be open per session.
    #[error("Session is already connected to a device")]
    AlreadyConnected,

    /// The operation needs an open device.
    #[error("Session is not connected")]
    NotConnected,

    /// The driver refused to open the device.
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: PortError,
    },

    /// No line arrived before the caller stopped waiting.
    #[error("No data within {0:?}")]
    ReadTimeout(Duration),

    /// The driver failed while reading.
    #[error("Read failed: {0}")]
    Read(#[source] PortError),

    /// The driver failed while writing.
    #[error("Write failed: {0}")]
    Write(#[source] PortError),

    /// The active device was physically removed.
    #[error("Device '{0}' was removed while in use")]
    ForcedDisconnect(String),

    /// The device directory could not be queried or subscribed to.
    #[error("Device directory error: {0}")]
    Directory(#[source] PortError),

    /// `set_observer` may only succeed once.
    #[error("An observer is already registered")]
    ObserverAlreadySet,

    /// The worker thread is gone; no more operations can run.
    #[error("Session worker has stopped")]
    WorkerStopped,

    /// A background thread could not be started.
    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl SessionError {
    pub fn open(path: impl Into<String>, source: PortError) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}
