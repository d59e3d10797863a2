//! Threadsafe Serial Library
//!
//! A blocking, thread-safe facade over a single serial device. Any number of
//! threads may call into one [`SerialSession`]; device access is serialised
//! onto a worker thread, hot-plug removals force-close the session, and an
//! optional observer hears about connects and disconnects.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `directory`: Device enumeration and hot-plug events
//! - `error`: Session error taxonomy
//! - `logging`: Tracing subscriber setup for binaries
//! - `port`: Port driver abstraction (real serial ports and an in-memory mock)
//! - `session`: The session facade, worker, hot-plug coordinator and dispatcher

pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod port;
pub mod session;

// Re-export commonly used types for convenience
pub use directory::{DeviceDirectory, DeviceEvent, MockDirectory, SerialDirectory};
pub use error::{SessionError, SessionResult};
pub use port::{
    DataBits, FlowControl, MockPortDriver, Parity, PortDriver, PortError, PortSettings,
    SerialPortDriver, StopBits,
};
pub use session::{
    Notification, NotificationKind, SerialSession, SessionBuilder, SessionObserver, Status,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
