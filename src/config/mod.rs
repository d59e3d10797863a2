//! Configuration module for threadsafe-serial.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `THREADSAFE_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `~/.config/threadsafe-serial/config.toml` (XDG on Linux)
//! 4. `%APPDATA%\threadsafe-serial\config\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `THREADSAFE_SERIAL_<SECTION>_<KEY>`
//!
//! Examples:
//! - `THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD=115200`
//! - `THREADSAFE_SERIAL_SERIAL_READ_TIMEOUT_MS=250`
//! - `THREADSAFE_SERIAL_HOTPLUG_ENABLED=false`
//! - `THREADSAFE_SERIAL_HOTPLUG_POLL_INTERVAL_MS=1000`
//! - `THREADSAFE_SERIAL_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use threadsafe_serial::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default baud: {}", config.serial.default_baud);
//! println!("Hotplug: {}", config.hotplug.enabled);
//! # Ok::<(), threadsafe_serial::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, HotplugConfig, LogFormat, LoggingConfig, SerialConfig};
