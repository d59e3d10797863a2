//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "THREADSAFE_SERIAL";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "THREADSAFE_SERIAL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `THREADSAFE_SERIAL_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. the platform config directory (`~/.config/threadsafe-serial/` etc.)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if apply_env_overrides(&mut config).is_err() || validate(&config).is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "threadsafe-serial").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_parse<T: std::str::FromStr>(
    key: &str,
    expected: &'static str,
) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(val) => match val.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::env_override(var, val, expected)),
        },
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `THREADSAFE_SERIAL_<SECTION>_<KEY>`
/// For example:
/// - `THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD=115200`
/// - `THREADSAFE_SERIAL_HOTPLUG_ENABLED=false`
/// - `THREADSAFE_SERIAL_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some(baud) = env_parse("SERIAL_DEFAULT_BAUD", "baud rate")? {
        config.serial.default_baud = baud;
    }
    if let Some(ms) = env_parse("SERIAL_READ_TIMEOUT_MS", "timeout")? {
        config.serial.read_timeout_ms = ms;
    }

    // Hotplug overrides
    if let Ok(val) = std::env::var(format!("{}_HOTPLUG_ENABLED", ENV_PREFIX)) {
        config.hotplug.enabled = val.to_lowercase() == "true" || val == "1";
    }
    if let Some(ms) = env_parse("HOTPLUG_POLL_INTERVAL_MS", "poll interval")? {
        config.hotplug.poll_interval_ms = ms;
    }

    // Logging overrides
    if let Ok(val) = std::env::var(format!("{}_LOGGING_LEVEL", ENV_PREFIX)) {
        config.logging.level = val;
    }

    Ok(())
}

/// Reject values no session could run with.
fn validate(config: &Config) -> ConfigResult<()> {
    if config.serial.default_baud == 0 {
        return Err(ConfigError::ZeroBaudRate);
    }
    if config.hotplug.enabled && config.hotplug.poll_interval_ms == 0 {
        return Err(ConfigError::ZeroPollInterval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD", "57600");
        env::set_var("THREADSAFE_SERIAL_HOTPLUG_ENABLED", "false");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 57600);
        assert!(!loader.config().hotplug.enabled);

        env::remove_var("THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD");
        env::remove_var("THREADSAFE_SERIAL_HOTPLUG_ENABLED");
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_reported() {
        env::set_var("THREADSAFE_SERIAL_SERIAL_READ_TIMEOUT_MS", "soon");
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        env::remove_var("THREADSAFE_SERIAL_SERIAL_READ_TIMEOUT_MS");

        assert!(matches!(
            result,
            Err(ConfigError::EnvOverride {
                expected: "timeout",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_file_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[serial]\ndefault_baud = 19200\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config().serial.default_baud, 19200);
        assert_eq!(loader.config().logging.format, super::super::LogFormat::Json);

        let copy = dir.path().join("nested").join("copy.toml");
        loader.save_to(&copy).unwrap();
        let reloaded = ConfigLoader::load_from(&copy).unwrap();
        assert_eq!(reloaded.config().serial.default_baud, 19200);
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConfigLoader::load_from(dir.path().join("absent.toml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_baud() {
        let mut config = Config::default();
        config.serial.default_baud = 0;
        assert!(matches!(validate(&config), Err(ConfigError::ZeroBaudRate)));
    }

    #[test]
    fn test_validation_rejects_zero_poll_interval_only_when_enabled() {
        let mut config = Config::default();
        config.hotplug.poll_interval_ms = 0;
        assert!(matches!(validate(&config), Err(ConfigError::ZeroPollInterval)));

        config.hotplug.enabled = false;
        assert!(validate(&config).is_ok());
    }
}
