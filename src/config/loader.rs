//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::options::Parity;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_BINDING";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-binding.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_BINDING_CONFIG";

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
    /// 1. `SERIAL_BINDING_CONFIG` environment variable (explicit path)
    /// 2. `./serial-binding.toml` (current directory)
    /// 3. `serial-binding.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
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
    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "serial-binding")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&var).ok().map(|val| (var, val))
}

fn parse_env<T: std::str::FromStr>(var: &str, val: &str, what: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {}", what)))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_BINDING_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_BINDING_SERIAL_BAUD_RATE=115200`
/// - `SERIAL_BINDING_LOGGING_FORMAT=json`
/// - `SERIAL_BINDING_TESTING_PORT_RX=/dev/ttyUSB1`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((var, val)) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_env(&var, &val, "baud rate")?;
    }
    if let Some((var, val)) = env_var("SERIAL_DATA_BITS") {
        config.serial.data_bits = parse_env(&var, &val, "data bits")?;
    }
    if let Some((var, val)) = env_var("SERIAL_STOP_BITS") {
        config.serial.stop_bits = parse_env(&var, &val, "stop bits")?;
    }
    if let Some((var, val)) = env_var("SERIAL_PARITY") {
        config.serial.parity = parse_parity(&val)
            .ok_or_else(|| ConfigError::env_parse(&var, "Invalid parity"))?;
    }
    if let Some((_, val)) = env_var("SERIAL_RTSCTS") {
        config.serial.rtscts = val.to_lowercase() == "true" || val == "1";
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((var, val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = val
            .parse::<LogFormat>()
            .map_err(|message| ConfigError::env_parse(var, message))?;
    }

    // Testing overrides (also support legacy TEST_PORT_RX)
    if let Some(val) = env_var("TESTING_PORT_RX")
        .map(|(_, val)| val)
        .or_else(|| std::env::var("TEST_PORT_RX").ok())
    {
        config.testing.port_rx = Some(val);
    }
    if let Some((var, val)) = env_var("TESTING_EXPECTED_BYTES") {
        config.testing.expected_bytes = parse_env(&var, &val, "byte count")?;
    }
    if let Some((var, val)) = env_var("TESTING_TIMEOUT_MS") {
        config.testing.timeout_ms = parse_env(&var, &val, "timeout")?;
    }

    Ok(())
}

fn parse_parity(val: &str) -> Option<Parity> {
    match val.to_lowercase().as_str() {
        "none" => Some(Parity::None),
        "even" => Some(Parity::Even),
        "odd" => Some(Parity::Odd),
        "mark" => Some(Parity::Mark),
        "space" => Some(Parity::Space),
        _ => None,
    }
}

/// Reject values no platform could accept.
fn validate(config: &Config) -> ConfigResult<()> {
    if config.serial.baud_rate == 0 {
        return Err(ConfigError::validation(
            "serial.baud_rate",
            "must be a positive integer",
        ));
    }
    if config.testing.expected_bytes == 0 {
        return Err(ConfigError::validation(
            "testing.expected_bytes",
            "must be at least 1",
        ));
    }
    Ok(())
}
