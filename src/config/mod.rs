//! Configuration module for serial-binding.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_BINDING_CONFIG` environment variable (explicit path)
//! 2. `./serial-binding.toml` (current directory)
//! 3. `serial-binding.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_BINDING_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_BINDING_SERIAL_BAUD_RATE=115200`
//! - `SERIAL_BINDING_LOGGING_FORMAT=json`
//!
//! The legacy `TEST_PORT_RX` variable is also honored for the receiving port.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_binding::config::ConfigLoader;
//!
//! # fn main() -> Result<(), serial_binding::config::ConfigError> {
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default baud: {}", config.serial.baud_rate);
//! # Ok(())
//! # }
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TestingConfig};
