//! Errors raised while loading, validating or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to write configuration file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value no serial platform would accept, such as a zero baud rate.
    #[error("Invalid configuration value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// A `SERIAL_BINDING_*` or `TEST_PORT_RX` override that did not parse.
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::validation("serial.baud_rate", "must be a positive integer");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'serial.baud_rate': must be a positive integer"
        );

        let err = ConfigError::env_parse("SERIAL_BINDING_SERIAL_PARITY", "Invalid parity");
        assert!(err.to_string().contains("SERIAL_BINDING_SERIAL_PARITY"));
    }

    #[test]
    fn test_toml_errors_convert() {
        let parse = toml::from_str::<toml::Value>("serial = [").unwrap_err();
        assert!(matches!(ConfigError::from(parse), ConfigError::ParseError(_)));
    }
}
