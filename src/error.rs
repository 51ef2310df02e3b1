//! Binding-level error types.
//!
//! Every failure the binding reports falls into one of four families:
//! platform rejections, connection-establishment failures, unsupported
//! operations and link loss. Precondition violations from the shared
//! state checks sit alongside them.

use crate::platform::{PlatformError, ReceiveErrorKind};
use thiserror::Error;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Errors produced by a serial binding.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The platform rejected the call.
    #[error("{op} failed: {source}")]
    Platform {
        op: &'static str,
        #[source]
        source: PlatformError,
    },

    /// The platform answered `connect` with the invalid connection id.
    #[error("Unable to connect to \"{path}\" for unknown reasons")]
    ConnectionFailed { path: String },

    /// The platform has no primitive for the requested operation.
    #[error("{0} is not supported by this platform")]
    Unsupported(&'static str),

    /// The link to the device was lost.
    #[error("Disconnected: {cause}")]
    Disconnected { cause: ReceiveErrorKind },

    /// Attempted to open a binding that already holds a connection.
    #[error("Port is already open")]
    AlreadyOpen,

    /// Attempted to use a binding without an open connection.
    #[error("Port is not open")]
    NotOpen,

    /// An argument failed the shared precondition checks.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The native buffer could not be allocated.
    #[error("Unable to allocate a {0} byte buffer")]
    Allocation(usize),

    /// The platform dropped the completion without ever invoking it.
    #[error("{op} completion was dropped before it fired")]
    CallbackDropped { op: &'static str },
}

impl BindingError {
    pub fn platform(op: &'static str, source: PlatformError) -> Self {
        Self::Platform { op, source }
    }

    pub fn connection_failed(path: impl Into<String>) -> Self {
        Self::ConnectionFailed { path: path.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether this error reports a lost link rather than a failed call.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BindingError::connection_failed("/dev/ttyUSB0");
        assert_eq!(
            err.to_string(),
            "Unable to connect to \"/dev/ttyUSB0\" for unknown reasons"
        );

        let err = BindingError::Unsupported("drain");
        assert_eq!(err.to_string(), "drain is not supported by this platform");

        let err = BindingError::Disconnected {
            cause: ReceiveErrorKind::DeviceLost,
        };
        assert_eq!(err.to_string(), "Disconnected: device_lost");
        assert!(err.is_link_loss());
    }

    #[test]
    fn test_platform_error_keeps_source() {
        let err = BindingError::platform("connect", PlatformError::message("Failed to connect"));
        assert_eq!(err.to_string(), "connect failed: Failed to connect");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_link_loss());
    }
}
