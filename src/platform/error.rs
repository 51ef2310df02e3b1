//! Platform-side error types.
//!
//! These are the errors a platform hands to a completion. They are kept
//! separate from binding-level errors so a platform implementation never
//! needs to know about binding state.

use super::traits::{ConnectionId, SendError};
use thiserror::Error;

/// Result handed to every platform completion.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors reported by a serial platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A free-form error message, as most platforms report failures.
    #[error("{0}")]
    Message(String),

    /// The connection id does not name a live connection.
    #[error("Serial connection not found: {0}")]
    UnknownConnection(ConnectionId),

    /// The platform cannot express one of the requested options.
    #[error("Unsupported option: {0}")]
    InvalidOption(String),

    /// A send completed but reported an in-band error.
    #[error("Send failed: {0}")]
    Send(SendError),

    /// An I/O error occurred on the underlying device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PlatformError {
    /// Create a Message error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Create an InvalidOption error.
    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption(message.into())
    }
}
