//! The capability interface every serial binding implements, and the
//! precondition checks they share.

use super::state::ConnectionState;
use crate::error::{BindingError, BindingResult};
use crate::options::{PortableOptions, SetOptions};
use crate::platform::{ConnectionId, SignalState};
use async_trait::async_trait;

/// Async interface to one serial connection.
///
/// Callers must not start a lifecycle operation while another one on the same
/// instance is still pending.
#[async_trait]
pub trait SerialBinding: Send + Sync {
    /// Whether a connection is currently open.
    fn is_open(&self) -> bool;

    /// Open a connection to `path`.
    async fn open(&self, path: &str, options: &PortableOptions) -> BindingResult<()>;

    /// Close the open connection.
    async fn close(&self) -> BindingResult<()>;

    /// Write bytes to the open connection.
    async fn write(&self, data: &[u8]) -> BindingResult<()>;

    /// Set output control lines.
    async fn set(&self, options: &SetOptions) -> BindingResult<()>;

    /// Read input control lines.
    async fn get(&self) -> BindingResult<SignalState>;

    /// Discard pending input and output.
    async fn flush(&self) -> BindingResult<()>;

    /// Wait until all written data has been transmitted.
    async fn drain(&self) -> BindingResult<()>;
}

/// Fails unless no connection is open.
pub fn require_closed(state: &ConnectionState) -> BindingResult<()> {
    if state.is_open() {
        return Err(BindingError::AlreadyOpen);
    }
    Ok(())
}

/// Fails unless a connection is open, returning its id.
pub fn require_open(state: &ConnectionState) -> BindingResult<ConnectionId> {
    state.connection_id().ok_or(BindingError::NotOpen)
}

/// Argument checks for `open`.
pub fn validate_open(path: &str, options: &PortableOptions) -> BindingResult<()> {
    if path.trim().is_empty() {
        return Err(BindingError::invalid_argument("path must not be empty"));
    }
    if options.baud_rate == 0 {
        return Err(BindingError::invalid_argument(
            "baud_rate must be a positive integer",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventSource;

    #[test]
    fn test_require_closed() {
        assert!(require_closed(&ConnectionState::Closed).is_ok());
        let open = ConnectionState::Open {
            id: ConnectionId(0),
            reader: EventSource::<()>::new().add_listener(|_| {}),
        };
        assert!(matches!(require_closed(&open), Err(BindingError::AlreadyOpen)));
        assert_eq!(require_open(&open).unwrap(), ConnectionId(0));
    }

    #[test]
    fn test_require_open() {
        assert!(matches!(
            require_open(&ConnectionState::Closed),
            Err(BindingError::NotOpen)
        ));
        let released = ConnectionState::Released {
            previous: ConnectionId(2),
        };
        assert!(matches!(require_open(&released), Err(BindingError::NotOpen)));
    }

    #[test]
    fn test_validate_open() {
        let options = PortableOptions::default();
        assert!(validate_open("/dev/ttyUSB0", &options).is_ok());
        assert!(matches!(
            validate_open("  ", &options),
            Err(BindingError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_open("COM3", &PortableOptions::with_baud_rate(0)),
            Err(BindingError::InvalidArgument(_))
        ));
    }
}
