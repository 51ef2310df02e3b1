//! The callback-style platform contract.
//!
//! A platform exposes connect/disconnect/send/flush and control-signal calls
//! keyed by a path or a connection id. Each call reports completion through a
//! closure passed as its final argument, and the platform publishes inbound
//! data and receive errors through two event sources.

use super::error::PlatformResult;
use super::events::EventSource;
use crate::buffer::NativeBuffer;
use crate::options::NativeOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Completion closure handed to the platform as the final argument of a call.
///
/// A platform invokes it exactly once, from any thread.
pub type Completion<T> = Box<dyn FnOnce(PlatformResult<T>) + Send + 'static>;

/// Identifier of an open platform-level connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub i32);

impl ConnectionId {
    /// In-band sentinel meaning the platform could not connect.
    pub const INVALID: Self = Self(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Answer to a successful `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub paused: bool,
    pub bitrate: u32,
    pub name: Option<String>,
}

impl ConnectionInfo {
    /// The answer a platform gives when it could not connect but raised no error.
    pub fn refused() -> Self {
        Self {
            connection_id: ConnectionId::INVALID,
            paused: false,
            bitrate: 0,
            name: None,
        }
    }
}

/// In-band error reported by `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendError {
    Disconnected,
    Pending,
    Timeout,
    SystemError,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Pending => "pending",
            Self::Timeout => "timeout",
            Self::SystemError => "system_error",
        };
        f.write_str(name)
    }
}

/// Answer to a `send` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendInfo {
    pub bytes_sent: usize,
    pub error: Option<SendError>,
}

/// Output control lines. `None` leaves a line untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlSignals {
    pub dtr: Option<bool>,
    pub rts: Option<bool>,
}

/// Input control lines as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalState {
    pub dcd: bool,
    pub cts: bool,
    pub ri: bool,
    pub dsr: bool,
}

/// A serial device known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub path: String,
    pub display_name: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

/// Inbound data for one connection.
#[derive(Debug, Clone)]
pub struct ReceiveInfo {
    pub connection_id: ConnectionId,
    pub data: NativeBuffer,
}

/// Cause of a receive error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReceiveErrorKind {
    Disconnected,
    Timeout,
    DeviceLost,
    Break,
    FrameError,
    Overrun,
    BufferOverflow,
    ParityError,
    SystemError,
    /// A cause this crate does not know by name.
    Other(String),
}

impl ReceiveErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Timeout => "timeout",
            Self::DeviceLost => "device_lost",
            Self::Break => "break",
            Self::FrameError => "frame_error",
            Self::Overrun => "overrun",
            Self::BufferOverflow => "buffer_overflow",
            Self::ParityError => "parity_error",
            Self::SystemError => "system_error",
            Self::Other(name) => name,
        }
    }

    /// Causes after which the link cannot be used any more.
    pub fn is_link_loss(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::DeviceLost | Self::SystemError
        )
    }
}

impl From<&str> for ReceiveErrorKind {
    fn from(name: &str) -> Self {
        match name {
            "disconnected" => Self::Disconnected,
            "timeout" => Self::Timeout,
            "device_lost" => Self::DeviceLost,
            "break" => Self::Break,
            "frame_error" => Self::FrameError,
            "overrun" => Self::Overrun,
            "buffer_overflow" => Self::BufferOverflow,
            "parity_error" => Self::ParityError,
            "system_error" => Self::SystemError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReceiveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A receive error for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveErrorInfo {
    pub connection_id: ConnectionId,
    pub error: ReceiveErrorKind,
}

/// Callback-based serial platform.
///
/// Implementations may complete calls synchronously inside the call or later
/// from their own threads. Failures are reported by handing `Err` to the
/// completion; no call reports failure any other way, except `connect`, which
/// may answer with [`ConnectionId::INVALID`].
pub trait SerialPlatform: Send + Sync + fmt::Debug {
    /// Enumerate the devices the platform can connect to.
    fn get_devices(&self, done: Completion<Vec<DeviceInfo>>);

    /// Connect to the device at `path`.
    fn connect(&self, path: &str, options: &NativeOptions, done: Completion<ConnectionInfo>);

    /// Tear down a connection.
    fn disconnect(&self, id: ConnectionId, done: Completion<()>);

    /// Hold or resume delivery of receive events for a connection.
    fn set_paused(&self, id: ConnectionId, paused: bool, done: Completion<()>);

    /// Send bytes on a connection.
    fn send(&self, id: ConnectionId, data: NativeBuffer, done: Completion<SendInfo>);

    /// Discard pending input and output.
    fn flush(&self, id: ConnectionId, done: Completion<()>);

    /// Drive the output control lines.
    fn set_control_signals(&self, id: ConnectionId, signals: ControlSignals, done: Completion<()>);

    /// Read the input control lines.
    fn get_control_signals(&self, id: ConnectionId, done: Completion<SignalState>);

    /// Inbound data for every connection.
    fn on_receive(&self) -> &EventSource<ReceiveInfo>;

    /// Receive errors for every connection.
    fn on_receive_error(&self) -> &EventSource<ReceiveErrorInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_sentinel() {
        assert!(!ConnectionId::INVALID.is_valid());
        assert!(ConnectionId(0).is_valid());
        assert_eq!(ConnectionInfo::refused().connection_id, ConnectionId::INVALID);
    }

    #[test]
    fn test_receive_error_names() {
        for name in [
            "disconnected",
            "timeout",
            "device_lost",
            "break",
            "frame_error",
            "overrun",
            "buffer_overflow",
            "parity_error",
            "system_error",
        ] {
            let kind = ReceiveErrorKind::from(name);
            assert!(!matches!(kind, ReceiveErrorKind::Other(_)), "{name}");
            assert_eq!(kind.as_str(), name);
        }
        assert_eq!(
            ReceiveErrorKind::from("cable_chewed"),
            ReceiveErrorKind::Other("cable_chewed".to_string())
        );
    }

    #[test]
    fn test_link_loss_causes() {
        assert!(ReceiveErrorKind::Disconnected.is_link_loss());
        assert!(ReceiveErrorKind::DeviceLost.is_link_loss());
        assert!(ReceiveErrorKind::SystemError.is_link_loss());
        assert!(!ReceiveErrorKind::Timeout.is_link_loss());
        assert!(!ReceiveErrorKind::Overrun.is_link_loss());
        assert!(!ReceiveErrorKind::Other("x".into()).is_link_loss());
    }
}
