//! Serial Binding Library
//!
//! Adapts a callback-based serial platform API into an async device
//! interface: open, close, write, control signals, flush and disconnect
//! notification for a single connection per binding instance.
//!
//! # Modules
//!
//! - `binding`: The async device interface and its callback adapter
//! - `buffer`: Byte buffer conversion at the platform boundary
//! - `config`: Configuration management with TOML support
//! - `error`: Binding error type
//! - `options`: Portable open options and their native translation
//! - `platform`: The callback-style platform surface, with mock and native backends

pub mod binding;
pub mod buffer;
pub mod config;
pub mod error;
pub mod options;
pub mod platform;

// Re-export commonly used types for convenience
pub use binding::{
    BindingConfig, CallbackBinding, ConnectionState, DisconnectEvent, DisconnectReceiver,
    PortInfo, SerialBinding,
};
pub use error::{BindingError, BindingResult};
pub use options::{NativeOptions, Parity, PortableOptions, SetOptions};
pub use platform::{
    ConnectionId, MockPlatform, NativePlatform, PlatformError, ReceiveErrorKind, SerialPlatform,
    SignalState,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
