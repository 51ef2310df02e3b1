//! Platform abstraction layer for callback-based serial APIs.
//!
//! Defines the `SerialPlatform` contract a binding drives, the event sources
//! a platform publishes inbound data and receive errors on, and two
//! implementations: an in-memory mock for tests and a native platform backed
//! by the `serialport` crate.

pub mod error;
pub mod events;
pub mod mock;
pub mod native;
pub mod traits;

pub use error::{PlatformError, PlatformResult};
pub use events::{EventSource, ListenerToken};
pub use mock::{MockCall, MockConnection, MockPlatform};
pub use native::NativePlatform;
pub use traits::*;
