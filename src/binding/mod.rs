//! Binding that adapts a callback-based [`SerialPlatform`] into the async
//! [`SerialBinding`] interface.
//!
//! A [`CallbackBinding`] owns at most one platform connection. It translates
//! portable options, routes platform calls through [`call`], forwards inbound
//! bytes for its own connection to the data callback, and watches receive
//! errors so that a lost link is reported on the disconnect channel and the
//! connection released.
//!
//! # Example
//! ```
//! use serial_binding::binding::{BindingConfig, CallbackBinding, SerialBinding};
//! use serial_binding::options::PortableOptions;
//! use serial_binding::platform::MockPlatform;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let platform = MockPlatform::new();
//! let (config, _disconnects) = BindingConfig::new(|bytes| println!("{bytes:?}"));
//! let binding = CallbackBinding::new(Arc::new(platform.clone()), config);
//!
//! binding.open("MOCK0", &PortableOptions::default()).await.unwrap();
//! binding.write(b"AT\r\n").await.unwrap();
//! binding.close().await.unwrap();
//! assert!(binding.drain().await.is_err());
//! # });
//! ```

mod base;
mod call;
mod device;
mod state;
mod watcher;

pub use base::{require_closed, require_open, validate_open, SerialBinding};
pub use call::call;
pub use device::PortInfo;
pub use state::ConnectionState;
pub use watcher::{DisconnectEvent, WatchOutcome};

use crate::buffer;
use crate::error::{BindingError, BindingResult};
use crate::options::{self, PortableOptions, SetOptions};
use crate::platform::{
    ConnectionId, ControlSignals, ListenerToken, PlatformError, ReceiveInfo, SerialPlatform,
    SignalState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Sink for inbound bytes.
pub type DataCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Sending half of the disconnect channel.
pub type DisconnectNotifier = mpsc::UnboundedSender<DisconnectEvent>;

/// Receiving half of the disconnect channel.
pub type DisconnectReceiver = mpsc::UnboundedReceiver<DisconnectEvent>;

/// What a binding hands its data and disconnects to.
#[derive(Clone)]
pub struct BindingConfig {
    pub data_callback: DataCallback,
    pub disconnect: DisconnectNotifier,
}

impl BindingConfig {
    /// Build a config around `data_callback` with a fresh disconnect channel.
    pub fn new<F>(data_callback: F) -> (Self, DisconnectReceiver)
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                data_callback: Arc::new(data_callback),
                disconnect: tx,
            },
            rx,
        )
    }
}

impl std::fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingConfig")
            .field("disconnect_closed", &self.disconnect.is_closed())
            .finish_non_exhaustive()
    }
}

/// State shared between the binding and the listeners it registers.
struct Shared {
    platform: Arc<dyn SerialPlatform>,
    state: Mutex<ConnectionState>,
    data_callback: DataCallback,
    notifier: DisconnectNotifier,
}

impl Shared {
    fn connection_id(&self) -> Option<ConnectionId> {
        self.state.lock().connection_id()
    }

    /// Forward inbound bytes if they belong to the live connection.
    fn deliver(&self, info: &ReceiveInfo) -> bool {
        if self.connection_id() != Some(info.connection_id) {
            trace!(id = %info.connection_id, "dropping data for a stale connection");
            return false;
        }
        match buffer::from_native(&info.data) {
            Ok(bytes) => {
                (self.data_callback)(bytes);
                true
            }
            Err(err) => {
                error!(id = %info.connection_id, error = %err, "dropping inbound data");
                false
            }
        }
    }

    /// Reset to closed and detach the read listener.
    ///
    /// Shared by `close` and the forced close; returns `None` when there was
    /// nothing to release.
    fn release(&self, only: Option<ConnectionId>) -> Option<ConnectionId> {
        let released = self.state.lock().release(only);
        released.map(|(id, reader)| {
            self.platform.on_receive().remove_listener(reader);
            id
        })
    }

    /// Release `id` and tell the platform to disconnect without waiting.
    fn force_close(&self, id: ConnectionId) -> bool {
        let Some(id) = self.release(Some(id)) else {
            return false;
        };
        info!(%id, "forcing serial binding closed");
        self.platform.disconnect(
            id,
            Box::new(move |result| {
                if let Err(err) = result {
                    warn!(%id, error = %err, "forced disconnect failed");
                }
            }),
        );
        true
    }
}

/// Serial binding over a callback-based platform.
pub struct CallbackBinding {
    shared: Arc<Shared>,
    watcher: ListenerToken,
}

impl CallbackBinding {
    /// Create a closed binding and register its disconnect watcher.
    pub fn new(platform: Arc<dyn SerialPlatform>, config: BindingConfig) -> Self {
        let shared = Arc::new(Shared {
            platform,
            state: Mutex::new(ConnectionState::Closed),
            data_callback: config.data_callback,
            notifier: config.disconnect,
        });
        let watcher = watcher::install(&shared);
        Self { shared, watcher }
    }

    /// List the devices the platform can connect to.
    pub async fn list(platform: &dyn SerialPlatform) -> BindingResult<Vec<PortInfo>> {
        let devices = call("getDevices", |done| platform.get_devices(done)).await?;
        Ok(devices.into_iter().map(PortInfo::from).collect())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// The live connection id, if open.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.shared.connection_id()
    }

    pub fn platform(&self) -> &Arc<dyn SerialPlatform> {
        &self.shared.platform
    }

    fn attach_reader(&self) -> ListenerToken {
        let weak = Arc::downgrade(&self.shared);
        self.shared
            .platform
            .on_receive()
            .add_listener(move |info: &ReceiveInfo| {
                if let Some(shared) = weak.upgrade() {
                    shared.deliver(info);
                }
            })
    }
}

#[async_trait]
impl SerialBinding for CallbackBinding {
    fn is_open(&self) -> bool {
        self.shared.state.lock().is_open()
    }

    async fn open(&self, path: &str, options: &PortableOptions) -> BindingResult<()> {
        require_closed(&self.shared.state.lock())?;
        validate_open(path, options)?;

        let native = options::translate(options);
        let platform = &self.shared.platform;
        let info = call("connect", |done| platform.connect(path, &native, done)).await?;
        if !info.connection_id.is_valid() {
            warn!(path, "platform answered connect with the invalid connection id");
            return Err(BindingError::connection_failed(path));
        }

        let id = info.connection_id;
        let reader = self.attach_reader();
        *self.shared.state.lock() = ConnectionState::Open { id, reader };

        // The connection was opened paused; resume now that the reader is attached.
        if let Err(err) = call("setPaused", |done| platform.set_paused(id, false, done)).await {
            self.shared.force_close(id);
            return Err(err);
        }

        info!(path, %id, bitrate = native.bitrate, "serial binding opened");
        Ok(())
    }

    async fn close(&self) -> BindingResult<()> {
        let id = require_open(&self.shared.state.lock())?;
        let platform = &self.shared.platform;
        let result = call("disconnect", |done| platform.disconnect(id, done)).await;

        // Local state is reset whether or not the platform call succeeded.
        if self.shared.release(Some(id)).is_none() {
            debug!(%id, "connection was already released by a forced close");
            if let Err(err) = result {
                debug!(%id, error = %err, "ignoring disconnect failure after forced close");
                return Ok(());
            }
        }

        match &result {
            Ok(()) => info!(%id, "serial binding closed"),
            Err(err) => warn!(%id, error = %err, "disconnect failed; local state reset anyway"),
        }
        result
    }

    async fn write(&self, data: &[u8]) -> BindingResult<()> {
        let id = require_open(&self.shared.state.lock())?;
        let native = buffer::to_native(data)?;
        let platform = &self.shared.platform;
        let info = call("send", |done| platform.send(id, native, done)).await?;
        if let Some(error) = info.error {
            return Err(BindingError::platform("send", PlatformError::Send(error)));
        }
        trace!(%id, bytes = info.bytes_sent, "bytes sent");
        Ok(())
    }

    async fn set(&self, options: &SetOptions) -> BindingResult<()> {
        let id = require_open(&self.shared.state.lock())?;
        if options.brk {
            return Err(BindingError::Unsupported("break signal"));
        }
        let signals = ControlSignals {
            dtr: options.dtr,
            rts: options.rts,
        };
        let platform = &self.shared.platform;
        call("setControlSignals", |done| {
            platform.set_control_signals(id, signals, done)
        })
        .await
    }

    async fn get(&self) -> BindingResult<SignalState> {
        let id = require_open(&self.shared.state.lock())?;
        let (tx, rx) = oneshot::channel();
        self.shared.platform.get_control_signals(
            id,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        match rx.await {
            Ok(result) => result.map_err(|source| BindingError::platform("getControlSignals", source)),
            Err(_) => Err(BindingError::CallbackDropped {
                op: "getControlSignals",
            }),
        }
    }

    async fn flush(&self) -> BindingResult<()> {
        let id = require_open(&self.shared.state.lock())?;
        let platform = &self.shared.platform;
        call("flush", |done| platform.flush(id, done)).await
    }

    async fn drain(&self) -> BindingResult<()> {
        Err(BindingError::Unsupported("drain"))
    }
}

impl Drop for CallbackBinding {
    fn drop(&mut self) {
        self.shared
            .platform
            .on_receive_error()
            .remove_listener(self.watcher);
        if let Some(id) = self.shared.connection_id() {
            debug!(%id, "binding dropped while open");
            self.shared.force_close(id);
        }
    }
}

impl std::fmt::Debug for CallbackBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBinding")
            .field("state", &self.state())
            .field("platform", &self.shared.platform)
            .finish()
    }
}
