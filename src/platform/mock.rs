//! Mock serial platform for testing.
//!
//! Provides a `MockPlatform` that simulates a callback-based platform without
//! requiring hardware. Calls can be scripted to fail, `connect` can be made to
//! answer with the invalid id, completions can be held back, and inbound data
//! or receive errors can be injected on demand.

use super::error::{PlatformError, PlatformResult};
use super::events::EventSource;
use super::traits::{
    Completion, ConnectionId, ConnectionInfo, ControlSignals, DeviceInfo, ReceiveErrorInfo,
    ReceiveErrorKind, ReceiveInfo, SendError, SendInfo, SerialPlatform, SignalState,
};
use crate::buffer::NativeBuffer;
use crate::options::NativeOptions;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Platform calls the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    GetDevices,
    Connect,
    Disconnect,
    SetPaused,
    Send,
    Flush,
    SetControlSignals,
    GetControlSignals,
}

/// A connection held by the mock.
#[derive(Debug, Clone)]
pub struct MockConnection {
    pub path: String,
    pub options: NativeOptions,
    pub paused: bool,
    pub signals: ControlSignals,
    pub flush_count: usize,
}

type Deferred = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct MockPlatformState {
    next_id: i32,
    devices: Vec<DeviceInfo>,
    connections: HashMap<ConnectionId, MockConnection>,
    /// Inbound data emitted while its connection was paused.
    held_data: HashMap<ConnectionId, Vec<Vec<u8>>>,
    refuse_next_connect: bool,
    failures: HashMap<MockCall, VecDeque<String>>,
    next_send_error: Option<SendError>,
    signal_state: SignalState,
    send_log: Vec<(ConnectionId, Vec<u8>)>,
    call_log: Vec<MockCall>,
    hold_completions: bool,
    held: VecDeque<Deferred>,
}

struct MockInner {
    state: Mutex<MockPlatformState>,
    receive: EventSource<ReceiveInfo>,
    receive_error: EventSource<ReceiveErrorInfo>,
}

/// Mock serial platform.
///
/// Clones share state, so a test can keep one handle while the binding owns
/// another.
///
/// # Example
/// ```
/// use serial_binding::platform::{MockCall, MockPlatform};
///
/// let platform = MockPlatform::new();
/// platform.fail_next(MockCall::Flush, "device busy");
/// platform.refuse_next_connect();
/// assert!(platform.call_log().is_empty());
/// ```
#[derive(Clone)]
pub struct MockPlatform {
    inner: Arc<MockInner>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner {
                state: Mutex::new(MockPlatformState::default()),
                receive: EventSource::new(),
                receive_error: EventSource::new(),
            }),
        }
    }

    /// Replace the list returned by `get_devices`.
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        self.inner.state.lock().devices = devices;
    }

    /// Make the next `connect` answer with the invalid connection id.
    pub fn refuse_next_connect(&self) {
        self.inner.state.lock().refuse_next_connect = true;
    }

    /// Make the next call of the given kind complete with an error.
    pub fn fail_next(&self, call: MockCall, message: impl Into<String>) {
        self.inner
            .state
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(message.into());
    }

    /// Make the next `send` report an in-band error.
    pub fn set_next_send_error(&self, error: SendError) {
        self.inner.state.lock().next_send_error = Some(error);
    }

    /// Set what `get_control_signals` reports.
    pub fn set_signal_state(&self, state: SignalState) {
        self.inner.state.lock().signal_state = state;
    }

    /// Queue completions instead of firing them inside the call.
    pub fn hold_completions(&self, hold: bool) {
        self.inner.state.lock().hold_completions = hold;
    }

    /// Fire every queued completion in call order. Returns how many fired.
    pub fn release_completions(&self) -> usize {
        let held: Vec<Deferred> = self.inner.state.lock().held.drain(..).collect();
        let count = held.len();
        for complete in held {
            complete();
        }
        count
    }

    /// Deliver inbound bytes as the platform would.
    ///
    /// Data for a paused connection is held until it is unpaused and 0 is
    /// returned. Otherwise returns how many listeners saw the data.
    pub fn emit_data(&self, id: ConnectionId, data: &[u8]) -> usize {
        {
            let mut state = self.inner.state.lock();
            if state.connections.get(&id).is_some_and(|c| c.paused) {
                state.held_data.entry(id).or_default().push(data.to_vec());
                return 0;
            }
        }
        self.dispatch_data(id, data.to_vec())
    }

    fn dispatch_data(&self, id: ConnectionId, data: Vec<u8>) -> usize {
        self.inner.receive.dispatch(&ReceiveInfo {
            connection_id: id,
            data: NativeBuffer::from(data),
        })
    }

    /// Deliver a receive error as the platform would.
    pub fn emit_error(&self, id: ConnectionId, error: ReceiveErrorKind) -> usize {
        self.inner.receive_error.dispatch(&ReceiveErrorInfo {
            connection_id: id,
            error,
        })
    }

    /// Snapshot of a live connection.
    pub fn connection(&self, id: ConnectionId) -> Option<MockConnection> {
        self.inner.state.lock().connections.get(&id).cloned()
    }

    pub fn open_connections(&self) -> usize {
        self.inner.state.lock().connections.len()
    }

    /// Every payload sent, in order.
    pub fn send_log(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.inner.state.lock().send_log.clone()
    }

    /// Every call made, in order.
    pub fn call_log(&self) -> Vec<MockCall> {
        self.inner.state.lock().call_log.clone()
    }

    /// Record the call and pop a scripted failure for it, if any.
    fn begin(&self, state: &mut MockPlatformState, call: MockCall) -> Option<PlatformError> {
        state.call_log.push(call);
        state
            .failures
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
            .map(PlatformError::Message)
    }

    fn complete<T: Send + 'static>(&self, done: Completion<T>, result: PlatformResult<T>) {
        let mut state = self.inner.state.lock();
        if state.hold_completions {
            state.held.push_back(Box::new(move || done(result)));
            return;
        }
        drop(state);
        done(result);
    }

    fn with_connection<T, F>(&self, call: MockCall, id: ConnectionId, f: F) -> PlatformResult<T>
    where
        F: FnOnce(&mut MockPlatformState) -> T,
    {
        let mut state = self.inner.state.lock();
        if let Some(err) = self.begin(&mut state, call) {
            return Err(err);
        }
        if !state.connections.contains_key(&id) {
            return Err(PlatformError::UnknownConnection(id));
        }
        Ok(f(&mut state))
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPlatform for MockPlatform {
    fn get_devices(&self, done: Completion<Vec<DeviceInfo>>) {
        let result = {
            let mut state = self.inner.state.lock();
            match self.begin(&mut state, MockCall::GetDevices) {
                Some(err) => Err(err),
                None => Ok(state.devices.clone()),
            }
        };
        self.complete(done, result);
    }

    fn connect(&self, path: &str, options: &NativeOptions, done: Completion<ConnectionInfo>) {
        let result = {
            let mut state = self.inner.state.lock();
            if let Some(err) = self.begin(&mut state, MockCall::Connect) {
                Err(err)
            } else if std::mem::take(&mut state.refuse_next_connect) {
                Ok(ConnectionInfo::refused())
            } else {
                let id = ConnectionId(state.next_id);
                state.next_id += 1;
                state.connections.insert(
                    id,
                    MockConnection {
                        path: path.to_string(),
                        options: options.clone(),
                        paused: options.paused,
                        signals: ControlSignals::default(),
                        flush_count: 0,
                    },
                );
                Ok(ConnectionInfo {
                    connection_id: id,
                    paused: options.paused,
                    bitrate: options.bitrate,
                    name: options.name.clone(),
                })
            }
        };
        self.complete(done, result);
    }

    fn disconnect(&self, id: ConnectionId, done: Completion<()>) {
        let result = self.with_connection(MockCall::Disconnect, id, |state| {
            state.connections.remove(&id);
            state.held_data.remove(&id);
        });
        self.complete(done, result);
    }

    fn set_paused(&self, id: ConnectionId, paused: bool, done: Completion<()>) {
        let result = self.with_connection(MockCall::SetPaused, id, |state| {
            if let Some(connection) = state.connections.get_mut(&id) {
                connection.paused = paused;
            }
            if paused {
                Vec::new()
            } else {
                state.held_data.remove(&id).unwrap_or_default()
            }
        });
        // Resuming flushes what arrived while paused, before the call completes.
        let result = result.map(|held| {
            for data in held {
                self.dispatch_data(id, data);
            }
        });
        self.complete(done, result);
    }

    fn send(&self, id: ConnectionId, data: NativeBuffer, done: Completion<SendInfo>) {
        let result = self.with_connection(MockCall::Send, id, |state| {
            if let Some(error) = state.next_send_error.take() {
                return SendInfo {
                    bytes_sent: 0,
                    error: Some(error),
                };
            }
            state.send_log.push((id, data.as_slice().to_vec()));
            SendInfo {
                bytes_sent: data.byte_length(),
                error: None,
            }
        });
        self.complete(done, result);
    }

    fn flush(&self, id: ConnectionId, done: Completion<()>) {
        let result = self.with_connection(MockCall::Flush, id, |state| {
            if let Some(connection) = state.connections.get_mut(&id) {
                connection.flush_count += 1;
            }
        });
        self.complete(done, result);
    }

    fn set_control_signals(&self, id: ConnectionId, signals: ControlSignals, done: Completion<()>) {
        let result = self.with_connection(MockCall::SetControlSignals, id, |state| {
            if let Some(connection) = state.connections.get_mut(&id) {
                if signals.dtr.is_some() {
                    connection.signals.dtr = signals.dtr;
                }
                if signals.rts.is_some() {
                    connection.signals.rts = signals.rts;
                }
            }
        });
        self.complete(done, result);
    }

    fn get_control_signals(&self, id: ConnectionId, done: Completion<SignalState>) {
        let result = self.with_connection(MockCall::GetControlSignals, id, |state| state.signal_state);
        self.complete(done, result);
    }

    fn on_receive(&self) -> &EventSource<ReceiveInfo> {
        &self.inner.receive
    }

    fn on_receive_error(&self) -> &EventSource<ReceiveErrorInfo> {
        &self.inner.receive_error
    }
}

impl std::fmt::Debug for MockPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlatform")
            .field("open_connections", &self.open_connections())
            .field("receive", &self.inner.receive)
            .field("receive_error", &self.inner.receive_error)
            .finish()
    }
}
