//! Serial platform backed by the `serialport` crate.
//!
//! Each connection owns a blocking reader thread. The thread holds off reading
//! while the connection is paused, publishes inbound bytes as receive events,
//! and publishes a single fatal receive error when the device goes away.
//! Calls that touch the device run on tokio's blocking pool when a runtime is
//! available and complete from there; without a runtime they complete inline.
//! Each port has its own lock, so a slow write only stalls its own connection.

use super::error::{PlatformError, PlatformResult};
use super::events::EventSource;
use super::traits::{
    Completion, ConnectionId, ConnectionInfo, ControlSignals, DeviceInfo, ReceiveErrorInfo,
    ReceiveErrorKind, ReceiveInfo, SendError, SendInfo, SerialPlatform, SignalState,
};
use crate::buffer::NativeBuffer;
use crate::options::{NativeDataBits, NativeOptions, NativeParity, NativeStopBits};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Read timeout used when the caller asked for no receive timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a paused reader sleeps before checking again.
const PAUSED_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reader buffer size when the options leave it unset.
const DEFAULT_BUFFER_SIZE: usize = 4096;

type SharedPort = Arc<Mutex<Box<dyn serialport::SerialPort>>>;

struct NativeConnection {
    port: SharedPort,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

struct NativeInner {
    next_id: AtomicI32,
    connections: Mutex<HashMap<ConnectionId, NativeConnection>>,
    receive: EventSource<ReceiveInfo>,
    receive_error: EventSource<ReceiveErrorInfo>,
}

/// Serial platform talking to real devices.
#[derive(Clone)]
pub struct NativePlatform {
    inner: Arc<NativeInner>,
}

impl NativePlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NativeInner {
                next_id: AtomicI32::new(0),
                connections: Mutex::new(HashMap::new()),
                receive: EventSource::new(),
                receive_error: EventSource::new(),
            }),
        }
    }

    fn open_port(
        &self,
        path: &str,
        options: &NativeOptions,
    ) -> PlatformResult<Box<dyn serialport::SerialPort>> {
        let timeout = options
            .receive_timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
            .unwrap_or(POLL_INTERVAL);
        let flow_control = if options.cts_flow_control {
            serialport::FlowControl::Hardware
        } else {
            serialport::FlowControl::None
        };

        let port = serialport::new(path, options.bitrate)
            .data_bits(convert_data_bits(options.data_bits)?)
            .parity(convert_parity(options.parity_bit)?)
            .stop_bits(convert_stop_bits(options.stop_bits)?)
            .flow_control(flow_control)
            .timeout(timeout)
            .open()?;
        Ok(port)
    }

    fn port(&self, id: ConnectionId) -> PlatformResult<SharedPort> {
        self.inner
            .connections
            .lock()
            .get(&id)
            .map(|connection| Arc::clone(&connection.port))
            .ok_or(PlatformError::UnknownConnection(id))
    }

    /// Run `f` against the port for `id` off the async runtime.
    ///
    /// The connection map is only locked for the lookup.
    fn with_port<T, F>(&self, id: ConnectionId, done: Completion<T>, f: F)
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn serialport::SerialPort) -> PlatformResult<T> + Send + 'static,
    {
        let port = match self.port(id) {
            Ok(port) => port,
            Err(err) => return done(Err(err)),
        };
        run_blocking(done, move || {
            let mut port = port.lock();
            f(&mut **port)
        });
    }

    fn open_connection(
        &self,
        path: &str,
        options: &NativeOptions,
    ) -> PlatformResult<ConnectionInfo> {
        let port = self.open_port(path, options)?;
        let reader = port.try_clone()?;

        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let paused = Arc::new(AtomicBool::new(options.paused));
        let running = Arc::new(AtomicBool::new(true));
        let buffer_size = options
            .buffer_size
            .map(|size| size as usize)
            .unwrap_or(DEFAULT_BUFFER_SIZE);

        let worker = ReaderWorker {
            id,
            port: reader,
            inner: Arc::clone(&self.inner),
            paused: Arc::clone(&paused),
            running: Arc::clone(&running),
            buffer_size,
            report_timeouts: options.receive_timeout_ms.is_some(),
        };
        thread::Builder::new()
            .name(format!("serial-rx-{id}"))
            .spawn(move || worker.run())?;

        self.inner.connections.lock().insert(
            id,
            NativeConnection {
                port: Arc::new(Mutex::new(port)),
                paused,
                running,
            },
        );
        debug!(%id, path, bitrate = options.bitrate, "serial connection established");

        Ok(ConnectionInfo {
            connection_id: id,
            paused: options.paused,
            bitrate: options.bitrate,
            name: options.name.clone(),
        })
    }
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPlatform for NativePlatform {
    fn get_devices(&self, done: Completion<Vec<DeviceInfo>>) {
        run_blocking(done, || {
            let ports = serialport::available_ports()?;
            Ok(ports.into_iter().map(device_info).collect())
        });
    }

    fn connect(&self, path: &str, options: &NativeOptions, done: Completion<ConnectionInfo>) {
        let platform = self.clone();
        let path = path.to_string();
        let options = options.clone();
        run_blocking(done, move || platform.open_connection(&path, &options));
    }

    fn disconnect(&self, id: ConnectionId, done: Completion<()>) {
        let removed = self.inner.connections.lock().remove(&id);
        let result = match removed {
            Some(connection) => {
                connection.running.store(false, Ordering::Release);
                debug!(%id, "serial connection closed");
                Ok(())
            }
            None => Err(PlatformError::UnknownConnection(id)),
        };
        done(result);
    }

    fn set_paused(&self, id: ConnectionId, paused: bool, done: Completion<()>) {
        let result = match self.inner.connections.lock().get(&id) {
            Some(connection) => {
                connection.paused.store(paused, Ordering::Release);
                Ok(())
            }
            None => Err(PlatformError::UnknownConnection(id)),
        };
        done(result);
    }

    fn send(&self, id: ConnectionId, data: NativeBuffer, done: Completion<SendInfo>) {
        self.with_port(id, done, move |port| {
            let outcome = port.write_all(data.as_slice()).and_then(|()| port.flush());
            Ok(match outcome {
                Ok(()) => SendInfo {
                    bytes_sent: data.byte_length(),
                    error: None,
                },
                Err(err) => SendInfo {
                    bytes_sent: 0,
                    error: Some(send_error(&err)),
                },
            })
        });
    }

    fn flush(&self, id: ConnectionId, done: Completion<()>) {
        self.with_port(id, done, |port| {
            port.clear(serialport::ClearBuffer::All)?;
            Ok(())
        });
    }

    fn set_control_signals(&self, id: ConnectionId, signals: ControlSignals, done: Completion<()>) {
        self.with_port(id, done, move |port| {
            if let Some(dtr) = signals.dtr {
                port.write_data_terminal_ready(dtr)?;
            }
            if let Some(rts) = signals.rts {
                port.write_request_to_send(rts)?;
            }
            Ok(())
        });
    }

    fn get_control_signals(&self, id: ConnectionId, done: Completion<SignalState>) {
        self.with_port(id, done, |port| {
            Ok(SignalState {
                dcd: port.read_carrier_detect()?,
                cts: port.read_clear_to_send()?,
                ri: port.read_ring_indicator()?,
                dsr: port.read_data_set_ready()?,
            })
        });
    }

    fn on_receive(&self) -> &EventSource<ReceiveInfo> {
        &self.inner.receive
    }

    fn on_receive_error(&self) -> &EventSource<ReceiveErrorInfo> {
        &self.inner.receive_error
    }
}

impl std::fmt::Debug for NativePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePlatform")
            .field("connections", &self.inner.connections.lock().len())
            .finish()
    }
}

/// Hand `job` to the blocking pool and complete `done` from there.
fn run_blocking<T, F>(done: Completion<T>, job: F)
where
    T: Send + 'static,
    F: FnOnce() -> PlatformResult<T> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || done(job()));
        }
        Err(_) => done(job()),
    }
}

struct ReaderWorker {
    id: ConnectionId,
    port: Box<dyn serialport::SerialPort>,
    inner: Arc<NativeInner>,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    buffer_size: usize,
    report_timeouts: bool,
}

impl ReaderWorker {
    fn run(mut self) {
        let mut buffer = vec![0u8; self.buffer_size];
        while self.running.load(Ordering::Acquire) {
            if self.paused.load(Ordering::Acquire) {
                thread::sleep(PAUSED_POLL_INTERVAL);
                continue;
            }
            match self.port.read(&mut buffer) {
                Ok(0) => continue,
                Ok(n) => {
                    self.inner.receive.dispatch(&ReceiveInfo {
                        connection_id: self.id,
                        data: NativeBuffer::from(buffer[..n].to_vec()),
                    });
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    if self.report_timeouts {
                        self.publish(ReceiveErrorKind::Timeout);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    // Only report when the owner has not already disconnected.
                    if self.running.swap(false, Ordering::AcqRel) {
                        warn!(id = %self.id, error = %err, "serial reader stopped");
                        self.publish(receive_error(&err));
                    }
                    break;
                }
            }
        }
        debug!(id = %self.id, "serial reader exited");
    }

    fn publish(&self, error: ReceiveErrorKind) {
        self.inner.receive_error.dispatch(&ReceiveErrorInfo {
            connection_id: self.id,
            error,
        });
    }
}

fn device_info(port: serialport::SerialPortInfo) -> DeviceInfo {
    match port.port_type {
        serialport::SerialPortType::UsbPort(usb) => DeviceInfo {
            path: port.port_name,
            display_name: usb.product.or(usb.manufacturer),
            vendor_id: Some(usb.vid),
            product_id: Some(usb.pid),
        },
        _ => DeviceInfo {
            path: port.port_name,
            display_name: None,
            vendor_id: None,
            product_id: None,
        },
    }
}

fn receive_error(err: &io::Error) -> ReceiveErrorKind {
    match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => ReceiveErrorKind::Disconnected,
        io::ErrorKind::NotFound => ReceiveErrorKind::DeviceLost,
        _ => ReceiveErrorKind::SystemError,
    }
}

fn send_error(err: &io::Error) -> SendError {
    match err.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::NotFound => {
            SendError::Disconnected
        }
        io::ErrorKind::TimedOut => SendError::Timeout,
        io::ErrorKind::WouldBlock => SendError::Pending,
        _ => SendError::SystemError,
    }
}

fn convert_data_bits(bits: NativeDataBits) -> PlatformResult<serialport::DataBits> {
    match bits {
        NativeDataBits::Seven => Ok(serialport::DataBits::Seven),
        NativeDataBits::Eight => Ok(serialport::DataBits::Eight),
        NativeDataBits::Unmapped(5) => Ok(serialport::DataBits::Five),
        NativeDataBits::Unmapped(6) => Ok(serialport::DataBits::Six),
        NativeDataBits::Unmapped(other) => Err(PlatformError::invalid_option(format!(
            "data bits {other}"
        ))),
    }
}

fn convert_stop_bits(bits: NativeStopBits) -> PlatformResult<serialport::StopBits> {
    match bits {
        NativeStopBits::One => Ok(serialport::StopBits::One),
        NativeStopBits::Two => Ok(serialport::StopBits::Two),
        NativeStopBits::Unmapped(other) => Err(PlatformError::invalid_option(format!(
            "stop bits {other}"
        ))),
    }
}

fn convert_parity(parity: NativeParity) -> PlatformResult<serialport::Parity> {
    match parity {
        NativeParity::No => Ok(serialport::Parity::None),
        NativeParity::Odd => Ok(serialport::Parity::Odd),
        NativeParity::Even => Ok(serialport::Parity::Even),
        NativeParity::Mark | NativeParity::Space => Err(PlatformError::invalid_option(format!(
            "parity {parity:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{translate, PortableOptions};
    use std::sync::mpsc;

    #[test]
    fn test_option_conversion() {
        assert_eq!(
            convert_data_bits(NativeDataBits::Seven).unwrap(),
            serialport::DataBits::Seven
        );
        assert_eq!(
            convert_data_bits(NativeDataBits::Unmapped(6)).unwrap(),
            serialport::DataBits::Six
        );
        assert!(convert_data_bits(NativeDataBits::Unmapped(9)).is_err());
        assert_eq!(
            convert_stop_bits(NativeStopBits::Two).unwrap(),
            serialport::StopBits::Two
        );
        assert_eq!(
            convert_parity(NativeParity::No).unwrap(),
            serialport::Parity::None
        );
        assert!(convert_parity(NativeParity::Mark).is_err());
    }

    #[test]
    fn test_io_error_classification() {
        let lost = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(receive_error(&lost), ReceiveErrorKind::Disconnected);
        assert_eq!(send_error(&lost), SendError::Disconnected);

        let other = io::Error::other("boom");
        assert_eq!(receive_error(&other), ReceiveErrorKind::SystemError);
        assert_eq!(send_error(&other), SendError::SystemError);
    }

    #[test]
    fn test_connect_to_missing_device_fails() {
        let platform = NativePlatform::new();
        let (tx, rx) = mpsc::channel();
        platform.connect(
            "/dev/nonexistent_serial_binding_12345",
            &translate(&PortableOptions::default()),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        assert!(rx.recv().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_device_calls_complete_off_the_runtime_thread() {
        let platform = NativePlatform::new();
        let caller = thread::current().id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        platform.connect(
            "/dev/nonexistent_serial_binding_12345",
            &translate(&PortableOptions::default()),
            Box::new(move |result| {
                let _ = tx.send((thread::current().id(), result.is_err()));
            }),
        );

        let (completed_on, failed) = rx.await.unwrap();
        assert!(failed);
        assert_ne!(completed_on, caller);
    }

    #[tokio::test]
    async fn test_unknown_connection_completes_inline() {
        let platform = NativePlatform::new();
        let (tx, rx) = mpsc::channel();
        platform.send(
            ConnectionId(3),
            NativeBuffer::from(b"AT".to_vec()),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(PlatformError::UnknownConnection(ConnectionId(3)))
        ));
    }

    #[test]
    fn test_unknown_connection() {
        let platform = NativePlatform::new();
        let (tx, rx) = mpsc::channel();
        platform.flush(
            ConnectionId(42),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        assert!(matches!(
            rx.recv().unwrap(),
            Err(PlatformError::UnknownConnection(ConnectionId(42)))
        ));
    }
}
