//! Link-loss detection and forced close.

mod common;

use common::open_harness;
use serial_binding::binding::{ConnectionState, SerialBinding};
use serial_binding::error::BindingError;
use serial_binding::options::PortableOptions;
use serial_binding::platform::{ConnectionId, MockCall, ReceiveErrorKind, SerialPlatform};
use std::time::Duration;

#[tokio::test]
async fn test_link_loss_notifies_and_closes() {
    let mut h = open_harness().await;
    let id = h.binding.connection_id().unwrap();

    assert_eq!(h.platform.emit_error(id, ReceiveErrorKind::DeviceLost), 1);

    let event = tokio::time::timeout(Duration::from_secs(1), h.disconnects.recv())
        .await
        .expect("disconnect event")
        .expect("channel open");
    assert_eq!(event.connection_id, id);
    assert!(event.error.is_link_loss());
    assert!(matches!(
        event.error,
        BindingError::Disconnected {
            cause: ReceiveErrorKind::DeviceLost
        }
    ));

    assert!(!h.binding.is_open());
    assert_eq!(h.binding.state(), ConnectionState::Released { previous: id });
    assert_eq!(h.platform.on_receive().listener_count(), 0);
    // The fire-and-forget disconnect reached the platform.
    assert_eq!(h.platform.open_connections(), 0);
    assert!(h.disconnects.try_recv().is_err());
}

#[tokio::test]
async fn test_every_link_loss_cause_escalates() {
    for cause in [
        ReceiveErrorKind::Disconnected,
        ReceiveErrorKind::DeviceLost,
        ReceiveErrorKind::SystemError,
    ] {
        let mut h = open_harness().await;
        let id = h.binding.connection_id().unwrap();

        h.platform.emit_error(id, cause.clone());

        let event = h.disconnects.try_recv().expect("disconnect event");
        assert_eq!(event.error.to_string(), format!("Disconnected: {cause}"));
        assert!(!h.binding.is_open());
    }
}

#[tokio::test]
async fn test_data_after_link_loss_is_dropped() {
    let h = open_harness().await;
    let id = h.binding.connection_id().unwrap();

    h.platform.emit_data(id, b"before");
    h.platform.emit_error(id, ReceiveErrorKind::Disconnected);
    h.platform.emit_data(id, b"after");

    assert_eq!(h.sink.chunks(), vec![b"before".to_vec()]);
}

#[tokio::test]
async fn test_timeout_and_line_errors_keep_connection() {
    let mut h = open_harness().await;
    let id = h.binding.connection_id().unwrap();

    for cause in [
        ReceiveErrorKind::Timeout,
        ReceiveErrorKind::Break,
        ReceiveErrorKind::FrameError,
        ReceiveErrorKind::Overrun,
        ReceiveErrorKind::BufferOverflow,
        ReceiveErrorKind::ParityError,
        ReceiveErrorKind::from("something_new"),
    ] {
        h.platform.emit_error(id, cause);
    }

    assert!(h.binding.is_open());
    assert!(h.disconnects.try_recv().is_err());
    h.binding.write(b"still here").await.unwrap();
}

#[tokio::test]
async fn test_errors_for_other_connections_are_ignored() {
    let mut h = open_harness().await;
    let id = h.binding.connection_id().unwrap();

    h.platform
        .emit_error(ConnectionId(id.0 + 10), ReceiveErrorKind::DeviceLost);

    assert!(h.binding.is_open());
    assert!(h.disconnects.try_recv().is_err());
}

#[tokio::test]
async fn test_caller_can_reopen_after_link_loss() {
    let h = open_harness().await;
    let id = h.binding.connection_id().unwrap();
    h.platform.emit_error(id, ReceiveErrorKind::DeviceLost);

    assert!(matches!(
        h.binding.close().await,
        Err(BindingError::NotOpen)
    ));

    h.binding
        .open("MOCK0", &PortableOptions::default())
        .await
        .unwrap();
    let reopened = h.binding.connection_id().unwrap();
    assert_ne!(reopened, id);

    // A late error for the old connection does not touch the new one.
    h.platform.emit_error(id, ReceiveErrorKind::DeviceLost);
    assert!(h.binding.is_open());
}

#[tokio::test]
async fn test_forced_close_racing_caller_close() {
    let h = open_harness().await;
    let id = h.binding.connection_id().unwrap();
    h.platform.hold_completions(true);
    h.platform.fail_next(MockCall::Disconnect, "already gone");

    let (closed, released) = tokio::join!(h.binding.close(), async {
        tokio::task::yield_now().await;
        // The caller's disconnect is in flight; now the link drops.
        h.platform.emit_error(id, ReceiveErrorKind::DeviceLost);
        h.platform.release_completions()
    });

    // Both the caller's and the forced disconnect were queued.
    assert_eq!(released, 2);
    // The forced close already released the connection, so the caller's
    // failed disconnect is not reported.
    assert!(closed.is_ok());
    assert!(!h.binding.is_open());
    assert_eq!(h.platform.on_receive().listener_count(), 0);
    assert_eq!(h.platform.open_connections(), 0);
}

#[tokio::test]
async fn test_dropping_open_binding_disconnects() {
    let h = open_harness().await;
    let platform = h.platform.clone();
    drop(h);

    assert_eq!(platform.open_connections(), 0);
    assert_eq!(platform.on_receive().listener_count(), 0);
    assert_eq!(platform.on_receive_error().listener_count(), 0);
}
