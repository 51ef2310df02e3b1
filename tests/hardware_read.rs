//! Receive test against a real device.
//!
//! Requires a sender transmitting `testing.expected_bytes` bytes to the port
//! named by `TEST_PORT_RX` (or `SERIAL_BINDING_TESTING_PORT_RX`).
//! Run with: cargo test --features hardware-tests -- --ignored

#![cfg(feature = "hardware-tests")]

use parking_lot::Mutex;
use serial_binding::binding::{BindingConfig, CallbackBinding, SerialBinding};
use serial_binding::config::ConfigLoader;
use serial_binding::platform::NativePlatform;
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
#[ignore]
async fn test_receive_expected_bytes() {
    let config = ConfigLoader::with_defaults().into_config();
    let Some(port) = config.testing.port_rx.clone() else {
        eprintln!("TEST_PORT_RX not set, skipping");
        return;
    };
    let expected = config.testing.expected_bytes;

    let received = Arc::new(Mutex::new(0usize));
    let done = Arc::new(Notify::new());
    let (binding_config, _disconnects) = {
        let received = Arc::clone(&received);
        let done = Arc::clone(&done);
        BindingConfig::new(move |bytes| {
            let mut total = received.lock();
            *total += bytes.len();
            if *total >= expected {
                done.notify_one();
            }
        })
    };
    let binding = CallbackBinding::new(Arc::new(NativePlatform::new()), binding_config);

    binding
        .open(&port, &config.serial.portable_options())
        .await
        .unwrap();
    let finished = tokio::time::timeout(config.testing.timeout(), done.notified()).await;
    binding.close().await.unwrap();

    let total = *received.lock();
    assert!(
        finished.is_ok(),
        "Receive data timeout: {} B of {} B received",
        total,
        expected
    );
    println!("Successfully received data length: {} B", total);
}
