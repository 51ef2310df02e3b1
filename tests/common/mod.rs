//! Shared test utilities for serial binding tests.
//!
//! Builds bindings over the mock platform with a sink that collects every
//! chunk handed to the data callback.

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_binding::binding::{BindingConfig, CallbackBinding, DisconnectReceiver, SerialBinding};
use serial_binding::options::PortableOptions;
use serial_binding::platform::MockPlatform;
use std::sync::Arc;

/// Chunks delivered to a binding's data callback, in order.
#[derive(Clone, Default)]
pub struct DataSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl DataSink {
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().clone()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.lock().iter().map(Vec::len).sum()
    }
}

/// Everything a test needs to drive one binding.
pub struct Harness {
    pub platform: MockPlatform,
    pub binding: CallbackBinding,
    pub disconnects: DisconnectReceiver,
    pub sink: DataSink,
}

/// Create a closed binding over a fresh mock platform.
pub fn harness() -> Harness {
    harness_on(MockPlatform::new())
}

/// Create a closed binding over an existing mock platform.
pub fn harness_on(platform: MockPlatform) -> Harness {
    let sink = DataSink::default();
    let chunks = Arc::clone(&sink.chunks);
    let (config, disconnects) = BindingConfig::new(move |bytes| chunks.lock().push(bytes));
    let binding = CallbackBinding::new(Arc::new(platform.clone()), config);
    Harness {
        platform,
        binding,
        disconnects,
        sink,
    }
}

/// Create a binding and open it on "MOCK0" with default options.
pub async fn open_harness() -> Harness {
    let h = harness();
    h.binding
        .open("MOCK0", &PortableOptions::default())
        .await
        .expect("mock open should succeed");
    h
}
