//! Turns one callback-style platform call into a future.

use crate::error::{BindingError, BindingResult};
use crate::platform::Completion;
use tokio::sync::oneshot;
use tracing::debug;

/// Issue a platform call and wait for its completion.
///
/// `issue` receives the completion closure and must hand it to the platform
/// as the call's final argument. The future resolves with the completion's
/// payload, or rejects with the platform error tagged with `op`.
///
/// # Example
/// ```
/// use serial_binding::binding::call;
/// use serial_binding::platform::{MockPlatform, SerialPlatform};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let platform = MockPlatform::new();
/// let devices = call("getDevices", |done| platform.get_devices(done)).await.unwrap();
/// assert!(devices.is_empty());
/// # });
/// ```
pub async fn call<T, F>(op: &'static str, issue: F) -> BindingResult<T>
where
    T: Send + 'static,
    F: FnOnce(Completion<T>),
{
    let (tx, rx) = oneshot::channel();
    debug!(op, "issuing platform call");
    issue(Box::new(move |result| {
        // The caller may have stopped waiting; nothing to do then.
        let _ = tx.send(result);
    }));

    match rx.await {
        Ok(Ok(payload)) => {
            debug!(op, "platform call completed");
            Ok(payload)
        }
        Ok(Err(source)) => {
            debug!(op, error = %source, "platform call rejected");
            Err(BindingError::platform(op, source))
        }
        Err(_) => Err(BindingError::CallbackDropped { op }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformError;
    use std::thread;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_with_payload() {
        let value = call("echo", |done: Completion<u32>| done(Ok(7))).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_rejects_with_platform_error() {
        let err = call("connect", |done: Completion<()>| {
            done(Err(PlatformError::message("Serial port busy")))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BindingError::Platform { op: "connect", .. }));
        assert_eq!(err.to_string(), "connect failed: Serial port busy");
    }

    #[tokio::test]
    async fn test_completion_from_another_thread() {
        let value = call("later", |done: Completion<&'static str>| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                done(Ok("late"));
            });
        })
        .await
        .unwrap();
        assert_eq!(value, "late");
    }

    #[tokio::test]
    async fn test_dropped_completion() {
        let err = call("lost", |done: Completion<()>| drop(done)).await.unwrap_err();
        assert!(matches!(err, BindingError::CallbackDropped { op: "lost" }));
    }
}
