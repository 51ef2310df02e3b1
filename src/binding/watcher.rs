//! Standing receive-error listener that escalates link loss.

use super::Shared;
use crate::error::BindingError;
use crate::platform::{ConnectionId, ListenerToken, ReceiveErrorInfo, ReceiveErrorKind};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Sent on the disconnect channel when the link to the device is lost.
#[derive(Debug)]
pub struct DisconnectEvent {
    pub connection_id: ConnectionId,
    pub error: BindingError,
}

/// What the watcher did with one receive error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The event names a connection this instance never owned.
    Foreign,
    /// A benign cause, dropped silently.
    Ignored,
    /// A non-fatal cause, logged only.
    Reported,
    /// Link loss: the owner was notified and, if the connection was still
    /// open, it was closed.
    Escalated { forced_close: bool },
}

/// Register the watcher for the lifetime of a binding instance.
pub(super) fn install(shared: &Arc<Shared>) -> ListenerToken {
    let weak = Arc::downgrade(shared);
    shared
        .platform
        .on_receive_error()
        .add_listener(move |info: &ReceiveErrorInfo| {
            if let Some(shared) = weak.upgrade() {
                handle_receive_error(&shared, info);
            }
        })
}

/// Classify one receive error and escalate link loss.
///
/// Only the live connection, or the one most recently released, is acted on.
/// Link loss on ids this instance never owned is treated as `Foreign` and not
/// reported, since several bindings may share one platform.
pub(super) fn handle_receive_error(shared: &Shared, info: &ReceiveErrorInfo) -> WatchOutcome {
    let id = info.connection_id;
    if !shared.state.lock().owns(id) {
        trace!(%id, cause = %info.error, "receive error for a foreign connection");
        return WatchOutcome::Foreign;
    }

    match &info.error {
        ReceiveErrorKind::Timeout => WatchOutcome::Ignored,
        cause if cause.is_link_loss() => {
            error!(%id, %cause, "serial link lost");
            let event = DisconnectEvent {
                connection_id: id,
                error: BindingError::Disconnected {
                    cause: cause.clone(),
                },
            };
            if shared.notifier.send(event).is_err() {
                debug!(%id, "disconnect receiver is gone");
            }
            let forced_close = shared.force_close(id);
            WatchOutcome::Escalated { forced_close }
        }
        cause => {
            warn!(%id, %cause, "receive error");
            WatchOutcome::Reported
        }
    }
}
