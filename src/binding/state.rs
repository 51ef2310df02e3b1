//! Connection state owned by a binding instance.

use crate::platform::{ConnectionId, ListenerToken};

/// Where a binding instance stands with respect to its one platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    /// The connection was closed; `previous` is the id it had.
    Released { previous: ConnectionId },
    Open {
        id: ConnectionId,
        /// The read listener attached for this connection.
        reader: ListenerToken,
    },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The live connection id, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Self::Open { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether `id` is, or was most recently, this instance's connection.
    pub fn owns(&self, id: ConnectionId) -> bool {
        match self {
            Self::Closed => false,
            Self::Released { previous } => *previous == id,
            Self::Open { id: current, .. } => *current == id,
        }
    }

    /// Move to the closed state and hand back what the open state held.
    ///
    /// With `only` set, nothing happens unless that id is the live one. Calling
    /// this on a closed state returns `None`, so racing releases are harmless.
    pub fn release(&mut self, only: Option<ConnectionId>) -> Option<(ConnectionId, ListenerToken)> {
        match *self {
            Self::Open { id, reader } if only.map_or(true, |wanted| wanted == id) => {
                *self = Self::Released { previous: id };
                Some((id, reader))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventSource;

    fn token() -> ListenerToken {
        EventSource::<()>::new().add_listener(|_| {})
    }

    #[test]
    fn test_default_is_closed() {
        let state = ConnectionState::default();
        assert!(!state.is_open());
        assert_eq!(state.connection_id(), None);
        assert!(!state.owns(ConnectionId(0)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let reader = token();
        let mut state = ConnectionState::Open {
            id: ConnectionId(3),
            reader,
        };
        assert!(state.owns(ConnectionId(3)));

        assert_eq!(state.release(None), Some((ConnectionId(3), reader)));
        assert_eq!(
            state,
            ConnectionState::Released {
                previous: ConnectionId(3)
            }
        );
        assert!(state.owns(ConnectionId(3)));
        assert!(!state.is_open());
        assert_eq!(state.release(None), None);
    }

    #[test]
    fn test_release_only_matching_id() {
        let mut state = ConnectionState::Open {
            id: ConnectionId(1),
            reader: token(),
        };
        assert_eq!(state.release(Some(ConnectionId(0))), None);
        assert!(state.is_open());
        assert!(state.release(Some(ConnectionId(1))).is_some());
    }
}
