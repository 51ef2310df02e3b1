//! Listener registry for platform events.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`EventSource::add_listener`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// A list of listeners that a platform dispatches events to.
pub struct EventSource<E> {
    next_token: AtomicU64,
    listeners: Mutex<Vec<(ListenerToken, Listener<E>)>>,
}

impl<E> EventSource<E> {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerToken
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((token, Arc::new(listener)));
        token
    }

    /// Returns false if the listener was already removed.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        listeners.len() != before
    }

    pub fn has_listener(&self, token: ListenerToken) -> bool {
        self.listeners.lock().iter().any(|(t, _)| *t == token)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Invoke every listener registered at the time of the call.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// add or remove listeners. Returns how many listeners ran.
    pub fn dispatch(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

impl<E> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
