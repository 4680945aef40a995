//! Callback registries notified from the scheduler thread.
//!
//! Notifying snapshots the registered callbacks and calls them with no lock
//! held, so a callback may add or remove listeners. Each call runs inside
//! `catch_unwind`; a panicking callback is logged and skipped and the rest
//! still receive the event.

use super::types::{SessionMode, SessionProperties};
use crate::buffer::BufferProperties;
use crate::error::{panic_message, SessionError};
use crate::id::ListenerId;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Listeners for one kind of event. Callbacks must not block.
pub struct Listeners<T> {
    callbacks: Mutex<Vec<(ListenerId, Callback<T>)>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` is not registered here.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != id);
        callbacks.len() != before
    }

    /// Call every listener registered at the time of the call.
    ///
    /// Returns the messages of the callbacks that panicked.
    pub fn notify(&self, event: &T) -> Vec<String> {
        let snapshot: Vec<Callback<T>> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        let mut panics = Vec::new();
        for callback in snapshot {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                let message = panic_message(payload.as_ref());
                tracing::error!("Listener panicked: {}", message);
                panics.push(message);
            }
        }
        panics
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

/// Every listener kind a session exposes
#[derive(Debug, Default)]
pub struct SessionListeners {
    pub buffer_properties: Listeners<BufferProperties>,
    pub session_properties: Listeners<SessionProperties>,
    /// `(current, requested)` before each actual transition
    pub pre_mode_change: Listeners<(SessionMode, SessionMode)>,
    /// `(previous, new)` on each actual transition
    pub mode_change: Listeners<(SessionMode, SessionMode)>,
    pub tick_error: Listeners<SessionError>,
    /// Once, when the scheduler thread exits
    pub shutdown: Listeners<()>,
}

impl SessionListeners {
    /// Remove the listener with `id`, whatever its kind.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.buffer_properties.remove(id)
            || self.session_properties.remove(id)
            || self.pre_mode_change.remove(id)
            || self.mode_change.remove(id)
            || self.tick_error.remove(id)
            || self.shutdown.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_calls_every_listener() {
        let listeners: Listeners<u32> = Listeners::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = total.clone();
            listeners.add(move |v| {
                total.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }
        assert_eq!(listeners.len(), 3);
        assert!(listeners.notify(&2).is_empty());
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_empty_notify_is_noop() {
        let listeners: Listeners<SessionMode> = Listeners::default();
        assert!(listeners.is_empty());
        assert!(listeners.notify(&SessionMode::Running).is_empty());
    }

    #[test]
    fn test_remove_listener() {
        let listeners: Listeners<u32> = Listeners::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = listeners.add(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        listeners.notify(&1);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.notify(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_listener_can_register_listener_while_notified() {
        let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
        let added = Arc::new(AtomicUsize::new(0));

        let registry = Arc::downgrade(&listeners);
        let counter = added.clone();
        listeners.add(move |_| {
            if let Some(listeners) = registry.upgrade() {
                let counter = counter.clone();
                listeners.add(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        // The listener added during this call is not part of its snapshot
        listeners.notify(&0);
        assert_eq!(listeners.len(), 2);
        assert_eq!(added.load(Ordering::SeqCst), 0);

        listeners.notify(&0);
        assert_eq!(listeners.len(), 3);
        assert_eq!(added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_remove_itself() {
        let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let id = Arc::new(parking_lot::Mutex::new(None));

        let registry = Arc::downgrade(&listeners);
        let own_id = id.clone();
        let seen = calls.clone();
        let registered = listeners.add(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let (Some(listeners), Some(id)) = (registry.upgrade(), *own_id.lock()) {
                listeners.remove(id);
            }
        });
        *id.lock() = Some(registered);

        listeners.notify(&0);
        listeners.notify(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let listeners: Listeners<u32> = Listeners::new();
        let calls = Arc::new(AtomicUsize::new(0));
        listeners.add(|_| panic!("listener exploded"));
        let seen = calls.clone();
        listeners.add(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let panics = listeners.notify(&7);
        assert_eq!(panics, vec!["listener exploded".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Still registered and still isolated on the next event
        assert_eq!(listeners.notify(&8).len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_session_listeners_remove_any_kind() {
        let listeners = SessionListeners::default();
        let mode = listeners.mode_change.add(|_| {});
        let done = listeners.shutdown.add(|_| {});
        let pre = listeners.pre_mode_change.add(|_| {});

        assert!(listeners.remove(done));
        assert!(listeners.shutdown.is_empty());
        assert!(listeners.remove(pre));
        assert!(listeners.remove(mode));
        assert!(!listeners.remove(mode));
        assert!(listeners.mode_change.is_empty());
    }
}
