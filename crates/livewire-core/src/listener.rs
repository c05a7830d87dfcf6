//! Change listeners.
//!
//! Listeners are invoked synchronously, with no arguments, after every change
//! to the store. They must not mutate the store or drop their own
//! [`Subscription`](crate::Subscription) from inside the callback; reading it
//! is fine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

/// A change listener.
pub trait Listener: Send + Sync {
    /// Called once per change.
    fn on_change(&self);
}

impl<F> Listener for F
where
    F: Fn() + Send + Sync,
{
    fn on_change(&self) {
        (self)();
    }
}

/// Identifier handed out for each registered listener.
pub type ListenerId = u64;

/// The set of registered listeners, in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a listener, returning its identifier.
    pub(crate) fn insert(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Remove a listener.
    ///
    /// Returns `true` if the listener was registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke every listener once.
    ///
    /// The set is copied first so a listener may subscribe others from inside
    /// its callback.
    pub(crate) fn notify(&self) -> usize {
        let listeners: Vec<Arc<dyn Listener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(listeners = listeners.len(), "Notifying listeners");
        for listener in &listeners {
            listener.on_change();
        }
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Arc<AtomicUsize>, Arc<dyn Listener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let listener: Arc<dyn Listener> = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_listener_set_notify() {
        let set = ListenerSet::new();
        let (a, listener_a) = counting();
        let (b, listener_b) = counting();

        set.insert(listener_a);
        set.insert(listener_b);

        assert_eq!(set.notify(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_set_remove() {
        let set = ListenerSet::new();
        let (count, listener) = counting();

        let id = set.insert(listener);
        assert_eq!(set.len(), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert_eq!(set.len(), 0);

        assert_eq!(set.notify(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let set = ListenerSet::new();
        let (_, first) = counting();
        let (_, second) = counting();

        assert_ne!(set.insert(first), set.insert(second));
    }
}
