//! Registry of image display sets with "display sets added" notifications

use crate::binding::{lock, read, write};
use crate::types::ImageDisplaySet;
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

type Listener = Arc<dyn Fn(&[ImageDisplaySet]) + Send + Sync>;

#[derive(Default)]
struct Registry {
    active: RwLock<Vec<ImageDisplaySet>>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

/// Live collection of image display sets
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct DisplaySetService {
    registry: Arc<Registry>,
}

impl DisplaySetService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the display sets added so far
    pub fn active_display_sets(&self) -> Vec<ImageDisplaySet> {
        read(&self.registry.active).clone()
    }

    /// Adds display sets and notifies every subscriber
    ///
    /// Listeners run after the registry locks are released, so a listener
    /// may query the registry or subscribe again.
    pub fn add_display_sets(&self, display_sets: Vec<ImageDisplaySet>) {
        if display_sets.is_empty() {
            return;
        }

        write(&self.registry.active).extend(display_sets.iter().cloned());

        let listeners: Vec<Listener> = lock(&self.registry.listeners).values().cloned().collect();
        debug!(
            "Announcing {} display sets to {} listeners",
            display_sets.len(),
            listeners.len()
        );
        for listener in listeners {
            listener(&display_sets);
        }
    }

    /// Registers a listener for display sets added from now on
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe_display_sets_added<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[ImageDisplaySet]) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.registry.listeners).insert(id, Arc::new(listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.registry.listeners).len()
    }
}

impl fmt::Debug for DisplaySetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplaySetService")
            .field("active", &read(&self.registry.active).len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener; unregisters it when dropped
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Unregisters the listener now
    pub fn unsubscribe(self) {}

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry.listeners).remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_add_and_list() {
        let service = DisplaySetService::new();
        service.add_display_sets(vec![ImageDisplaySet::new("a"), ImageDisplaySet::new("b")]);

        let uids: Vec<_> = service
            .active_display_sets()
            .into_iter()
            .map(|ds| ds.display_set_instance_uid)
            .collect();
        assert_eq!(uids, vec!["a", "b"]);
    }

    #[test]
    fn test_listener_receives_added_sets_until_dropped() {
        let service = DisplaySetService::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let subscription = service.subscribe_display_sets_added(move |added| {
            counter.fetch_add(added.len(), Ordering::SeqCst);
        });
        assert_eq!(service.listener_count(), 1);

        service.add_display_sets(vec![ImageDisplaySet::new("a"), ImageDisplaySet::new("b")]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        assert_eq!(service.listener_count(), 0);

        service.add_display_sets(vec![ImageDisplaySet::new("c")]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_reenter_registry() {
        let service = DisplaySetService::new();
        let handle = service.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_in_listener = Arc::clone(&observed);

        let _subscription = service.subscribe_display_sets_added(move |_| {
            observed_in_listener.store(handle.active_display_sets().len(), Ordering::SeqCst);
        });
        service.add_display_sets(vec![ImageDisplaySet::new("a")]);

        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_registry() {
        let service = DisplaySetService::new();
        let subscription = service.subscribe_display_sets_added(|_| {});
        drop(service);
        drop(subscription);
    }
}
