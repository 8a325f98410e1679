//! Multi-subscriber publish/subscribe with explicit add/remove.

use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn take(counter: &AtomicU64) -> Self {
        SubscriptionId(counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Subscribers to a single event stream. Ids are unique per registry.
pub struct Subscribers<T> {
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::take(&self.next_id);
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Invoke every subscriber. Callbacks run outside the lock, so they may
    /// subscribe, unsubscribe or publish again.
    pub fn publish(&self, event: &T) {
        let callbacks: Vec<Callback<T>> =
            self.entries.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Subscribers addressed by key (e.g. a snapshot field name).
pub struct KeyedSubscribers<K, T> {
    entries: Mutex<Vec<(SubscriptionId, K, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<K: Copy + Eq + Hash, T> Default for KeyedSubscribers<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash, T> KeyedSubscribers<K, T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, key: K, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::take(&self.next_id);
        self.entries.lock().push((id, key, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _, _)| *existing != id);
        entries.len() != before
    }

    pub fn publish(&self, key: K, event: &T) {
        let callbacks: Vec<Callback<T>> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == key)
            .map(|(_, _, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn count(&self, key: K) -> usize {
        self.entries.lock().iter().filter(|(_, k, _)| *k == key).count()
    }
}
