//! In-process listener bookkeeping shared by the local store backends.

use super::{Predicate, SnapshotListener, Subscription};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    entries: BTreeMap<u64, ListenerEntry>,
}

struct ListenerEntry {
    collection: String,
    predicates: Vec<Predicate>,
    listener: SnapshotListener,
}

/// Registered live queries keyed by registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    /// Adds one listener and returns the handle that removes it.
    pub(crate) fn register(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        listener: SnapshotListener,
    ) -> Subscription {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.insert(
                id,
                ListenerEntry {
                    collection: collection.to_string(),
                    predicates,
                    listener,
                },
            );
            id
        };

        let registry: Weak<Mutex<RegistryInner>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = registry.upgrade() {
                lock(&inner).entries.remove(&id);
            }
        })
    }

    /// Snapshot of listeners on `collection`, in registration order.
    ///
    /// Returned outside the lock so callbacks may re-enter the store.
    pub(crate) fn listeners_for(&self, collection: &str) -> Vec<(Vec<Predicate>, SnapshotListener)> {
        lock(&self.inner)
            .entries
            .values()
            .filter(|entry| entry.collection == collection)
            .map(|entry| (entry.predicates.clone(), Arc::clone(&entry.listener)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
