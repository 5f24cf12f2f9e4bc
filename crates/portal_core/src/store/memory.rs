//! In-process document store.
//!
//! # Responsibility
//! - Serve as the store double for aggregator tests and embedded use.
//! - Push full result sets to live listeners after every write.
//!
//! # Invariants
//! - Query and snapshot results are ordered by ascending document id.
//! - Deliveries are serialized: each result set is computed and handed over
//!   under one delivery lock, so no listener sees an older set after a newer
//!   one. Listeners must not write back into the store.

use super::listeners::ListenerRegistry;
use super::{
    matches_all, Document, DocumentStore, Predicate, SnapshotListener, StoreError, StoreResult,
    Subscription,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Thread-safe in-memory store with failure and latency injection.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    denied: Mutex<BTreeSet<String>>,
    latency: Mutex<BTreeMap<String, Duration>>,
    listeners: ListenerRegistry,
    delivery: Mutex<()>,
    read_calls: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one document and notifies listeners.
    pub fn put(&self, collection: &str, id: &str, data: Value) {
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        self.notify(collection);
    }

    /// Removes one document; returns whether it existed.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let removed = lock(&self.collections)
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some();
        if removed {
            self.notify(collection);
        }
        removed
    }

    /// Delivers `documents` verbatim to every listener on `collection`.
    ///
    /// Simulates the remote pushing a result set without going through
    /// local writes; predicates are not re-applied.
    pub fn emit(&self, collection: &str, documents: Vec<Document>) {
        let _delivery = lock(&self.delivery);
        for (_, listener) in self.listeners.listeners_for(collection) {
            listener(documents.clone());
        }
    }

    /// Makes reads and subscriptions on `collection` fail with `PermissionDenied`.
    pub fn deny(&self, collection: &str) {
        lock(&self.denied).insert(collection.to_string());
    }

    pub fn allow(&self, collection: &str) {
        lock(&self.denied).remove(collection);
    }

    /// Delays every read on `collection` by `delay`.
    pub fn set_latency(&self, collection: &str, delay: Duration) {
        lock(&self.latency).insert(collection.to_string(), delay);
    }

    /// Number of `get_by_id` and `query_where` calls served so far.
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of attached live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn check_access(&self, collection: &str) -> StoreResult<()> {
        if lock(&self.denied).contains(collection) {
            return Err(StoreError::PermissionDenied(format!(
                "missing or insufficient permissions for `{collection}`"
            )));
        }
        Ok(())
    }

    async fn simulate_latency(&self, collection: &str) {
        let delay = lock(&self.latency).get(collection).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn snapshot(&self, collection: &str, predicates: &[Predicate]) -> Vec<Document> {
        lock(&self.collections)
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .filter(|document| matches_all(predicates, document))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self, collection: &str) {
        let _delivery = lock(&self.delivery);
        for (predicates, listener) in self.listeners.listeners_for(collection) {
            listener(self.snapshot(collection, &predicates));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(collection).await;
        self.check_access(collection)?;
        Ok(lock(&self.collections)
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn query_where(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Document>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(collection).await;
        self.check_access(collection)?;
        Ok(self.snapshot(collection, predicates))
    }

    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription> {
        self.check_access(collection)?;
        let _delivery = lock(&self.delivery);
        let initial = self.snapshot(collection, &predicates);
        let subscription = self
            .listeners
            .register(collection, predicates, listener.clone());
        listener(initial);
        Ok(subscription)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::MemoryDocumentStore;
    use crate::store::{Document, DocumentStore, Predicate, StoreError};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn query_filters_and_orders_by_id() {
        let store = MemoryDocumentStore::new();
        store.put("colleges", "b", json!({ "domain": "x.edu", "cname": "B" }));
        store.put("colleges", "a", json!({ "domain": "x.edu", "cname": "A" }));
        store.put("colleges", "c", json!({ "domain": "y.edu", "cname": "C" }));

        let docs = store
            .query_where("colleges", &[Predicate::equals("domain", "x.edu")])
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.read_calls(), 1);
    }

    #[tokio::test]
    async fn denied_collection_fails_reads_and_subscribe() {
        let store = MemoryDocumentStore::new();
        store.deny("students");

        let err = store.get_by_id("students", "s1").await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let result = store
            .subscribe("students", Vec::new(), Arc::new(|_docs: Vec<Document>| {}))
            .await;
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_and_changed_sets() {
        let store = MemoryDocumentStore::new();
        store.put("students", "s1", json!({ "verified": true }));
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&seen);

        let subscription = store
            .subscribe(
                "students",
                vec![Predicate::equals("verified", true)],
                Arc::new(move |docs: Vec<Document>| sink.lock().unwrap().push(docs.len())),
            )
            .await
            .unwrap();

        store.put("students", "s2", json!({ "verified": true }));
        store.put("students", "s3", json!({ "verified": false }));
        assert!(store.delete("students", "s1"));
        subscription.cancel();
        store.put("students", "s4", json!({ "verified": true }));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2, 1]);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_never_deliver_an_older_set_last() {
        let store = Arc::new(MemoryDocumentStore::new());
        let writer_store = Arc::clone(&store);
        let writer = std::thread::spawn(move || {
            for index in 0..200 {
                writer_store.put("students", &format!("s{index:03}"), json!({ "n": index }));
            }
        });

        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let _subscription = store
            .subscribe(
                "students",
                Vec::new(),
                Arc::new(move |docs: Vec<Document>| sink.lock().unwrap().push(docs.len())),
            )
            .await
            .unwrap();
        writer.join().unwrap();
        store.put("students", "s999", json!({ "n": 999 }));

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&201));
    }
}
