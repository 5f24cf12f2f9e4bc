//! Document store boundary.
//!
//! # Responsibility
//! - Define the read/query/subscribe contract the aggregators depend on.
//! - Own the live-listener handle (`Subscription`) and its release rules.
//! - Ship an in-process store and a SQLite-backed local store.
//!
//! # Invariants
//! - A listener always receives the complete current result set, never a diff.
//! - A `Subscription` releases its listener exactly once, on `cancel` or drop.
//! - `get_by_id` reports absence as `Ok(None)`; callers decide whether that
//!   is an error.

mod listeners;
pub mod memory;
pub mod sqlite;

use crate::db::DbError;
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Callback invoked with the full current result set of a live query.
pub type SnapshotListener = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Store-layer error for reads, queries and subscription setup.
#[derive(Debug)]
pub enum StoreError {
    /// Caller is not allowed to read the collection.
    PermissionDenied(String),
    /// Transport or backend failure.
    Remote(String),
    Db(DbError),
    /// Stored body or query value cannot be represented.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::Remote(message) => write!(f, "remote store failure: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One schemaless document with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Returns one top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Comparison operator for a query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Field equals the value.
    Eq,
    /// Field is an array holding the value.
    ArrayContains,
}

/// One `(field, op, value)` filter; query predicates are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FieldOp,
    pub value: Value,
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FieldOp::Eq,
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FieldOp::ArrayContains,
            value: value.into(),
        }
    }

    /// Evaluates this predicate against one document.
    pub fn matches(&self, document: &Document) -> bool {
        let Some(field) = document.field(&self.field) else {
            return false;
        };
        match self.op {
            FieldOp::Eq => field == &self.value,
            FieldOp::ArrayContains => field
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
        }
    }
}

pub(crate) fn matches_all(predicates: &[Predicate], document: &Document) -> bool {
    predicates
        .iter()
        .all(|predicate| predicate.matches(document))
}

/// Owned handle for one live listener.
///
/// Dropping the handle releases the listener; `cancel` does the same
/// explicitly. The release hook runs at most once.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Whether the listener is still attached.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Detaches the listener now.
    pub fn cancel(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Read contract over a query-and-subscribe document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one document by id.
    async fn get_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Runs a one-shot query; all predicates must match.
    async fn query_where(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Document>>;

    /// Starts a live query.
    ///
    /// `listener` runs once with the current result set before this returns,
    /// then again with the full set after every change to `collection`.
    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn get_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        (**self).get_by_id(collection, id).await
    }

    async fn query_where(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Document>> {
        (**self).query_where(collection, predicates).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription> {
        (**self).subscribe(collection, predicates, listener).await
    }
}
