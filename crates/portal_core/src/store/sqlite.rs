//! SQLite-backed local document store.
//!
//! # Responsibility
//! - Persist schemaless JSON documents per collection.
//! - Translate predicates into `json_extract`/`json_each` filters.
//! - Notify in-process live listeners after local writes.
//!
//! # Invariants
//! - Bodies are valid JSON (enforced by a table CHECK).
//! - Results are ordered by ascending document id, matching the memory store.
//! - Predicates compare JSON types as well as values, so `true` never matches
//!   a stored `1`.
//! - Deliveries are serialized under one delivery lock; the connection lock is
//!   released before any listener runs.
//! - A committed write is reported as `Ok` even if a listener refresh fails.

use super::listeners::ListenerRegistry;
use super::{
    Document, DocumentStore, FieldOp, Predicate, SnapshotListener, StoreError, StoreResult,
    Subscription,
};
use crate::db::{open_db, open_db_in_memory};
use async_trait::async_trait;
use log::{info, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Local document store over one SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    listeners: ListenerRegistry,
    delivery: Mutex<()>,
}

impl SqliteDocumentStore {
    /// Opens (and migrates) a store file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            listeners: ListenerRegistry::default(),
            delivery: Mutex::new(()),
        }
    }

    /// Inserts or replaces one document and notifies listeners.
    pub fn put(&self, collection: &str, id: &str, data: &Value) -> StoreResult<()> {
        if !data.is_object() {
            return Err(StoreError::InvalidData(format!(
                "document `{collection}/{id}` body must be a JSON object"
            )));
        }
        self.lock().execute(
            "INSERT INTO documents (collection, id, body, updated_at)
             VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000))
             ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at;",
            params![collection, id, data.to_string()],
        )?;
        self.notify(collection);
        Ok(())
    }

    /// Inserts a document under a generated id.
    pub fn add(&self, collection: &str, data: &Value) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.put(collection, &id, data)?;
        Ok(id)
    }

    /// Removes one document; returns whether it existed.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let changed = self.lock().execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
            params![collection, id],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        self.notify(collection);
        Ok(true)
    }

    /// Loads `{ "<collection>": { "<id>": { ...body } } }` fixtures.
    ///
    /// Returns the number of documents written.
    pub fn import(&self, fixture: &Value) -> StoreResult<usize> {
        let collections = fixture.as_object().ok_or_else(|| {
            StoreError::InvalidData("fixture root must be a JSON object".to_string())
        })?;

        let mut written = 0;
        for (collection, documents) in collections {
            let documents = documents.as_object().ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "fixture collection `{collection}` must map ids to documents"
                ))
            })?;
            for (id, body) in documents {
                self.put(collection, id, body)?;
                written += 1;
            }
        }

        info!(
            "event=store_import module=store status=ok collections={} documents={}",
            collections.len(),
            written
        );
        Ok(written)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch_one(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let body = self
            .lock()
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2;",
                params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        body.map(|text| parse_document(id.to_string(), &text))
            .transpose()
    }

    fn run_query(&self, collection: &str, predicates: &[Predicate]) -> StoreResult<Vec<Document>> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        let mut bind_values = vec![SqlValue::Text(collection.to_string())];

        for predicate in predicates {
            let path = json_path(&predicate.field)?;
            match predicate.op {
                FieldOp::Eq if predicate.value.is_null() => {
                    sql.push_str(" AND json_type(body, ?) = 'null'");
                    bind_values.push(SqlValue::Text(path));
                }
                FieldOp::Eq => {
                    let types = json_types(&predicate.value)?;
                    sql.push_str(&format!(
                        " AND json_type(body, ?) IN {types} AND json_extract(body, ?) = ?"
                    ));
                    bind_values.push(SqlValue::Text(path.clone()));
                    bind_values.push(SqlValue::Text(path));
                    bind_values.push(sql_scalar(&predicate.value)?);
                }
                FieldOp::ArrayContains => {
                    let types = json_types(&predicate.value)?;
                    sql.push_str(&format!(
                        " AND json_type(body, ?) = 'array'
                          AND EXISTS (SELECT 1 FROM json_each(body, ?)
                                      WHERE json_each.type IN {types} AND json_each.value = ?)"
                    ));
                    bind_values.push(SqlValue::Text(path.clone()));
                    bind_values.push(SqlValue::Text(path));
                    bind_values.push(sql_scalar(&predicate.value)?);
                }
            }
        }
        sql.push_str(" ORDER BY id ASC");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("id")?;
            let body: String = row.get("body")?;
            documents.push(parse_document(id, &body)?);
        }
        Ok(documents)
    }

    fn notify(&self, collection: &str) {
        let _delivery = self.lock_delivery();
        for (predicates, listener) in self.listeners.listeners_for(collection) {
            match self.run_query(collection, &predicates) {
                Ok(snapshot) => listener(snapshot),
                Err(err) => warn!(
                    "event=store_notify module=store status=error collection={} error={}",
                    collection, err
                ),
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.fetch_one(collection, id)
    }

    async fn query_where(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Document>> {
        self.run_query(collection, predicates)
    }

    async fn subscribe(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription> {
        let _delivery = self.lock_delivery();
        let initial = self.run_query(collection, &predicates)?;
        let subscription = self
            .listeners
            .register(collection, predicates, listener.clone());
        listener(initial);
        Ok(subscription)
    }
}

fn parse_document(id: String, body: &str) -> StoreResult<Document> {
    let data = serde_json::from_str(body).map_err(|err| {
        StoreError::InvalidData(format!("document `{id}` body is not valid JSON: {err}"))
    })?;
    Ok(Document { id, data })
}

fn json_path(field: &str) -> StoreResult<String> {
    if field.is_empty() || field.contains('"') {
        return Err(StoreError::InvalidData(format!(
            "unsupported field name `{field}`"
        )));
    }
    Ok(format!("$.\"{field}\""))
}

/// SQLite `json_type` names that may hold a filter value of this JSON type.
fn json_types(value: &Value) -> StoreResult<&'static str> {
    match value {
        Value::Bool(_) => Ok("('true', 'false')"),
        Value::Number(_) => Ok("('integer', 'real')"),
        Value::String(_) => Ok("('text')"),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidData(format!(
            "unsupported filter value `{value}`"
        ))),
    }
}

fn sql_scalar(value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Ok(SqlValue::Integer(integer)),
            None => number.as_f64().map(SqlValue::Real).ok_or_else(|| {
                StoreError::InvalidData(format!("unsupported numeric filter `{number}`"))
            }),
        },
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidData(format!(
            "unsupported filter value `{value}`"
        ))),
    }
}
