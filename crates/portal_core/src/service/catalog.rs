//! College lookups shared by both aggregators.
//!
//! # Invariants
//! - "First match wins": when several colleges share a domain, only the
//!   first document in store order is used.
//! - Zero matches is `Ok(None)`, never an error.

use super::error::AggregateError;
use crate::model::{College, Scholarship};
use crate::store::{DocumentStore, Predicate};
use log::debug;

pub(crate) const STUDENTS: &str = "students";
pub(crate) const COLLEGES: &str = "colleges";

/// Returns the first college registered under `domain`.
pub(crate) async fn first_college<S>(
    store: &S,
    domain: &str,
) -> Result<Option<College>, AggregateError>
where
    S: DocumentStore + ?Sized,
{
    let documents = store
        .query_where(COLLEGES, &[Predicate::equals("domain", domain)])
        .await?;
    if documents.len() > 1 {
        debug!(
            "event=college_lookup module=catalog status=ambiguous matches={}",
            documents.len()
        );
    }

    match documents.first() {
        Some(document) => Ok(Some(College::from_document(document)?)),
        None => Ok(None),
    }
}

/// Returns the scholarship catalog of the first college under `domain`.
pub(crate) async fn scholarship_catalog<S>(
    store: &S,
    domain: &str,
) -> Result<Option<Vec<Scholarship>>, AggregateError>
where
    S: DocumentStore + ?Sized,
{
    Ok(first_college(store, domain)
        .await?
        .map(|college| college.scholarships))
}

#[cfg(test)]
mod tests {
    use super::{first_college, scholarship_catalog};
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn first_match_wins_for_duplicate_domains() {
        let store = MemoryDocumentStore::new();
        store.put("colleges", "c2", json!({ "domain": "x.edu", "cname": "Second" }));
        store.put("colleges", "c1", json!({ "domain": "x.edu", "cname": "First" }));

        let college = first_college(&store, "x.edu").await.unwrap().unwrap();
        assert_eq!(college.name, "First");
    }

    #[tokio::test]
    async fn missing_college_is_none() {
        let store = MemoryDocumentStore::new();
        assert!(scholarship_catalog(&store, "nowhere.edu")
            .await
            .unwrap()
            .is_none());
    }
}
