//! Autocomplete index over the live roster.
//!
//! # Invariants
//! - The index is parallel to the roster: one entry per student, same order.
//! - Matching is a case-insensitive substring test on the display name after
//!   whitespace normalization; results keep index order.

use crate::model::{student_route, Student};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const DEFAULT_LIMIT: usize = 5;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Lookup row for one roster student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchEntry {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub email: String,
}

impl SearchEntry {
    pub fn from_student(student: &Student) -> Self {
        Self {
            id: student.id.clone(),
            name: student.name.clone(),
            image_url: student.image_url.clone(),
            email: student.email.clone(),
        }
    }

    /// Profile path to navigate to when this entry is picked.
    pub fn route(&self) -> String {
        student_route(&self.id)
    }
}

/// Builds the index for one roster snapshot.
pub fn build_index(students: &[Student]) -> Vec<SearchEntry> {
    students.iter().map(SearchEntry::from_student).collect()
}

/// Search options for autocomplete behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Raw user input.
    pub text: String,
    /// Maximum number of entries to return.
    pub limit: usize,
}

impl SearchQuery {
    /// Creates a query with the default suggestion limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Returns entries whose name contains the query text.
///
/// Blank input or a zero limit yields no suggestions.
pub fn filter_entries(entries: &[SearchEntry], query: &SearchQuery) -> Vec<SearchEntry> {
    let needle = normalize(&query.text);
    if needle.is_empty() || query.limit == 0 {
        return Vec::new();
    }

    entries
        .iter()
        .filter(|entry| normalize(&entry.name).contains(needle.as_str()))
        .take(query.limit)
        .cloned()
        .collect()
}

fn normalize(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{filter_entries, normalize, SearchEntry, SearchQuery};

    fn entry(id: &str, name: &str) -> SearchEntry {
        SearchEntry {
            id: id.to_string(),
            name: name.to_string(),
            image_url: None,
            email: format!("{id}@x.edu"),
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  Ada \t LOVELACE "), "ada lovelace");
    }

    #[test]
    fn filter_matches_substring_in_index_order() {
        let entries = vec![
            entry("s1", "Ada Lovelace"),
            entry("s2", "Alan Turing"),
            entry("s3", "Grace  Hopper"),
        ];

        let hits = filter_entries(&entries, &SearchQuery::new("a"));
        let ids: Vec<_> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        let hits = filter_entries(&entries, &SearchQuery::new("grace hop"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].route(), "/student/s3");
    }

    #[test]
    fn filter_honors_limit_and_blank_input() {
        let entries = vec![entry("s1", "Ada"), entry("s2", "Adam")];
        assert_eq!(
            filter_entries(&entries, &SearchQuery::new("ad").with_limit(1)).len(),
            1
        );
        assert!(filter_entries(&entries, &SearchQuery::new("   ")).is_empty());
    }
}
