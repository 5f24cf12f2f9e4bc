//! Data core for the college portal.
//!
//! Assembles the read-only projections portal screens render (student
//! profiles and the live verified roster) from a query-and-subscribe
//! document store. Store and auth are injected; nothing here talks to a
//! particular backend.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod search;
pub mod service;
pub mod store;

pub use auth::{AuthProvider, AuthState, StaticAuth, Viewer};
pub use config::{ConfigError, PortalConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{email_domain, student_route, College, ModelError, Scholarship, Student};
pub use search::roster_index::{SearchEntry, SearchQuery};
pub use service::error::AggregateError;
pub use service::profile_service::{
    PendingProfile, ProfileAggregator, ProfileOptions, ProfileState, ProfileView,
};
pub use service::roster_service::{
    RosterAggregator, RosterEntry, RosterMode, RosterSession, RosterSnapshot, RosterStatus,
    RosterView, ScholarshipGroup,
};
pub use store::{
    Document, DocumentStore, FieldOp, MemoryDocumentStore, Predicate, SnapshotListener,
    SqliteDocumentStore, StoreError, StoreResult, Subscription,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
