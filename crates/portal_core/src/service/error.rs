//! Aggregation-level error taxonomy.

use crate::model::ModelError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Terminal failure surfaced by an aggregator.
///
/// Lookups that merely come back empty are not errors; they leave the view
/// unresolved instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Requested document is absent.
    NotFound {
        collection: &'static str,
        id: String,
    },
    PermissionDenied(String),
    /// Any other store failure, flattened to its message.
    Remote(String),
    /// Document exists but does not decode into its record type.
    InvalidDocument(ModelError),
    /// Viewer email has no domain to scope college reads.
    NoViewerDomain,
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, id } => write!(f, "{collection} document not found: {id}"),
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::Remote(message) => write!(f, "{message}"),
            Self::InvalidDocument(err) => write!(f, "{err}"),
            Self::NoViewerDomain => write!(f, "viewer email has no domain"),
        }
    }
}

impl Error for AggregateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDocument(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for AggregateError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PermissionDenied(message) => Self::PermissionDenied(message),
            other => Self::Remote(other.to_string()),
        }
    }
}

impl From<ModelError> for AggregateError {
    fn from(value: ModelError) -> Self {
        Self::InvalidDocument(value)
    }
}

impl AggregateError {
    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Remote(_) => "remote_failure",
            Self::InvalidDocument(_) => "invalid_document",
            Self::NoViewerDomain => "no_viewer_domain",
        }
    }
}
