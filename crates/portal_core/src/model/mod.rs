//! Typed records for portal documents.
//!
//! # Responsibility
//! - Define the student/college/scholarship shapes the aggregators consume.
//! - Validate and default raw store documents at one boundary, so the
//!   aggregators never touch untyped JSON.
//!
//! # Invariants
//! - Required fields (`sname`, `email`, `cdomain`, `domain`, `cname`) are
//!   checked on decode; everything else defaults. Unnamed catalog entries are
//!   dropped without failing their college.
//! - Scholarship names referenced by a student may dangle; nothing here
//!   cross-checks them against the owning college.

pub mod college;
pub mod student;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use college::{College, Scholarship};
pub use student::Student;

/// Navigation target for one student profile.
pub fn student_route(student_id: &str) -> String {
    format!("/student/{student_id}")
}

/// Returns the part of an email address after the first `@`.
///
/// Only the segment up to a following `@` is kept. Returns `None` when the
/// address has no `@` or the domain segment is empty.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .split('@')
        .nth(1)
        .map(str::trim)
        .filter(|domain| !domain.is_empty())
}

/// Decode error for one store document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    InvalidShape {
        entity: &'static str,
        message: String,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { entity, field } => {
                write!(f, "{entity} document is missing required field `{field}`")
            }
            Self::InvalidShape { entity, message } => {
                write!(f, "{entity} document has invalid shape: {message}")
            }
        }
    }
}

impl Error for ModelError {}

pub(crate) fn require(
    value: Option<String>,
    entity: &'static str,
    field: &'static str,
) -> Result<String, ModelError> {
    value
        .filter(|text| !text.trim().is_empty())
        .ok_or(ModelError::MissingField { entity, field })
}
