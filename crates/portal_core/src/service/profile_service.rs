//! Student profile aggregation.
//!
//! # Responsibility
//! - Join one student, the student's college name and a scholarship catalog
//!   into a single read-only `ProfileView`.
//!
//! # Invariants
//! - The student read gates the college-name read; the catalog read is
//!   independent and runs concurrently with both.
//! - The catalog comes from the viewer's college domain, not the subject's.
//! - Only a failed student read is terminal. Empty or failed college/catalog
//!   lookups leave the profile in `Loading` and are logged, never raised.
//! - Displayed scholarships are `student.scholarships ∩ catalog`, in catalog
//!   order; dangling names are dropped silently.
//! - A resolve timeout bounds each branch separately; it never masks a
//!   terminal student failure and never discards parts that already arrived.

use super::catalog::{first_college, scholarship_catalog, STUDENTS};
use super::error::AggregateError;
use crate::auth::AuthProvider;
use crate::model::{Scholarship, Student};
use crate::store::DocumentStore;
use log::{error, info, warn};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

/// Tunables for profile loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileOptions {
    /// Upper bound on the join. `None` waits for every read to settle.
    pub resolve_timeout: Option<Duration>,
}

/// Fully resolved profile ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub student: Student,
    /// Display name of the student's own college.
    pub college_name: String,
    /// Catalog entries the student is enrolled in.
    pub scholarships: Vec<Scholarship>,
}

impl ProfileView {
    /// Builds the view from its three joined parts.
    pub fn assemble(student: Student, college_name: String, catalog: &[Scholarship]) -> Self {
        let scholarships = catalog
            .iter()
            .filter(|scholarship| student.has_scholarship(&scholarship.name))
            .cloned()
            .collect();
        Self {
            student,
            college_name,
            scholarships,
        }
    }

    /// `false` when the student lists no scholarships at all.
    pub fn has_scholarships(&self) -> bool {
        !self.student.scholarships.is_empty()
    }

    pub fn college_id(&self) -> &str {
        self.student.college_id()
    }
}

/// Partially resolved profile; rendered as a loading indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingProfile {
    pub student: Option<Student>,
    pub college_name: Option<String>,
    pub catalog: Option<Vec<Scholarship>>,
    /// Set when `resolve_timeout` elapsed before the join settled.
    pub timed_out: bool,
}

impl PendingProfile {
    /// Names of the parts still missing.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.student.is_none() {
            missing.push("student");
        }
        if self.college_name.is_none() {
            missing.push("college_name");
        }
        if self.catalog.is_none() {
            missing.push("catalog");
        }
        missing
    }
}

/// Outcome of one profile load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileState {
    /// Auth has not settled on a signed-in viewer; nothing was fetched.
    AwaitingAuth,
    Loading(PendingProfile),
    Ready(ProfileView),
    Failed(AggregateError),
}

impl ProfileState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Profile use-case over injected store and auth collaborators.
pub struct ProfileAggregator<S: DocumentStore, A: AuthProvider> {
    store: S,
    auth: A,
    options: ProfileOptions,
}

impl<S: DocumentStore, A: AuthProvider> ProfileAggregator<S, A> {
    pub fn new(store: S, auth: A, options: ProfileOptions) -> Self {
        Self {
            store,
            auth,
            options,
        }
    }

    /// Loads a one-time profile snapshot for `student_id`.
    ///
    /// With `resolve_timeout` set, each branch of the join stops at the same
    /// deadline and keeps whatever it resolved. A failed student read is
    /// terminal even when the other branch timed out.
    ///
    /// Dropping the returned future abandons in-flight reads without side
    /// effects.
    pub async fn load(&self, student_id: &str) -> ProfileState {
        let started_at = Instant::now();
        let auth = self.auth.current();
        let Some(viewer) = auth.ready_viewer() else {
            info!(
                "event=profile_load module=profile status=awaiting_auth auth_loading={}",
                auth.loading
            );
            return ProfileState::AwaitingAuth;
        };
        let deadline = self
            .options
            .resolve_timeout
            .map(|limit| tokio::time::Instant::now() + limit);

        let (subject, catalog) = futures::join!(
            self.fetch_subject(student_id, deadline),
            self.fetch_catalog(viewer.domain(), deadline)
        );

        let subject = match subject {
            Ok(subject) => subject,
            Err(err) => {
                error!(
                    "event=profile_load module=profile status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                return ProfileState::Failed(err);
            }
        };
        let timed_out = subject.timed_out || catalog.is_none();
        let catalog = catalog.flatten();

        match (subject.student, subject.college_name, catalog) {
            (Some(student), Some(college_name), Some(catalog)) => {
                let view = ProfileView::assemble(student, college_name, &catalog);
                info!(
                    "event=profile_load module=profile status=ok duration_ms={} scholarships={}",
                    started_at.elapsed().as_millis(),
                    view.scholarships.len()
                );
                ProfileState::Ready(view)
            }
            (student, college_name, catalog) => {
                let pending = PendingProfile {
                    student,
                    college_name,
                    catalog,
                    timed_out,
                };
                warn!(
                    "event=profile_load module=profile status={} duration_ms={} missing={}",
                    if timed_out { "timeout" } else { "unresolved" },
                    started_at.elapsed().as_millis(),
                    pending.missing().join(",")
                );
                ProfileState::Loading(pending)
            }
        }
    }

    /// Student read, then the college-name read it gates.
    async fn fetch_subject(
        &self,
        student_id: &str,
        deadline: Option<Deadline>,
    ) -> Result<SubjectParts, AggregateError> {
        let Some(document) = within(deadline, self.store.get_by_id(STUDENTS, student_id)).await
        else {
            return Ok(SubjectParts::timed_out(None));
        };
        let document = document?.ok_or_else(|| AggregateError::NotFound {
            collection: STUDENTS,
            id: student_id.to_string(),
        })?;
        let student = Student::from_document(&document)?;

        let Some(college_name) = within(deadline, self.college_name(&student)).await else {
            return Ok(SubjectParts::timed_out(Some(student)));
        };
        Ok(SubjectParts {
            student: Some(student),
            college_name,
            timed_out: false,
        })
    }

    async fn college_name(&self, student: &Student) -> Option<String> {
        match first_college(&self.store, &student.college_domain).await {
            Ok(Some(college)) => Some(college.name),
            Ok(None) => {
                warn!("event=college_lookup module=profile status=unresolved matches=0");
                None
            }
            Err(err) => {
                warn!(
                    "event=college_lookup module=profile status=error error_code={} error={}",
                    err.code(),
                    err
                );
                None
            }
        }
    }

    /// Outer `None` means the deadline passed first.
    async fn fetch_catalog(
        &self,
        viewer_domain: Option<&str>,
        deadline: Option<Deadline>,
    ) -> Option<Option<Vec<Scholarship>>> {
        let Some(domain) = viewer_domain else {
            warn!("event=catalog_lookup module=profile status=error error_code=no_viewer_domain");
            return Some(None);
        };

        within(deadline, async {
            match scholarship_catalog(&self.store, domain).await {
                Ok(Some(catalog)) => Some(catalog),
                Ok(None) => {
                    warn!("event=catalog_lookup module=profile status=unresolved matches=0");
                    None
                }
                Err(err) => {
                    warn!(
                        "event=catalog_lookup module=profile status=error error_code={} error={}",
                        err.code(),
                        err
                    );
                    None
                }
            }
        })
        .await
    }
}

type Deadline = tokio::time::Instant;

/// What the student chain resolved before the join settled.
struct SubjectParts {
    student: Option<Student>,
    college_name: Option<String>,
    timed_out: bool,
}

impl SubjectParts {
    fn timed_out(student: Option<Student>) -> Self {
        Self {
            student,
            college_name: None,
            timed_out: true,
        }
    }
}

/// Runs `future` to completion, or until `deadline` when one is set.
async fn within<F: Future>(deadline: Option<Deadline>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}
