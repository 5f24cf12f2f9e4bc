//! Live verified-student roster.
//!
//! # Responsibility
//! - Hold a live query over verified students of the viewer's college.
//! - Rebuild the roster and its search index from every delivered result set.
//! - Project the roster flat or grouped by scholarship.
//!
//! # Invariants
//! - Each notification replaces the snapshot wholesale; the latest delivery
//!   always wins and nothing is merged.
//! - The catalog is read once per session, never live.
//! - After `close` (or drop) the session ignores every later notification,
//!   and the store subscription has been released exactly once.

use super::catalog::{scholarship_catalog, STUDENTS};
use super::error::AggregateError;
use crate::auth::AuthProvider;
use crate::model::{student_route, Scholarship, Student};
use crate::search::roster_index::{build_index, filter_entries, SearchEntry, SearchQuery};
use crate::store::{Document, DocumentStore, Predicate, SnapshotListener, Subscription};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Display mode selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterMode {
    /// One entry per student, in delivery order.
    #[default]
    Flat,
    /// One group per catalog scholarship.
    ByScholarship,
}

/// Card data for one roster student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub image_url: Option<String>,
    pub college_domain: String,
    pub total_attendance: u32,
    pub verified_on: Option<i64>,
}

impl RosterEntry {
    pub fn from_student(student: &Student) -> Self {
        Self {
            id: student.id.clone(),
            name: student.name.clone(),
            email: student.email.clone(),
            mobile: student.mobile.clone(),
            image_url: student.image_url.clone(),
            college_domain: student.college_domain.clone(),
            total_attendance: student.total_attendance,
            verified_on: student.verified_on,
        }
    }

    /// Profile path to navigate to when this entry is picked.
    pub fn route(&self) -> String {
        student_route(&self.id)
    }
}

/// Students enrolled in one catalog scholarship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScholarshipGroup {
    pub scholarship: Scholarship,
    pub students: Vec<RosterEntry>,
}

/// Rendered roster in the selected mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "items", rename_all = "snake_case")]
pub enum RosterView {
    Flat(Vec<RosterEntry>),
    ByScholarship(Vec<ScholarshipGroup>),
}

/// One materialized delivery from the live query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    /// Number of deliveries applied; `0` means nothing has arrived yet.
    pub revision: u64,
    pub students: Vec<Student>,
    /// Parallel autocomplete index.
    pub index: Vec<SearchEntry>,
    /// Documents dropped because they failed to decode.
    pub skipped: usize,
}

impl RosterSnapshot {
    /// Decodes one delivered result set.
    pub fn from_documents(revision: u64, documents: &[Document]) -> Self {
        let mut students = Vec::with_capacity(documents.len());
        let mut skipped = 0;
        for document in documents {
            match Student::from_document(document) {
                Ok(student) => students.push(student),
                Err(err) => {
                    skipped += 1;
                    warn!(
                        "event=roster_decode module=roster status=skipped error={}",
                        err
                    );
                }
            }
        }
        let index = build_index(&students);
        Self {
            revision,
            students,
            index,
            skipped,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

/// Flat projection: exactly one entry per student.
pub fn flat_view(students: &[Student]) -> Vec<RosterEntry> {
    students.iter().map(RosterEntry::from_student).collect()
}

/// Grouped projection in catalog order.
///
/// A student enrolled in k catalog scholarships appears in k groups.
pub fn group_by_scholarship(students: &[Student], catalog: &[Scholarship]) -> Vec<ScholarshipGroup> {
    catalog
        .iter()
        .map(|scholarship| ScholarshipGroup {
            scholarship: scholarship.clone(),
            students: students
                .iter()
                .filter(|student| student.has_scholarship(&scholarship.name))
                .map(RosterEntry::from_student)
                .collect(),
        })
        .collect()
}

/// Lifecycle status of a roster session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterStatus {
    /// Auth has not settled on a signed-in viewer; nothing is subscribed.
    AwaitingAuth,
    Live,
    /// Query setup failed; terminal, never retried.
    Failed(AggregateError),
    Closed,
}

/// Roster use-case over injected store and auth collaborators.
pub struct RosterAggregator<S: DocumentStore, A: AuthProvider> {
    store: S,
    auth: A,
}

impl<S: DocumentStore, A: AuthProvider> RosterAggregator<S, A> {
    pub fn new(store: S, auth: A) -> Self {
        Self { store, auth }
    }

    /// Opens a live roster for the current viewer's college.
    ///
    /// Setup failures are reported through `RosterSession::status`.
    pub async fn open(&self) -> RosterSession {
        let auth = self.auth.current();
        let Some(viewer) = auth.ready_viewer() else {
            info!(
                "event=roster_open module=roster status=awaiting_auth auth_loading={}",
                auth.loading
            );
            return RosterSession::inert(RosterStatus::AwaitingAuth);
        };
        let Some(domain) = viewer.domain() else {
            let err = AggregateError::NoViewerDomain;
            error!(
                "event=roster_open module=roster status=error error_code={}",
                err.code()
            );
            return RosterSession::inert(RosterStatus::Failed(err));
        };

        let (sender, updates) = watch::channel(RosterSnapshot::default());
        let closed = Arc::new(AtomicBool::new(false));
        let predicates = vec![
            Predicate::equals("cdomain", domain),
            Predicate::equals("verified", true),
        ];
        let listener = snapshot_listener(sender, Arc::clone(&closed));

        let (subscription, catalog) = futures::join!(
            self.store.subscribe(STUDENTS, predicates, listener),
            self.load_catalog(domain)
        );

        match subscription {
            Ok(subscription) => {
                info!(
                    "event=roster_open module=roster status=ok students={} catalog={}",
                    updates.borrow().students.len(),
                    catalog.len()
                );
                RosterSession {
                    subscription: Some(subscription),
                    status: RosterStatus::Live,
                    catalog,
                    updates,
                    closed,
                }
            }
            Err(err) => {
                closed.store(true, Ordering::SeqCst);
                let err = AggregateError::from(err);
                error!(
                    "event=roster_open module=roster status=error error_code={} error={}",
                    err.code(),
                    err
                );
                RosterSession {
                    subscription: None,
                    status: RosterStatus::Failed(err),
                    catalog,
                    updates,
                    closed,
                }
            }
        }
    }

    async fn load_catalog(&self, domain: &str) -> Vec<Scholarship> {
        match scholarship_catalog(&self.store, domain).await {
            Ok(Some(catalog)) => catalog,
            Ok(None) => {
                warn!("event=catalog_lookup module=roster status=unresolved matches=0");
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "event=catalog_lookup module=roster status=error error_code={} error={}",
                    err.code(),
                    err
                );
                Vec::new()
            }
        }
    }
}

fn snapshot_listener(
    sender: watch::Sender<RosterSnapshot>,
    closed: Arc<AtomicBool>,
) -> SnapshotListener {
    Arc::new(move |documents: Vec<Document>| {
        if closed.load(Ordering::SeqCst) {
            debug!("event=roster_update module=roster status=ignored reason=closed");
            return;
        }
        sender.send_modify(|snapshot| {
            *snapshot = RosterSnapshot::from_documents(snapshot.revision + 1, &documents);
        });
    })
}

/// Screen-scoped handle over one live roster.
///
/// Owns the store subscription; closing or dropping the session releases it.
pub struct RosterSession {
    subscription: Option<Subscription>,
    status: RosterStatus,
    catalog: Vec<Scholarship>,
    updates: watch::Receiver<RosterSnapshot>,
    closed: Arc<AtomicBool>,
}

impl RosterSession {
    fn inert(status: RosterStatus) -> Self {
        let (_sender, updates) = watch::channel(RosterSnapshot::default());
        Self {
            subscription: None,
            status,
            catalog: Vec::new(),
            updates,
            closed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn status(&self) -> &RosterStatus {
        &self.status
    }

    pub fn is_live(&self) -> bool {
        self.status == RosterStatus::Live
    }

    /// Current snapshot (latest delivery).
    pub fn snapshot(&self) -> RosterSnapshot {
        self.updates.borrow().clone()
    }

    /// Receiver that observes every later snapshot replacement.
    pub fn updates(&self) -> watch::Receiver<RosterSnapshot> {
        self.updates.clone()
    }

    /// Scholarship catalog of the viewer's college (empty when unresolved).
    pub fn catalog(&self) -> &[Scholarship] {
        &self.catalog
    }

    pub fn view(&self, mode: RosterMode) -> RosterView {
        let snapshot = self.updates.borrow();
        match mode {
            RosterMode::Flat => RosterView::Flat(flat_view(&snapshot.students)),
            RosterMode::ByScholarship => {
                RosterView::ByScholarship(group_by_scholarship(&snapshot.students, &self.catalog))
            }
        }
    }

    /// Autocomplete suggestions from the current index.
    pub fn search(&self, query: &SearchQuery) -> Vec<SearchEntry> {
        filter_entries(&self.updates.borrow().index, query)
    }

    /// Releases the live query. Safe to call more than once.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            info!("event=roster_close module=roster status=ok");
        }
        if self.status == RosterStatus::Live {
            self.status = RosterStatus::Closed;
        }
    }
}

impl Drop for RosterSession {
    fn drop(&mut self) {
        self.close();
    }
}
