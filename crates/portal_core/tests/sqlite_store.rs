use portal_core::{
    Document, DocumentStore, MemoryDocumentStore, Predicate, ProfileAggregator, ProfileOptions,
    ProfileState, RosterAggregator, RosterMode, RosterView, SqliteDocumentStore, StaticAuth,
    StoreError,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn put_then_get_round_trips_body() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let body = json!({ "sname": "Ada", "cdomain": "x.edu", "totalAtt": 4 });
    store.put("students", "s1", &body).unwrap();

    let document = store.get_by_id("students", "s1").await.unwrap().unwrap();
    assert_eq!(document, Document::new("s1", body));
    assert!(store.get_by_id("students", "s2").await.unwrap().is_none());
    assert!(store.get_by_id("colleges", "s1").await.unwrap().is_none());
}

#[tokio::test]
async fn query_where_applies_all_predicates_in_id_order() {
    let store = seeded_store();

    let verified = store
        .query_where(
            "students",
            &[
                Predicate::equals("cdomain", "x.edu"),
                Predicate::equals("verified", true),
            ],
        )
        .await
        .unwrap();
    assert_eq!(ids(&verified), vec!["s1", "s3"]);

    let merit = store
        .query_where("students", &[Predicate::array_contains("scholarships", "Merit")])
        .await
        .unwrap();
    assert_eq!(ids(&merit), vec!["s1", "s2"]);

    let by_attendance = store
        .query_where("students", &[Predicate::equals("totalAtt", 7)])
        .await
        .unwrap();
    assert_eq!(ids(&by_attendance), vec!["s3"]);
}

#[tokio::test]
async fn equality_distinguishes_booleans_from_numbers() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    store.put("students", "flag", &json!({ "verified": true, "tags": [true] })).unwrap();
    store.put("students", "one", &json!({ "verified": 1, "tags": [1] })).unwrap();
    store.put("students", "text", &json!({ "verified": "1", "tags": ["1"] })).unwrap();

    assert_eq!(matching(&store, Predicate::equals("verified", true)).await, "flag");
    assert_eq!(matching(&store, Predicate::equals("verified", 1)).await, "one");
    assert_eq!(matching(&store, Predicate::equals("verified", "1")).await, "text");
    assert_eq!(matching(&store, Predicate::array_contains("tags", true)).await, "flag");
    assert_eq!(matching(&store, Predicate::array_contains("tags", 1)).await, "one");

    let memory = MemoryDocumentStore::new();
    memory.put("students", "flag", json!({ "verified": true }));
    memory.put("students", "one", json!({ "verified": 1 }));
    assert_eq!(matching(&memory, Predicate::equals("verified", true)).await, "flag");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribe_racing_writes_ends_on_latest_set() {
    let store = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    let writer_store = Arc::clone(&store);
    let writer = std::thread::spawn(move || {
        for index in 0..100 {
            writer_store
                .put("students", &format!("s{index:03}"), &json!({ "n": index }))
                .unwrap();
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
    store.put("students", "s999", &json!({ "n": 999 })).unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&101));
}

#[tokio::test]
async fn array_contains_ignores_scalar_fields() {
    let store = seeded_store();
    let docs = store
        .query_where("students", &[Predicate::array_contains("cdomain", "x.edu")])
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn live_query_receives_full_set_after_each_write() {
    let store = seeded_store();
    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let subscription = store
        .subscribe(
            "students",
            vec![Predicate::equals("verified", true)],
            Arc::new(move |docs: Vec<Document>| {
                sink.lock()
                    .unwrap()
                    .push(docs.into_iter().map(|doc| doc.id).collect());
            }),
        )
        .await
        .unwrap();

    store
        .put("students", "s2", &student("Bea", "x.edu", true, &[]))
        .unwrap();
    assert!(store.delete("students", "s1").unwrap());
    assert!(!store.delete("students", "missing").unwrap());
    store
        .put("colleges", "cy", &json!({ "domain": "y.edu", "cname": "Y" }))
        .unwrap();
    subscription.cancel();
    store
        .put("students", "s5", &student("Eve", "x.edu", true, &[]))
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            vec!["s1", "s3", "s4"],
            vec!["s1", "s2", "s3", "s4"],
            vec!["s2", "s3", "s4"],
        ]
    );
}

#[tokio::test]
async fn add_generates_distinct_ids() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let first = store.add("colleges", &json!({ "cname": "A" })).unwrap();
    let second = store.add("colleges", &json!({ "cname": "B" })).unwrap();

    assert_ne!(first, second);
    assert_eq!(store.query_where("colleges", &[]).await.unwrap().len(), 2);
}

#[tokio::test]
async fn import_loads_fixture_collections() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let written = store
        .import(&json!({
            "students": {
                "s1": student("Ada", "x.edu", true, &["Merit"]),
                "s2": student("Bea", "x.edu", false, &[])
            },
            "colleges": {
                "cx": { "domain": "x.edu", "cname": "X Institute", "scholarships": [] }
            }
        }))
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(store.query_where("students", &[]).await.unwrap().len(), 2);

    let err = store.import(&json!({ "students": ["s1"] })).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
    let err = store.import(&json!([])).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[tokio::test]
async fn documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.db");

    let store = SqliteDocumentStore::open(&path).unwrap();
    store
        .put("students", "s1", &student("Ada", "x.edu", true, &[]))
        .unwrap();
    drop(store);

    let reopened = SqliteDocumentStore::open(&path).unwrap();
    let document = reopened.get_by_id("students", "s1").await.unwrap().unwrap();
    assert_eq!(document.field("sname"), Some(&json!("Ada")));
}

#[tokio::test]
async fn aggregators_run_over_sqlite_store() {
    let store = Arc::new(seeded_store());
    store
        .put(
            "colleges",
            "cx",
            &json!({
                "domain": "x.edu",
                "cname": "X Institute",
                "scholarships": [
                    { "name": "Merit", "provider": "Trust A", "description": "" },
                    { "name": "Sports", "provider": "Club", "description": "" }
                ]
            }),
        )
        .unwrap();
    let auth = StaticAuth::signed_in("admin@x.edu");

    let profiles =
        ProfileAggregator::new(Arc::clone(&store), auth.clone(), ProfileOptions::default());
    let ProfileState::Ready(view) = profiles.load("s1").await else {
        panic!("profile should be ready");
    };
    assert_eq!(view.college_name, "X Institute");
    assert_eq!(view.scholarships.len(), 2);

    let roster = RosterAggregator::new(Arc::clone(&store), auth);
    let session = roster.open().await;
    let RosterView::ByScholarship(groups) = session.view(RosterMode::ByScholarship) else {
        panic!("expected grouped view");
    };
    assert_eq!(groups[0].students.len(), 1);
    assert_eq!(groups[1].students.len(), 2);

    store
        .put("students", "s3", &student("Cal", "x.edu", false, &[]))
        .unwrap();
    assert_eq!(session.snapshot().students.len(), 1);
}

fn seeded_store() -> SqliteDocumentStore {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    store
        .put("students", "s1", &student("Ada", "x.edu", true, &["Merit", "Sports"]))
        .unwrap();
    store
        .put("students", "s2", &student("Bea", "x.edu", false, &["Merit"]))
        .unwrap();
    let mut cal = student("Cal", "x.edu", true, &["Sports"]);
    cal["totalAtt"] = json!(7);
    store.put("students", "s3", &cal).unwrap();
    store
        .put("students", "s4", &student("Dan", "y.edu", true, &[]))
        .unwrap();
    store
}

fn student(name: &str, domain: &str, verified: bool, scholarships: &[&str]) -> serde_json::Value {
    json!({
        "sname": name,
        "email": format!("{}@{domain}", name.to_lowercase()),
        "cdomain": domain,
        "verified": verified,
        "scholarships": scholarships,
        "totalAtt": 0
    })
}

fn ids(documents: &[Document]) -> Vec<&str> {
    documents.iter().map(|doc| doc.id.as_str()).collect()
}

async fn matching(store: &impl DocumentStore, predicate: Predicate) -> String {
    let documents = store.query_where("students", &[predicate]).await.unwrap();
    ids(&documents).join(",")
}
