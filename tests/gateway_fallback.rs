use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use campusd::gateway::Gateway;
use campusd::model::Collection;
use campusd::store::{DocumentStore, FileStore, RecordStore, StoreError};
use serde_json::{json, Map, Value};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn student_fields(sid: &str, name: &str) -> Map<String, Value> {
    fields(&[
        ("sid", json!(sid)),
        ("name", json!(name)),
        ("password", json!("pw")),
        ("role", json!("student")),
    ])
}

fn file_count(store: &FileStore, collection: Collection) -> usize {
    store.read_all(collection).expect("read collection").len()
}

#[test]
fn read_returns_file_store_contents_when_document_store_is_unreachable() {
    let workspace = temp_dir("campusd-gw-fallback-read");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    file.insert(
        Collection::Students,
        json!({ "id": "s1", "sid": "21A01", "name": "Asha", "password": "pw" }),
    )
    .expect("seed file store");
    file.insert(
        Collection::Students,
        json!({ "id": "s2", "sid": "21A02", "name": "Ravi", "password": "pw" }),
    )
    .expect("seed file store");

    let gateway = Gateway::new(None, file);
    let students = gateway.read(Collection::Students).expect("fallback read");

    assert_eq!(students.len(), 2);
    assert_eq!(
        students[0].get("sid").and_then(|v| v.as_str()),
        Some("21A01")
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn read_does_not_merge_when_the_document_store_answers() {
    let workspace = temp_dir("campusd-gw-no-merge");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    file.insert(
        Collection::Students,
        json!({ "id": "s-file", "sid": "21A09", "name": "File Only", "password": "pw" }),
    )
    .expect("seed file store");

    let gateway = Gateway::new(Some(document), file);
    // Primary is reachable and empty; a plain read reports that, merging
    // is reserved for the list/filter path.
    let students = gateway.read(Collection::Students).expect("read");
    assert!(students.is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn create_dual_writes_and_survives_without_the_document_store() {
    let workspace = temp_dir("campusd-gw-create");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    let gateway = Gateway::new(Some(document), file);

    let created = gateway
        .create(Collection::Students, student_fields("21A01", "Asha"))
        .expect("create student");
    let id = created.get("id").and_then(|v| v.as_str()).expect("id");

    let doc = gateway.document().expect("document store");
    assert!(doc
        .find_one(
            Collection::Students,
            &[("id".to_string(), id.to_string())]
        )
        .expect("doc lookup")
        .is_some());
    assert_eq!(file_count(gateway.file(), Collection::Students), 1);

    // Degraded gateway: the backstop alone carries the write.
    let degraded_ws = temp_dir("campusd-gw-create-degraded");
    let degraded_file = FileStore::open(&degraded_ws.join("fallback")).expect("open file store");
    let degraded = Gateway::new(None, degraded_file);
    degraded
        .create(Collection::Students, student_fields("21A02", "Ravi"))
        .expect("create without document store");
    assert_eq!(file_count(degraded.file(), Collection::Students), 1);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(degraded_ws);
}

#[test]
fn duplicate_sid_in_either_store_is_rejected_and_file_count_unchanged() {
    let workspace = temp_dir("campusd-gw-dup");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    let gateway = Gateway::new(Some(document), file);

    gateway
        .create(Collection::Students, student_fields("21A01", "Asha"))
        .expect("first create");
    let before = file_count(gateway.file(), Collection::Students);

    let err = gateway
        .create(Collection::Students, student_fields("21A01", "Imposter"))
        .expect_err("duplicate sid must fail");
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(file_count(gateway.file(), Collection::Students), before);

    // A copy living only in the file store still blocks the key.
    gateway
        .file()
        .insert(
            Collection::Students,
            json!({ "id": "s-file", "sid": "21A77", "name": "Backstop", "password": "pw" }),
        )
        .expect("seed file-only student");
    let err = gateway
        .create(Collection::Students, student_fields("21A77", "Imposter"))
        .expect_err("file-store duplicate must fail");
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn schema_rejection_with_completed_backstop_still_reports_success() {
    let workspace = temp_dir("campusd-gw-hazard");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    let gateway = Gateway::new(Some(document), file);

    // "mixtape" is outside the material type vocabulary, so the document
    // store rejects it; the fallback copy lands and the caller is told
    // the write succeeded.
    let created = gateway
        .create(
            Collection::Materials,
            fields(&[
                ("title", json!("Sem 2 mixtape")),
                ("type", json!("mixtape")),
                ("uploaderId", json!("f1")),
                ("uploaderRole", json!("faculty")),
            ]),
        )
        .expect("hazard path reports success");

    let id = created.get("id").and_then(|v| v.as_str()).expect("id");
    let doc = gateway.document().expect("document store");
    assert!(doc
        .find_one(
            Collection::Materials,
            &[("id".to_string(), id.to_string())]
        )
        .expect("doc lookup")
        .is_none());
    assert_eq!(file_count(gateway.file(), Collection::Materials), 1);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn update_patches_the_record_and_its_twin() {
    let workspace = temp_dir("campusd-gw-update");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    let gateway = Gateway::new(Some(document), file);

    let created = gateway
        .create(Collection::Students, student_fields("21A01", "Asha"))
        .expect("create student");
    let id = created.get("id").and_then(|v| v.as_str()).expect("id");

    let patch = fields(&[("name", json!("Asha K"))]);
    let updated = gateway
        .update(Collection::Students, id, &patch)
        .expect("update");
    assert_eq!(updated.get("name").and_then(|v| v.as_str()), Some("Asha K"));

    let in_file = gateway
        .file()
        .find_one(
            Collection::Students,
            &[("id".to_string(), id.to_string())]
        )
        .expect("file lookup")
        .expect("file twin");
    assert_eq!(in_file.get("name").and_then(|v| v.as_str()), Some("Asha K"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn update_syncs_a_twin_that_lives_under_a_different_id() {
    let workspace = temp_dir("campusd-gw-twin");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");

    document
        .insert(
            Collection::Students,
            json!({ "id": "doc9", "sid": "21A09", "name": "Asha", "password": "pw" }),
        )
        .expect("insert primary copy");
    file.insert(
        Collection::Students,
        json!({ "id": "file9", "sid": "21A09", "name": "Asha", "password": "pw" }),
    )
    .expect("insert fallback copy");

    let gateway = Gateway::new(Some(document), file);
    let patch = fields(&[("name", json!("Asha K"))]);
    gateway
        .update(Collection::Students, "doc9", &patch)
        .expect("update by document id");

    // The fallback copy shares the business key, not the storage id, and
    // is still brought along.
    let twin = gateway
        .file()
        .find_one(
            Collection::Students,
            &[("id".to_string(), "file9".to_string())]
        )
        .expect("file lookup")
        .expect("twin record");
    assert_eq!(twin.get("name").and_then(|v| v.as_str()), Some("Asha K"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn update_falls_through_to_a_record_that_only_the_file_store_holds() {
    let workspace = temp_dir("campusd-gw-update-file-only");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    file.insert(
        Collection::Students,
        json!({ "id": "s-file", "sid": "21A08", "name": "Backstop", "password": "pw" }),
    )
    .expect("seed file-only student");

    let gateway = Gateway::new(Some(document), file);
    let patch = fields(&[("name", json!("Backstop Jr"))]);
    let updated = gateway
        .update(Collection::Students, "s-file", &patch)
        .expect("update file-only record");
    assert_eq!(
        updated.get("name").and_then(|v| v.as_str()),
        Some("Backstop Jr")
    );

    let missing = gateway.update(Collection::Students, "nope", &patch);
    assert!(matches!(missing, Err(StoreError::NotFound)));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn delete_removes_the_record_from_every_store_that_holds_it() {
    let workspace = temp_dir("campusd-gw-delete");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");
    let gateway = Gateway::new(Some(document), file);

    let created = gateway
        .create(Collection::Students, student_fields("21A01", "Asha"))
        .expect("create student");
    let id = created.get("id").and_then(|v| v.as_str()).expect("id");

    assert!(gateway.delete(Collection::Students, id).expect("delete"));
    assert_eq!(file_count(gateway.file(), Collection::Students), 0);
    let doc = gateway.document().expect("document store");
    assert!(doc
        .find_one(
            Collection::Students,
            &[("id".to_string(), id.to_string())]
        )
        .expect("doc lookup")
        .is_none());

    assert!(!gateway
        .delete(Collection::Students, "never-existed")
        .expect("delete of unknown id"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn get_prefers_the_document_store_copy() {
    let workspace = temp_dir("campusd-gw-get");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");

    document
        .insert(
            Collection::Courses,
            json!({ "id": "c1", "code": "CS201", "name": "Databases" }),
        )
        .expect("insert primary");
    file.insert(
        Collection::Courses,
        json!({ "id": "c1", "code": "CS201", "name": "Databases (stale)" }),
    )
    .expect("insert stale fallback");

    let gateway = Gateway::new(Some(document), file);
    let course = gateway.get(Collection::Courses, "c1").expect("get course");
    assert_eq!(
        course.get("name").and_then(|v| v.as_str()),
        Some("Databases")
    );

    let _ = std::fs::remove_dir_all(workspace);
}
