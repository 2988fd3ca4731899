use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use campusd::filter::{list_merged, merge, sort_newest_first, ListQuery};
use campusd::gateway::Gateway;
use campusd::model::Collection;
use campusd::store::{DocumentStore, FileStore, RecordStore};
use serde_json::{json, Value};

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

fn ids(records: &[Value]) -> Vec<&str> {
    records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_str()).unwrap_or(""))
        .collect()
}

#[test]
fn id_collision_keeps_the_document_store_version() {
    let primary = vec![json!({ "id": "x", "title": "primary copy" })];
    let fallback = vec![
        json!({ "id": "x", "title": "stale fallback copy" }),
        json!({ "id": "y", "title": "fallback only" }),
    ];

    let merged = merge(primary, fallback, None);
    assert_eq!(ids(&merged), vec!["x", "y"]);
    assert_eq!(
        merged[0].get("title").and_then(|v| v.as_str()),
        Some("primary copy")
    );
}

#[test]
fn business_key_collision_dedups_across_different_ids() {
    let primary = vec![json!({ "id": "doc1", "code": "CS201", "name": "Databases" })];
    let fallback = vec![json!({ "id": "file1", "code": "CS201", "name": "Databases (old)" })];

    let merged = merge(primary, fallback, Some("code"));
    assert_eq!(ids(&merged), vec!["doc1"]);
}

#[test]
fn records_without_ids_are_kept() {
    let merged = merge(vec![json!({ "title": "no id" })], Vec::new(), None);
    assert_eq!(merged.len(), 1);
}

#[test]
fn newest_first_with_missing_timestamps_last() {
    let mut records = vec![
        json!({ "id": "old", "createdAt": "2024-01-01T00:00:00Z" }),
        json!({ "id": "undated" }),
        json!({ "id": "new", "createdAt": "2025-06-01T12:00:00Z" }),
        json!({ "id": "garbage", "createdAt": "not a date" }),
    ];
    sort_newest_first(&mut records);
    assert_eq!(ids(&records), vec!["new", "old", "undated", "garbage"]);
}

#[test]
fn course_list_returns_one_cs201_keyed_by_the_document_store_id() {
    let workspace = temp_dir("campusd-merge-courses");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");

    document
        .insert(
            Collection::Courses,
            json!({ "id": "doc1", "code": "CS201", "name": "Databases" }),
        )
        .expect("insert primary course");
    file.insert(
        Collection::Courses,
        json!({ "id": "file1", "code": "CS201", "name": "Databases" }),
    )
    .expect("insert fallback course");

    let gateway = Gateway::new(Some(document), file);
    let courses = list_merged(&gateway, Collection::Courses, &ListQuery::default())
        .expect("list courses");

    assert_eq!(ids(&courses), vec!["doc1"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn material_list_merges_filters_and_sorts_both_stores() {
    let workspace = temp_dir("campusd-merge-materials");
    let document = DocumentStore::open(&workspace).expect("open document store");
    let file = FileStore::open(&workspace.join("fallback")).expect("open file store");

    document
        .insert(
            Collection::Materials,
            json!({
                "id": "m-doc",
                "title": "Unit 1 notes",
                "type": "notes",
                "uploaderId": "f1",
                "uploaderRole": "faculty",
                "year": "2",
                "section": "All",
                "branch": "CSE",
                "createdAt": "2025-03-01T09:00:00Z"
            }),
        )
        .expect("insert primary material");
    file.insert(
        Collection::Materials,
        json!({
            "id": "m-file",
            "title": "Lab sheet",
            "type": "notes",
            "uploaderId": "f1",
            "uploaderRole": "faculty",
            "year": "2",
            "section": "B",
            "branch": "CSE",
            "createdAt": "2025-04-01T09:00:00Z"
        }),
    )
    .expect("insert fallback material");
    file.insert(
        Collection::Materials,
        json!({
            "id": "m-other",
            "title": "Year 3 only",
            "type": "notes",
            "uploaderId": "f1",
            "uploaderRole": "faculty",
            "year": "3",
            "section": "All",
            "branch": "CSE"
        }),
    )
    .expect("insert off-year material");

    let gateway = Gateway::new(Some(document), file);
    let query = ListQuery {
        year: Some("2".to_string()),
        section: Some("B".to_string()),
        branch: Some("CSE".to_string()),
        ..Default::default()
    };
    let materials = list_merged(&gateway, Collection::Materials, &query).expect("list materials");

    // Both year-2 materials match (one by section broadcast), newest first;
    // the year-3 record is filtered out.
    assert_eq!(ids(&materials), vec!["m-file", "m-doc"]);

    let _ = std::fs::remove_dir_all(workspace);
}
