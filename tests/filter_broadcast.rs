use campusd::filter::{record_matches, ListQuery};
use serde_json::json;

fn query(year: Option<&str>, section: Option<&str>, branch: Option<&str>) -> ListQuery {
    ListQuery {
        year: year.map(str::to_string),
        section: section.map(str::to_string),
        branch: branch.map(str::to_string),
        ..Default::default()
    }
}

#[test]
fn broadcast_section_matches_any_concrete_query() {
    let record = json!({ "id": "m", "year": "2", "section": "All", "branch": "CSE" });

    assert!(record_matches(&record, &query(None, Some("A"), None)));
    assert!(record_matches(&record, &query(None, Some("B"), None)));
    assert!(record_matches(&record, &query(None, None, None)));
}

#[test]
fn concrete_section_only_matches_itself() {
    let record = json!({ "id": "m", "section": "A" });

    assert!(record_matches(&record, &query(None, Some("A"), None)));
    assert!(!record_matches(&record, &query(None, Some("B"), None)));
    // No section constraint matches concrete values too.
    assert!(record_matches(&record, &query(None, None, None)));
}

#[test]
fn unset_and_empty_fields_behave_as_broadcast() {
    let unset = json!({ "id": "m", "year": "2" });
    let empty = json!({ "id": "m", "year": "2", "section": "" });

    assert!(record_matches(&unset, &query(None, Some("C"), None)));
    assert!(record_matches(&empty, &query(None, Some("C"), None)));
}

#[test]
fn year_two_broadcast_section_scenario() {
    // Material published to all of year 2 reaches a section B student.
    let m1 = json!({ "id": "m1", "year": "2", "section": "All", "branch": "CSE" });
    // Material pinned to section A does not.
    let m2 = json!({ "id": "m2", "year": "2", "section": "A", "branch": "CSE" });
    let q = query(Some("2"), Some("B"), Some("CSE"));

    assert!(record_matches(&m1, &q));
    assert!(!record_matches(&m2, &q));
}

#[test]
fn all_constrained_fields_must_match() {
    let record = json!({ "id": "m", "year": "2", "section": "All", "branch": "CSE" });

    assert!(!record_matches(&record, &query(Some("3"), Some("A"), None)));
    assert!(!record_matches(&record, &query(Some("2"), Some("A"), Some("ECE"))));
    assert!(record_matches(&record, &query(Some("2"), Some("A"), Some("CSE"))));
}

#[test]
fn subject_and_type_are_exact_match_only() {
    let record = json!({ "id": "m", "subject": "DBMS", "type": "notes", "section": "All" });

    let mut q = ListQuery {
        subject: Some("DBMS".to_string()),
        ..Default::default()
    };
    assert!(record_matches(&record, &q));

    q.subject = Some("OS".to_string());
    assert!(!record_matches(&record, &q));

    let by_type = ListQuery {
        kind: Some("videos".to_string()),
        ..Default::default()
    };
    assert!(!record_matches(&record, &by_type));
}

#[test]
fn exact_field_missing_on_record_never_matches_a_constraint() {
    // 'All' never applies to subject/type/course; a record without the
    // field simply fails the constraint.
    let record = json!({ "id": "m", "title": "untagged" });
    let q = ListQuery {
        subject: Some("DBMS".to_string()),
        ..Default::default()
    };

    assert!(!record_matches(&record, &q));
}

#[test]
fn course_is_exact_match() {
    let record = json!({ "id": "m", "course": "c42" });

    let hit = ListQuery {
        course: Some("c42".to_string()),
        ..Default::default()
    };
    let miss = ListQuery {
        course: Some("c43".to_string()),
        ..Default::default()
    };
    assert!(record_matches(&record, &hit));
    assert!(!record_matches(&record, &miss));
}
