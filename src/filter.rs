use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::gateway::Gateway;
use crate::model::{record_id, str_field, Collection, BROADCAST};
use crate::store::StoreError;

/// The list-endpoint query surface. `year`, `section` and `branch` carry
/// tiered broadcast semantics: a record set to `'All'` (or left unset) on
/// a field matches any concrete query value, so one upload can target a
/// single section or a whole year through the same field. `subject`,
/// `type` and `course` are exact-match only.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub year: Option<String>,
    pub section: Option<String>,
    pub branch: Option<String>,
    pub subject: Option<String>,
    /// The `type` query field (material type vocabulary).
    pub kind: Option<String>,
    pub course: Option<String>,
}

impl ListQuery {
    pub fn from_params(params: &Value) -> ListQuery {
        ListQuery {
            year: param(params, "year"),
            section: param(params, "section"),
            branch: param(params, "branch"),
            subject: param(params, "subject"),
            kind: param(params, "type"),
            course: param(params, "course"),
        }
    }
}

fn param(params: &Value, field: &str) -> Option<String> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Specific-match-or-broadcast comparison for one field. An absent query
/// value constrains nothing; a record value that is unset, empty or the
/// broadcast sentinel matches any query value.
fn broadcast_match(record: &Value, field: &str, want: Option<&str>) -> bool {
    let Some(want) = want else {
        return true;
    };
    match str_field(record, field) {
        None => true,
        Some(have) => have.is_empty() || have == BROADCAST || have == want,
    }
}

fn exact_match(record: &Value, field: &str, want: Option<&str>) -> bool {
    let Some(want) = want else {
        return true;
    };
    str_field(record, field).map(|have| have == want).unwrap_or(false)
}

/// Whether a record satisfies the full query: AND across constrained
/// fields, the broadcast OR living inside each single-field comparison.
pub fn record_matches(record: &Value, query: &ListQuery) -> bool {
    broadcast_match(record, "year", query.year.as_deref())
        && broadcast_match(record, "section", query.section.as_deref())
        && broadcast_match(record, "branch", query.branch.as_deref())
        && exact_match(record, "subject", query.subject.as_deref())
        && exact_match(record, "type", query.kind.as_deref())
        && exact_match(record, "course", query.course.as_deref())
}

/// Concatenate the primary and fallback result sets, deduplicating by id
/// and, when the collection has one, by business key. Primary entries come
/// first, so on any collision the document store's version wins.
pub fn merge(
    primary: Vec<Value>,
    fallback: Vec<Value>,
    business_key: Option<&str>,
) -> Vec<Value> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(primary.len() + fallback.len());

    for record in primary.into_iter().chain(fallback) {
        if let Some(id) = record_id(&record) {
            if !seen_ids.insert(id.to_string()) {
                continue;
            }
        }
        if let Some(field) = business_key {
            if let Some(key) = str_field(&record, field) {
                if !seen_keys.insert(key.to_string()) {
                    continue;
                }
            }
        }
        out.push(record);
    }
    out
}

/// Most recent first; records without a parseable `createdAt` sort last.
/// The sort is stable, so equal and missing timestamps keep the
/// document-store-first merge order.
pub fn sort_newest_first(records: &mut [Value]) {
    records.sort_by(|a, b| match (created_at(a), created_at(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn created_at(record: &Value) -> Option<DateTime<FixedOffset>> {
    str_field(record, "createdAt").and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Answer a list endpoint: filter each store's candidates independently,
/// merge with document-store priority, sort newest first.
pub fn list_merged(
    gateway: &Gateway,
    collection: Collection,
    query: &ListQuery,
) -> Result<Vec<Value>, StoreError> {
    let (primary, fallback) = gateway.read_both(collection)?;
    let primary: Vec<Value> = primary
        .into_iter()
        .filter(|r| record_matches(r, query))
        .collect();
    let fallback: Vec<Value> = fallback
        .into_iter()
        .filter(|r| record_matches(r, query))
        .collect();

    let business_key = match collection.unique_key_fields() {
        [field] => Some(*field),
        _ => None,
    };

    let mut merged = merge(primary, fallback, business_key);
    sort_newest_first(&mut merged);
    Ok(merged)
}
