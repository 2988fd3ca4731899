use serde_json::json;

use crate::store::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Map the store taxonomy onto the wire envelope, carrying field-level
/// details where the error has them.
pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::Validation {
            field: Some(field), ..
        } => Some(json!({ "field": field })),
        StoreError::DuplicateKey {
            collection,
            field,
            value,
        } => Some(json!({
            "collection": collection,
            "field": field,
            "value": value,
        })),
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}
