pub mod document;
pub mod file;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::Collection;

pub use document::DocumentStore;
pub use file::FileStore;

/// The failure taxonomy shared by both stores and everything above them.
///
/// `Unavailable` is transient infrastructure trouble and is absorbed by the
/// gateway (fall back, never retry). The rest propagate to the caller
/// unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate {field} in {collection}: {value}")]
    DuplicateKey {
        collection: &'static str,
        field: String,
        value: String,
    },
    #[error("validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    #[error("record not found")]
    NotFound,
    #[error("invalid token")]
    InvalidToken,
}

impl StoreError {
    pub fn unavailable(detail: impl Into<String>) -> StoreError {
        StoreError::Unavailable(detail.into())
    }

    pub fn validation(field: Option<&str>, message: impl Into<String>) -> StoreError {
        StoreError::Validation {
            field: field.map(|s| s.to_string()),
            message: message.into(),
        }
    }

    pub fn duplicate(collection: Collection, key: &[(String, String)]) -> StoreError {
        let field = key
            .iter()
            .map(|(f, _)| f.as_str())
            .collect::<Vec<_>>()
            .join("+");
        let value = key
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("+");
        StoreError::DuplicateKey {
            collection: collection.name(),
            field,
            value,
        }
    }

    /// Stable wire code used by the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "store_unavailable",
            StoreError::DuplicateKey { .. } => "duplicate_key",
            StoreError::Validation { .. } => "bad_params",
            StoreError::NotFound => "not_found",
            StoreError::InvalidToken => "invalid_token",
        }
    }
}

/// Equality filter over top-level string fields of a record.
pub type Filter = [(String, String)];

/// The per-entity contract both physical stores implement. Records are
/// JSON objects carrying an opaque string `id`; document-store ids and
/// file-store ids are equivalent strings, never distinct types.
pub trait RecordStore {
    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError>;

    fn insert(&self, collection: Collection, record: Value) -> Result<Value, StoreError>;

    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}

/// Shallow merge of a patch into a record. A null patch value overwrites
/// the field with null (token clearing relies on this); it does not remove
/// the key.
pub fn apply_patch(record: &mut Value, patch: &Map<String, Value>) {
    if let Some(obj) = record.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
}

/// Whether a record satisfies an equality filter on top-level fields.
pub fn matches_filter(record: &Value, filter: &Filter) -> bool {
    filter.iter().all(|(field, want)| {
        record
            .get(field)
            .and_then(|v| v.as_str())
            .map(|have| have == want)
            .unwrap_or(false)
    })
}
