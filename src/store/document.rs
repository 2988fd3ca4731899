use std::path::Path;
use std::time::Duration;

use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::model::{unique_key_filter, validate_record, Collection};
use crate::store::{apply_patch, Filter, RecordStore, StoreError};

const DB_FILE: &str = "campus.sqlite3";
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// The primary, schema-validating store. One row per record, the record
/// body kept as a JSON document and queried through `json_extract`, so the
/// adapter stays thin and collection shapes live in one place (the model
/// boundary validation).
///
/// Every call is bounded by the busy timeout; a call that cannot get
/// through in time surfaces as `StoreError::Unavailable` so the gateway
/// falls back instead of hanging the request.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    pub fn open(workspace: &Path) -> Result<DocumentStore, StoreError> {
        std::fs::create_dir_all(workspace)
            .map_err(|e| StoreError::unavailable(format!("create workspace: {}", e)))?;
        let conn = Connection::open(workspace.join(DB_FILE)).map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY(collection, id)
            )",
            [],
        )
        .map_err(unavailable)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
            [],
        )
        .map_err(unavailable)?;

        Ok(DocumentStore { conn })
    }

    fn select(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        // Filter fields are program-chosen names (token, sid, subject, ...),
        // never caller text; only values travel as bound params.
        let mut sql = String::from("SELECT body FROM records WHERE collection = ?");
        let mut params: Vec<String> = vec![collection.name().to_string()];
        for (field, value) in filter {
            sql.push_str(&format!(" AND json_extract(body, '$.{}') = ?", field));
            params.push(value.clone());
        }

        let mut stmt = self.conn.prepare(&sql).map_err(unavailable)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                row.get::<_, String>(0)
            })
            .map_err(unavailable)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(unavailable)?;

        let mut out = Vec::with_capacity(rows.len());
        for body in rows {
            let record: Value = serde_json::from_str(&body)
                .map_err(|e| StoreError::unavailable(format!("corrupt record body: {}", e)))?;
            out.push(record);
        }
        Ok(out)
    }
}

impl RecordStore for DocumentStore {
    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        self.select(collection, filter)
    }

    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.select(collection, filter)?.into_iter().next())
    }

    fn insert(&self, collection: Collection, record: Value) -> Result<Value, StoreError> {
        validate_record(collection, &record)?;

        if let Some(key) = unique_key_filter(collection, &record) {
            if self.find_one(collection, &key)?.is_some() {
                return Err(StoreError::duplicate(collection, &key));
            }
        }

        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::validation(Some("id"), "id is required"))?
            .to_string();
        let body = serde_json::to_string(&record)
            .map_err(|e| StoreError::unavailable(format!("serialize record: {}", e)))?;

        match self.conn.execute(
            "INSERT INTO records(collection, id, body) VALUES(?, ?, ?)",
            (collection.name(), &id, &body),
        ) {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateKey {
                    collection: collection.name(),
                    field: "id".to_string(),
                    value: msg.unwrap_or(id),
                })
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE collection = ? AND id = ?",
                (collection.name(), id),
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;
        let Some(body) = existing else {
            return Ok(None);
        };

        let mut record: Value = serde_json::from_str(&body)
            .map_err(|e| StoreError::unavailable(format!("corrupt record body: {}", e)))?;
        apply_patch(&mut record, patch);
        validate_record(collection, &record)?;

        let body = serde_json::to_string(&record)
            .map_err(|e| StoreError::unavailable(format!("serialize record: {}", e)))?;
        self.conn
            .execute(
                "UPDATE records SET body = ? WHERE collection = ? AND id = ?",
                (&body, collection.name(), id),
            )
            .map_err(unavailable)?;
        Ok(Some(record))
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND id = ?",
                (collection.name(), id),
            )
            .map_err(unavailable)?;
        Ok(affected > 0)
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::unavailable(e.to_string())
}
