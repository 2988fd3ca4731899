use std::path::Path;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::model::{record_id, unique_key_filter, Collection};
use crate::store::{DocumentStore, FileStore, RecordStore, StoreError};

const FALLBACK_DIR: &str = "fallback";

/// One logical collection surface over the two physical stores.
///
/// The document store is primary and authoritative when reachable; the
/// file store is a standing backstop. Which store actually holds a record
/// is concealed from callers: reads fall back, creates dual-write, updates
/// and deletes chase the record into whichever store has it. There is no
/// transaction spanning the two stores; the backstop write always runs
/// after the primary attempt so it can observe the outcome.
///
/// Instances are plain values injected into handlers. No process-wide
/// store handles exist outside of them.
pub struct Gateway {
    document: Option<DocumentStore>,
    file: FileStore,
}

impl Gateway {
    pub fn new(document: Option<DocumentStore>, file: FileStore) -> Gateway {
        Gateway { document, file }
    }

    /// Bind to a workspace. A document store that fails to open degrades
    /// the gateway to file-store-only operation; a file store that fails
    /// to open is fatal, since no fallback would remain.
    pub fn open(workspace: &Path) -> Result<Gateway, StoreError> {
        let file = FileStore::open(&workspace.join(FALLBACK_DIR))?;
        let document = match DocumentStore::open(workspace) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "document store unavailable at open; running on fallback only");
                None
            }
        };
        Ok(Gateway { document, file })
    }

    pub fn file(&self) -> &FileStore {
        &self.file
    }

    pub fn document(&self) -> Option<&DocumentStore> {
        self.document.as_ref()
    }

    /// All records of a collection: document store when reachable, file
    /// store contents otherwise. Never merges; merging across stores is
    /// the filter engine's job.
    pub fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        if let Some(doc) = &self.document {
            match doc.find(collection, &[]) {
                Ok(records) => return Ok(records),
                Err(StoreError::Unavailable(detail)) => {
                    warn!(collection = collection.name(), %detail, "document store read failed; falling back");
                }
                Err(e) => return Err(e),
            }
        }
        self.file.read_all(collection)
    }

    /// Both stores' contents for cross-store merging. An unreachable
    /// document store contributes an empty set; a file store failure is
    /// tolerated as long as the document store answered.
    pub fn read_both(&self, collection: Collection) -> Result<(Vec<Value>, Vec<Value>), StoreError> {
        let primary = match &self.document {
            Some(doc) => match doc.find(collection, &[]) {
                Ok(records) => Some(records),
                Err(StoreError::Unavailable(detail)) => {
                    warn!(collection = collection.name(), %detail, "document store read failed");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        let fallback = match self.file.read_all(collection) {
            Ok(records) => records,
            Err(e) => {
                if primary.is_none() {
                    return Err(e);
                }
                warn!(collection = collection.name(), error = %e, "file store read failed");
                Vec::new()
            }
        };
        Ok((primary.unwrap_or_default(), fallback))
    }

    pub fn get(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        let filter = [("id".to_string(), id.to_string())];
        self.find_one(collection, &filter)?.ok_or(StoreError::NotFound)
    }

    /// First match across both stores, document store authoritative.
    pub fn find_one(
        &self,
        collection: Collection,
        filter: &[(String, String)],
    ) -> Result<Option<Value>, StoreError> {
        if let Some(doc) = &self.document {
            match doc.find_one(collection, filter) {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(StoreError::Unavailable(detail)) => {
                    warn!(collection = collection.name(), %detail, "document store lookup failed; falling back");
                }
                Err(e) => return Err(e),
            }
        }
        self.file.find_one(collection, filter)
    }

    /// Create a record. Assigns an id (and createdAt where the collection
    /// carries one), rejects unique-key duplicates across both stores,
    /// attempts the primary insert, then writes the file-store backstop
    /// unless the key is already there. A primary rejection with a
    /// completed backstop write still reports success: the caller was
    /// told their write stuck, and it did, in one store.
    pub fn create(
        &self,
        collection: Collection,
        mut fields: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        if !fields.contains_key("id") {
            fields.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        }
        if collection.timestamped() && !fields.contains_key("createdAt") {
            fields.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
        }
        let record = Value::Object(fields);

        if let Some(key) = unique_key_filter(collection, &record) {
            let in_document = match &self.document {
                Some(doc) => match doc.find_one(collection, &key) {
                    Ok(hit) => hit.is_some(),
                    Err(StoreError::Unavailable(detail)) => {
                        warn!(collection = collection.name(), %detail, "duplicate check skipped primary store");
                        false
                    }
                    Err(e) => return Err(e),
                },
                None => false,
            };
            if in_document || self.file.find_one(collection, &key)?.is_some() {
                return Err(StoreError::duplicate(collection, &key));
            }
        }

        let primary = match &self.document {
            Some(doc) => doc.insert(collection, record.clone()).map(|_| ()),
            None => Err(StoreError::unavailable("document store not configured")),
        };

        // Backstop write, idempotent on the unique key: a copy that is
        // already present (a racing writer got there first) counts as the
        // backstop being in place without us writing it again.
        let mut backstop_written = false;
        let mut backstop_error: Option<StoreError> = None;
        let key_present = match unique_key_filter(collection, &record) {
            Some(key) => self.file.find_one(collection, &key).map(|hit| hit.is_some()),
            None => Ok(false),
        };
        match key_present {
            Ok(true) => {}
            Ok(false) => match self.file.insert(collection, record.clone()) {
                Ok(_) => backstop_written = true,
                Err(e) => backstop_error = Some(e),
            },
            Err(e) => backstop_error = Some(e),
        }

        match primary {
            Ok(()) => {
                if let Some(e) = backstop_error {
                    warn!(collection = collection.name(), error = %e, "backstop write failed after primary insert");
                }
                Ok(record)
            }
            Err(primary_error) => {
                if backstop_written {
                    // The fallback copy landed; the caller keeps the
                    // success they were promised. Logged so the mismatch
                    // between stores is observable.
                    warn!(
                        collection = collection.name(),
                        error = %primary_error,
                        "document store rejected create; fallback copy kept, reporting success"
                    );
                    Ok(record)
                } else {
                    Err(primary_error)
                }
            }
        }
    }

    /// Patch a record wherever it lives. The store that holds the record
    /// is written authoritatively; if the same logical entity also exists
    /// in the other store (same id, or same business key under a different
    /// id), that twin is patched best-effort.
    pub fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Value, StoreError> {
        if let Some(doc) = &self.document {
            match doc.update(collection, id, patch) {
                Ok(Some(updated)) => {
                    self.sync_file_twin(collection, &updated, patch);
                    return Ok(updated);
                }
                Ok(None) => {}
                Err(StoreError::Unavailable(detail)) => {
                    warn!(collection = collection.name(), %detail, "document store update failed; falling back");
                }
                Err(e) => return Err(e),
            }
        }

        match self.file.update(collection, id, patch)? {
            Some(updated) => {
                self.sync_document_twin(collection, &updated, patch);
                Ok(updated)
            }
            None => Err(StoreError::NotFound),
        }
    }

    /// Remove a record from every store that holds it. Succeeds if it is
    /// gone from at least one store it was found in.
    pub fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let document_removed = match &self.document {
            Some(doc) => match doc.delete(collection, id) {
                Ok(removed) => removed,
                Err(StoreError::Unavailable(detail)) => {
                    warn!(collection = collection.name(), %detail, "document store delete failed");
                    false
                }
                Err(e) => return Err(e),
            },
            None => false,
        };

        let file_removed = match self.file.delete(collection, id) {
            Ok(removed) => removed,
            Err(e) => {
                if !document_removed {
                    return Err(e);
                }
                warn!(collection = collection.name(), error = %e, "file store delete failed after primary removal");
                false
            }
        };

        Ok(document_removed || file_removed)
    }

    fn sync_file_twin(&self, collection: Collection, updated: &Value, patch: &Map<String, Value>) {
        let result = (|| -> Result<(), StoreError> {
            if let Some(id) = record_id(updated) {
                if self.file.update(collection, id, patch)?.is_some() {
                    return Ok(());
                }
            }
            if let Some(key) = unique_key_filter(collection, updated) {
                if let Some(twin) = self.file.find_one(collection, &key)? {
                    if let Some(twin_id) = record_id(&twin) {
                        self.file.update(collection, twin_id, patch)?;
                    }
                }
            }
            Ok(())
        })();
        if let Err(e) = result {
            warn!(collection = collection.name(), error = %e, "file twin sync failed");
        }
    }

    fn sync_document_twin(
        &self,
        collection: Collection,
        updated: &Value,
        patch: &Map<String, Value>,
    ) {
        let Some(doc) = &self.document else {
            return;
        };
        let result = (|| -> Result<(), StoreError> {
            if let Some(id) = record_id(updated) {
                if doc.update(collection, id, patch)?.is_some() {
                    return Ok(());
                }
            }
            if let Some(key) = unique_key_filter(collection, updated) {
                if let Some(twin) = doc.find_one(collection, &key)? {
                    if let Some(twin_id) = record_id(&twin) {
                        doc.update(collection, twin_id, patch)?;
                    }
                }
            }
            Ok(())
        })();
        if let Err(e) = result {
            warn!(collection = collection.name(), error = %e, "document twin sync failed");
        }
    }
}
