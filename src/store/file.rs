use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::model::{record_id, Collection, FileShape};
use crate::store::{apply_patch, matches_filter, Filter, RecordStore, StoreError};

/// The local fallback store. One pretty-printed JSON document per
/// collection; an array of records for most collections, a single object
/// for the admin singleton. Every mutation is a whole-file
/// read-modify-rewrite with no lock and no log; across processes the last
/// writer wins.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: &Path) -> Result<FileStore, StoreError> {
        std::fs::create_dir_all(root)
            .map_err(|e| StoreError::unavailable(format!("create fallback dir: {}", e)))?;
        Ok(FileStore {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.name()))
    }

    pub fn read_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let path = self.collection_path(collection);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| StoreError::unavailable(format!("read {}: {}", path.display(), e)))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| StoreError::unavailable(format!("parse {}: {}", path.display(), e)))?;
        match parsed {
            Value::Array(items) => Ok(items),
            Value::Object(_) => Ok(vec![parsed]),
            Value::Null => Ok(Vec::new()),
            _ => Err(StoreError::unavailable(format!(
                "unexpected content in {}",
                path.display()
            ))),
        }
    }

    fn write_all(&self, collection: Collection, records: &[Value]) -> Result<(), StoreError> {
        let path = self.collection_path(collection);
        let doc = match collection.file_shape() {
            FileShape::Array => Value::Array(records.to_vec()),
            FileShape::Singleton => records.first().cloned().unwrap_or(Value::Null),
        };
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| StoreError::unavailable(format!("serialize {}: {}", path.display(), e)))?;
        std::fs::write(&path, text)
            .map_err(|e| StoreError::unavailable(format!("write {}: {}", path.display(), e)))
    }
}

impl RecordStore for FileStore {
    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let records = self.read_all(collection)?;
        Ok(records
            .into_iter()
            .filter(|r| matches_filter(r, filter))
            .collect())
    }

    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let records = self.read_all(collection)?;
        Ok(records.into_iter().find(|r| matches_filter(r, filter)))
    }

    fn insert(&self, collection: Collection, record: Value) -> Result<Value, StoreError> {
        let mut records = self.read_all(collection)?;
        match collection.file_shape() {
            // The singleton file holds exactly one record; an insert
            // replaces whatever is there.
            FileShape::Singleton => records = vec![record.clone()],
            FileShape::Array => records.push(record.clone()),
        }
        self.write_all(collection, &records)?;
        Ok(record)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut records = self.read_all(collection)?;
        let Some(pos) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        apply_patch(&mut records[pos], patch);
        let updated = records[pos].clone();
        self.write_all(collection, &records)?;
        Ok(Some(updated))
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut records = self.read_all(collection)?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(collection, &records)?;
        Ok(true)
    }
}
