//! File-backed store: an in-memory store flushed to a JSON document
//!
//! Writes go through a temp file in the same directory followed by a rename,
//! so a crash never leaves a half-written store behind. Inside a transaction
//! nothing is flushed until `commit_transaction`.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::{Entity, EntityId, Filter, SortKey};
use crate::infrastructure::error::{StorageError, StorageResult};
use crate::infrastructure::memory::{InMemoryStore, StoreData};
use crate::infrastructure::traits::Storage;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| StorageError::io(format!("read {}", path.display()), e))?;
            if content.trim().is_empty() {
                StoreData::default()
            } else {
                serde_json::from_str(&content).map_err(|e| StorageError::Serialization {
                    context: format!("parse {}", path.display()),
                    source: e,
                })?
            }
        } else {
            StoreData::default()
        };
        debug!("open store {}: {} tables", path.display(), data.tables.len());
        Ok(Self {
            path: path.to_path_buf(),
            inner: InMemoryStore::from_data(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StorageResult<()> {
        let data = self.inner.export()?;
        let json = serde_json::to_string_pretty(&data).map_err(|e| StorageError::Serialization {
            context: format!("serialize {}", self.path.display()),
            source: e,
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io(format!("create {}", dir.display()), e))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| StorageError::io(format!("temp file in {}", dir.display()), e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| StorageError::io("write temp store", e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::io(format!("replace {}", self.path.display()), e.error))?;
        debug!("flushed {}", self.path.display());
        Ok(())
    }

    fn flush_outside_transaction(&self) -> StorageResult<()> {
        if self.inner.in_transaction()? {
            Ok(())
        } else {
            self.flush()
        }
    }
}

impl Storage for JsonFileStore {
    fn get(&self, entity_type: &str, id: &EntityId) -> StorageResult<Option<Entity>> {
        self.inner.get(entity_type, id)
    }

    fn list(&self, entity_type: &str, filter: &Filter, order: &[SortKey]) -> StorageResult<Vec<Entity>> {
        self.inner.list(entity_type, filter, order)
    }

    fn commit(&self, entity: &Entity) -> StorageResult<EntityId> {
        let id = self.inner.commit(entity)?;
        self.flush_outside_transaction()?;
        Ok(id)
    }

    fn delete(&self, entity_type: &str, id: &EntityId) -> StorageResult<()> {
        self.inner.delete(entity_type, id)?;
        self.flush_outside_transaction()
    }

    fn begin(&self) -> StorageResult<bool> {
        self.inner.begin()
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        self.inner.commit_transaction()?;
        self.flush()
    }

    fn rollback(&self) -> StorageResult<()> {
        self.inner.rollback()
    }
}
