//! In-memory entity store with snapshot transactions

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::query::sort_entities;
use crate::domain::{Entity, EntityId, Filter, SortKey};
use crate::infrastructure::error::{StorageError, StorageResult};
use crate::infrastructure::traits::Storage;

/// Serializable store contents: entities per type in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Entity>>,
}

#[derive(Debug, Default)]
struct State {
    data: StoreData,
    snapshot: Option<StoreData>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            state: Mutex::new(State {
                data,
                snapshot: None,
            }),
        }
    }

    /// Copy of the current contents.
    pub fn export(&self) -> StorageResult<StoreData> {
        Ok(self.lock()?.data.clone())
    }

    pub fn in_transaction(&self) -> StorageResult<bool> {
        Ok(self.lock()?.snapshot.is_some())
    }

    pub fn count(&self, entity_type: &str) -> StorageResult<usize> {
        Ok(self
            .lock()?
            .data
            .tables
            .get(entity_type)
            .map(Vec::len)
            .unwrap_or(0))
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl Storage for InMemoryStore {
    fn get(&self, entity_type: &str, id: &EntityId) -> StorageResult<Option<Entity>> {
        let state = self.lock()?;
        Ok(state
            .data
            .tables
            .get(entity_type)
            .and_then(|rows| rows.iter().find(|e| e.id.as_ref() == Some(id)))
            .cloned())
    }

    fn list(&self, entity_type: &str, filter: &Filter, order: &[SortKey]) -> StorageResult<Vec<Entity>> {
        let state = self.lock()?;
        let mut rows: Vec<Entity> = state
            .data
            .tables
            .get(entity_type)
            .map(|rows| rows.iter().filter(|e| filter.matches(e)).cloned().collect())
            .unwrap_or_default();
        sort_entities(&mut rows, order);
        trace!("list {}: {} rows", entity_type, rows.len());
        Ok(rows)
    }

    fn commit(&self, entity: &Entity) -> StorageResult<EntityId> {
        let mut state = self.lock()?;
        let id = entity.id.unwrap_or_else(EntityId::generate);
        let mut stored = entity.clone();
        stored.id = Some(id);

        let table = state.data.tables.entry(entity.entity_type.clone()).or_default();
        match table.iter_mut().find(|e| e.id == Some(id)) {
            Some(existing) => *existing = stored,
            None => table.push(stored),
        }
        debug!("commit {} {}", entity.entity_type, id);
        Ok(id)
    }

    fn delete(&self, entity_type: &str, id: &EntityId) -> StorageResult<()> {
        let mut state = self.lock()?;
        let table = state.data.tables.entry(entity_type.to_string()).or_default();
        let before = table.len();
        table.retain(|e| e.id.as_ref() != Some(id));
        if table.len() == before {
            return Err(StorageError::NotFound {
                entity_type: entity_type.to_string(),
                id: *id,
            });
        }
        debug!("delete {} {}", entity_type, id);
        Ok(())
    }

    fn begin(&self) -> StorageResult<bool> {
        let mut state = self.lock()?;
        if state.snapshot.is_some() {
            return Err(StorageError::Transaction("transaction already open".into()));
        }
        state.snapshot = Some(state.data.clone());
        Ok(true)
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        let mut state = self.lock()?;
        state
            .snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StorageError::Transaction("no open transaction".into()))
    }

    fn rollback(&self) -> StorageResult<()> {
        let mut state = self.lock()?;
        let snapshot = state
            .snapshot
            .take()
            .ok_or_else(|| StorageError::Transaction("no open transaction".into()))?;
        state.data = snapshot;
        debug!("rolled back to snapshot");
        Ok(())
    }
}
