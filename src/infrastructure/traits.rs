//! I/O boundary traits for testability
//!
//! Services only see storage and time through these traits, so tests can
//! swap in fixed clocks and failing stores.

use chrono::{DateTime, Utc};

use crate::domain::{Entity, EntityId, Filter, SortKey};
use crate::infrastructure::error::StorageResult;

/// Storage collaborator for entities.
///
/// Implementations use interior mutability; the engine shares one store
/// behind an `Arc`.
pub trait Storage: Send + Sync {
    /// Fetch one entity, `None` when absent.
    fn get(&self, entity_type: &str, id: &EntityId) -> StorageResult<Option<Entity>>;

    /// Entities of a type matching `filter`, sorted by `order`.
    /// Ties keep insertion order.
    fn list(&self, entity_type: &str, filter: &Filter, order: &[SortKey]) -> StorageResult<Vec<Entity>>;

    /// Insert or update. A missing identity is generated on first commit.
    fn commit(&self, entity: &Entity) -> StorageResult<EntityId>;

    /// Physically remove an entity.
    fn delete(&self, entity_type: &str, id: &EntityId) -> StorageResult<()>;

    /// Open a transaction scope. `false` means the store has none and
    /// writes are applied one by one.
    fn begin(&self) -> StorageResult<bool> {
        Ok(false)
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        Ok(())
    }

    fn rollback(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Source of the current instant for defaults and time-window policies.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
