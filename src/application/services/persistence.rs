//! Persistence orchestrator
//!
//! Commits a valid aggregate in order: root, sub-entities, then each
//! collection (updates, inserts, deletes). Uses the store's transaction
//! scope when it has one; otherwise writes are best-effort and a failure
//! after the root commit leaves the root in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::error::PersistStep;
use crate::application::error_ext::StorageResultExt;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    AggregateDefinition, BoundAggregate, BoundRow, CompositeField, CompositeKind, Entity, EntityId,
    FieldMap, Filter, FormDefinition, SubEntityLink, Value,
};
use crate::infrastructure::error::{StorageError, StorageResult};
use crate::infrastructure::traits::Storage;

/// Aggregate as stored after a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedAggregate {
    pub root: Entity,
    pub subs: BTreeMap<String, Entity>,
    pub collections: BTreeMap<String, Vec<Entity>>,
}

impl CommittedAggregate {
    pub fn root_id(&self) -> Option<EntityId> {
        self.root.id
    }
}

type StepResult<T> = Result<T, (PersistStep, StorageError)>;

fn at<T>(step: &PersistStep, result: StorageResult<T>) -> StepResult<T> {
    result.map_err(|e| (step.clone(), e))
}

pub struct PersistenceOrchestrator {
    storage: Arc<dyn Storage>,
}

impl PersistenceOrchestrator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Commit a validated aggregate. Consumes it: one aggregate, one save.
    #[instrument(level = "debug", skip_all, fields(aggregate = %definition.name))]
    pub fn persist(
        &self,
        definition: &AggregateDefinition,
        aggregate: BoundAggregate,
    ) -> ApplicationResult<CommittedAggregate> {
        if !aggregate.is_valid() {
            return Err(ApplicationError::InvalidAggregate {
                error_count: aggregate.report.error_count(),
            });
        }

        let in_transaction = self.storage.begin().map_err(|source| ApplicationError::FatalStorage {
            step: PersistStep::Begin,
            rolled_back: false,
            source,
        })?;
        debug!("persist: transaction scope={}", in_transaction);

        let root_id = match self.write(definition, &aggregate) {
            Ok(id) => id,
            Err((step, source)) => {
                let rolled_back = in_transaction && self.rollback();
                warn!("persist failed at {}: {} (rolled back: {})", step, source, rolled_back);
                return Err(ApplicationError::FatalStorage {
                    step,
                    rolled_back,
                    source,
                });
            }
        };

        if in_transaction {
            self.storage
                .commit_transaction()
                .map_err(|source| ApplicationError::FatalStorage {
                    step: PersistStep::Commit,
                    rolled_back: self.rollback(),
                    source,
                })?;
        }
        info!("saved {} {}", definition.name, root_id);
        self.reload(definition, &root_id)
    }

    fn rollback(&self) -> bool {
        match self.storage.rollback() {
            Ok(()) => true,
            Err(e) => {
                warn!("rollback failed: {}", e);
                false
            }
        }
    }

    fn write(&self, definition: &AggregateDefinition, aggregate: &BoundAggregate) -> StepResult<EntityId> {
        let root_id = self.write_root(definition, aggregate)?;

        for composite in &definition.composites {
            match &composite.kind {
                CompositeKind::SubEntity(SubEntityLink::SharesRoot) => {}
                CompositeKind::SubEntity(SubEntityLink::BackReference(back_ref)) => {
                    let step = PersistStep::SubEntity(composite.name.clone());
                    let empty = FieldMap::new();
                    let (id, values) = aggregate
                        .subs
                        .get(&composite.name)
                        .map(|s| (s.id, &s.values))
                        .unwrap_or((None, &empty));
                    let mut entity = at(&step, self.base(&composite.entity_type, id))?;
                    assign(&mut entity, &(composite.form)(), values);
                    entity.set(back_ref, Some(Value::Ref(root_id)));
                    at(&step, self.storage.commit(&entity))?;
                    debug!("persist: sub-entity {} committed", composite.name);
                }
                CompositeKind::Collection(spec) => {
                    let step = PersistStep::Collection(composite.name.clone());
                    let rows = aggregate
                        .collection(&composite.name)
                        .map(|c| c.rows.as_slice())
                        .unwrap_or(&[]);
                    at(&step, self.write_rows(composite, &spec.back_reference, rows, &root_id))?;
                }
            }
        }
        Ok(root_id)
    }

    fn write_root(&self, definition: &AggregateDefinition, aggregate: &BoundAggregate) -> StepResult<EntityId> {
        let step = PersistStep::Root;
        let root_form = definition.root_form();
        let mut root = at(&step, self.base(&root_form.entity_type, aggregate.root.id))?;
        assign(&mut root, &root_form, &aggregate.root.values);

        let mut merged = aggregate.root.values.clone();
        for composite in definition.composites.iter().filter(|c| c.shares_root()) {
            if let Some(sub) = aggregate.subs.get(&composite.name) {
                assign(&mut root, &(composite.form)(), &sub.values);
                merged.extend(sub.values.clone());
            }
        }
        for derivation in &definition.derivations {
            derivation.apply(&merged, &mut root);
        }

        let id = at(&step, self.storage.commit(&root))?;
        debug!("persist: root {} committed", id);
        Ok(id)
    }

    /// Updates first, then inserts with the back-reference set, then deletes.
    fn write_rows(
        &self,
        composite: &CompositeField,
        back_ref: &str,
        rows: &[BoundRow],
        root_id: &EntityId,
    ) -> StorageResult<()> {
        let form = (composite.form)();
        let submitted = rows.iter().filter(|r| r.index.is_some() && !r.deleted);
        let (updates, inserts): (Vec<&BoundRow>, Vec<&BoundRow>) = submitted.partition(|r| !r.is_new());

        for row in &updates {
            let mut entity = self.base(&composite.entity_type, row.id)?;
            assign(&mut entity, &form, &row.values);
            entity.set(back_ref, Some(Value::Ref(*root_id)));
            self.storage.commit(&entity)?;
        }
        for row in &inserts {
            let mut entity = Entity::new(composite.entity_type.clone());
            assign(&mut entity, &form, &row.values);
            entity.set(back_ref, Some(Value::Ref(*root_id)));
            self.storage.commit(&entity)?;
        }
        let mut deleted = 0;
        for row in rows.iter().filter(|r| r.deleted) {
            if let Some(id) = &row.id {
                self.storage.delete(&composite.entity_type, id)?;
                deleted += 1;
            }
        }
        debug!(
            "persist: {} updated={}, inserted={}, deleted={}",
            composite.name,
            updates.len(),
            inserts.len(),
            deleted
        );
        Ok(())
    }

    /// The stored entity to update, or a fresh one. Fields the form does
    /// not edit are preserved.
    fn base(&self, entity_type: &str, id: Option<EntityId>) -> StorageResult<Entity> {
        match id {
            None => Ok(Entity::new(entity_type)),
            Some(id) => Ok(self
                .storage
                .get(entity_type, &id)?
                .unwrap_or_else(|| Entity::new(entity_type).with_id(id))),
        }
    }

    /// Re-read the committed root and its children.
    fn reload(&self, definition: &AggregateDefinition, root_id: &EntityId) -> ApplicationResult<CommittedAggregate> {
        let root_type = definition.root_type();
        let root = self
            .storage
            .get(&root_type, root_id)
            .read_context(|| format!("reload {} {}", root_type, root_id))?
            .ok_or_else(|| ApplicationError::NotFound {
                entity_type: root_type.clone(),
                id: *root_id,
            })?;

        let mut subs = BTreeMap::new();
        let mut collections = BTreeMap::new();
        for composite in &definition.composites {
            let Some(back_ref) = composite.back_reference() else {
                continue;
            };
            let order = composite
                .collection_spec()
                .map(|s| s.order_by.clone())
                .unwrap_or_default();
            let children = self
                .storage
                .list(&composite.entity_type, &Filter::field_equals(back_ref, Value::Ref(*root_id)), &order)
                .read_context(|| format!("reload {}", composite.name))?;
            match composite.kind {
                CompositeKind::Collection(_) => {
                    collections.insert(composite.name.clone(), children);
                }
                CompositeKind::SubEntity(_) => {
                    if let Some(child) = children.into_iter().next() {
                        subs.insert(composite.name.clone(), child);
                    }
                }
            }
        }
        Ok(CommittedAggregate {
            root,
            subs,
            collections,
        })
    }
}

/// Copy bound values of persisted form fields onto the entity; absent
/// values clear the stored field.
fn assign(entity: &mut Entity, form: &FormDefinition, values: &FieldMap) {
    for spec in form.persisted_fields() {
        entity.set(&spec.name, values.get(&spec.name).cloned());
    }
}
