//! Aggregate initializer
//!
//! Produces the initial-values snapshot for a create (defaults) or an
//! update (current root plus its children in declared order).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::application::error_ext::StorageResultExt;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    AggregateDefinition, CompositeField, CompositeInitial, CompositeKind, Entity, EntityId,
    FieldMap, Filter, FormDefinition, InitialRow, InitialValues, SortKey, SubEntityLink, Value,
};
use crate::infrastructure::traits::{Clock, Storage};

/// Reads stored aggregates into owned [`InitialValues`] snapshots.
pub struct AggregateInitializer {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl AggregateInitializer {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Snapshot for `root_id`, or defaults when none is given.
    pub fn initial(
        &self,
        definition: &AggregateDefinition,
        root_id: Option<&EntityId>,
    ) -> ApplicationResult<InitialValues> {
        debug!("initial: aggregate={}, root_id={:?}", definition.name, root_id);
        match root_id {
            None => Ok(self.defaults(definition)),
            Some(id) => self.hydrate(definition, id),
        }
    }

    /// Type defaults for the root and every composite; collections start empty.
    fn defaults(&self, definition: &AggregateDefinition) -> InitialValues {
        let now = self.clock.now();
        let composites = definition
            .composites
            .iter()
            .map(|c| (c.name.clone(), default_composite(c, now)))
            .collect();
        InitialValues {
            aggregate: definition.name.clone(),
            root_id: None,
            root: definition.root_form().defaults(now),
            composites,
        }
    }

    /// Current root values, derived form-only fields, then each composite in
    /// declaration order. A missing root is `NotFound`.
    fn hydrate(&self, definition: &AggregateDefinition, id: &EntityId) -> ApplicationResult<InitialValues> {
        let now = self.clock.now();
        let root_form = definition.root_form();
        let stored = self
            .storage
            .get(&root_form.entity_type, id)
            .read_context(|| format!("load {} {}", root_form.entity_type, id))?
            .ok_or_else(|| ApplicationError::NotFound {
                entity_type: root_form.entity_type.clone(),
                id: *id,
            })?;

        let mut root = form_values(&root_form, &stored.fields);
        for derivation in &definition.derivations {
            if root_form.spec(derivation.field()).is_some() {
                if let Some(value) = derivation.hydrate(&stored) {
                    root.insert(derivation.field().to_string(), value);
                }
            }
        }

        let mut composites = BTreeMap::new();
        for composite in &definition.composites {
            let initial = self.hydrate_composite(composite, &stored, id, now)?;
            composites.insert(composite.name.clone(), initial);
        }

        let rows: usize = composites
            .values()
            .map(|c| match c {
                CompositeInitial::Collection { rows, .. } => rows.len(),
                CompositeInitial::Sub { .. } => 0,
            })
            .sum();
        debug!("hydrate: {} {} with {} child rows", definition.name, id, rows);

        Ok(InitialValues {
            aggregate: definition.name.clone(),
            root_id: Some(*id),
            root,
            composites,
        })
    }

    /// A shared-root sub-entity reads the root's own fields; back-referenced
    /// subs and collections are listed from storage.
    fn hydrate_composite(
        &self,
        composite: &CompositeField,
        stored_root: &Entity,
        root_id: &EntityId,
        now: DateTime<Utc>,
    ) -> ApplicationResult<CompositeInitial> {
        let form = (composite.form)();
        match &composite.kind {
            CompositeKind::SubEntity(SubEntityLink::SharesRoot) => Ok(CompositeInitial::Sub {
                id: None,
                values: form_values(&form, &stored_root.fields),
            }),
            CompositeKind::SubEntity(SubEntityLink::BackReference(back_ref)) => {
                let children = self.children(composite, back_ref, root_id, &[])?;
                Ok(match children.into_iter().next() {
                    Some(child) => CompositeInitial::Sub {
                        id: child.id,
                        values: form_values(&form, &child.fields),
                    },
                    None => CompositeInitial::Sub {
                        id: None,
                        values: form.defaults(now),
                    },
                })
            }
            CompositeKind::Collection(spec) => {
                let children = self.children(composite, &spec.back_reference, root_id, &spec.order_by)?;
                let rows = children
                    .into_iter()
                    .filter_map(|child| {
                        child.id.map(|id| InitialRow {
                            id,
                            values: form_values(&form, &child.fields),
                        })
                    })
                    .collect();
                Ok(CompositeInitial::Collection {
                    rows,
                    blank: form.defaults(now),
                    min_rows: spec.min_rows,
                })
            }
        }
    }

    /// Children of `root_id` through `back_ref`, sorted by `order`.
    fn children(
        &self,
        composite: &CompositeField,
        back_ref: &str,
        root_id: &EntityId,
        order: &[SortKey],
    ) -> ApplicationResult<Vec<Entity>> {
        let filter = Filter::field_equals(back_ref, Value::Ref(*root_id));
        self.storage
            .list(&composite.entity_type, &filter, order)
            .read_context(|| format!("list {} of {}", composite.name, root_id))
    }
}

fn default_composite(composite: &CompositeField, now: DateTime<Utc>) -> CompositeInitial {
    let form = (composite.form)();
    match &composite.kind {
        CompositeKind::SubEntity(_) => CompositeInitial::Sub {
            id: None,
            values: form.defaults(now),
        },
        CompositeKind::Collection(spec) => CompositeInitial::Collection {
            rows: Vec::new(),
            blank: form.defaults(now),
            min_rows: spec.min_rows,
        },
    }
}

/// Stored values restricted to the fields a form edits.
fn form_values(form: &FormDefinition, stored: &FieldMap) -> FieldMap {
    form.fields
        .iter()
        .filter_map(|spec| stored.get(&spec.name).map(|v| (spec.name.clone(), v.clone())))
        .collect()
}
