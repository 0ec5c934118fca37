//! Initial-values snapshot and the bound aggregate

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::entities::{EntityId, FieldMap, Value};
use crate::domain::report::{ErrorReport, FieldPath};

/// One existing child row as hydrated from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialRow {
    pub id: EntityId,
    pub values: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeInitial {
    Sub {
        id: Option<EntityId>,
        values: FieldMap,
    },
    Collection {
        rows: Vec<InitialRow>,
        /// Default values for a blank extra row.
        blank: FieldMap,
        min_rows: usize,
    },
}

/// Snapshot of an aggregate before binding. Owned data: later store
/// mutations do not reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialValues {
    pub aggregate: String,
    pub root_id: Option<EntityId>,
    pub root: FieldMap,
    pub composites: BTreeMap<String, CompositeInitial>,
}

impl InitialValues {
    pub fn is_update(&self) -> bool {
        self.root_id.is_some()
    }

    pub fn sub(&self, composite: &str) -> Option<(Option<&EntityId>, &FieldMap)> {
        match self.composites.get(composite) {
            Some(CompositeInitial::Sub { id, values }) => Some((id.as_ref(), values)),
            _ => None,
        }
    }

    pub fn rows(&self, composite: &str) -> &[InitialRow] {
        match self.composites.get(composite) {
            Some(CompositeInitial::Collection { rows, .. }) => rows,
            _ => &[],
        }
    }

    pub fn row_by_id(&self, composite: &str, id: &EntityId) -> Option<&InitialRow> {
        self.rows(composite).iter().find(|r| &r.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundEntity {
    pub id: Option<EntityId>,
    pub values: FieldMap,
}

impl BoundEntity {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// One collection row after binding.
///
/// `index` is the submitted row index; rows carried over from storage
/// without being mentioned in the submission have none.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRow {
    pub index: Option<usize>,
    pub id: Option<EntityId>,
    pub deleted: bool,
    pub values: FieldMap,
}

impl BoundRow {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundCollection {
    pub rows: Vec<BoundRow>,
}

impl BoundCollection {
    /// Rows that survive the save.
    pub fn retained(&self) -> impl Iterator<Item = &BoundRow> {
        self.rows.iter().filter(|r| !r.deleted)
    }

    pub fn retained_count(&self) -> usize {
        self.retained().count()
    }

    /// Existing rows marked for physical removal.
    pub fn removed_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.rows
            .iter()
            .filter(|r| r.deleted)
            .filter_map(|r| r.id.as_ref())
    }
}

/// Reference to a scalar field of the aggregate, used by cross-entity rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Root(String),
    Sub { composite: String, field: String },
}

impl FieldRef {
    pub fn root(field: &str) -> Self {
        FieldRef::Root(field.to_string())
    }

    pub fn sub(composite: &str, field: &str) -> Self {
        FieldRef::Sub {
            composite: composite.to_string(),
            field: field.to_string(),
        }
    }

    pub fn path(&self) -> FieldPath {
        match self {
            FieldRef::Root(field) => FieldPath::root(field.clone()),
            FieldRef::Sub { composite, field } => FieldPath::sub(composite.clone(), field.clone()),
        }
    }
}

/// Root plus composites bound from one submission, with its error report.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAggregate {
    pub aggregate: String,
    pub root: BoundEntity,
    pub subs: BTreeMap<String, BoundEntity>,
    pub collections: BTreeMap<String, BoundCollection>,
    pub report: ErrorReport,
}

impl BoundAggregate {
    pub fn new(aggregate: &str, root_id: Option<EntityId>) -> Self {
        Self {
            aggregate: aggregate.to_string(),
            root: BoundEntity {
                id: root_id,
                values: FieldMap::new(),
            },
            subs: BTreeMap::new(),
            collections: BTreeMap::new(),
            report: ErrorReport::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.report.is_empty()
    }

    pub fn value(&self, field: &FieldRef) -> Option<&Value> {
        match field {
            FieldRef::Root(name) => self.root.get(name),
            FieldRef::Sub { composite, field } => self.subs.get(composite).and_then(|s| s.get(field)),
        }
    }

    pub fn collection(&self, composite: &str) -> Option<&BoundCollection> {
        self.collections.get(composite)
    }

    pub fn retained_rows(&self, composite: &str) -> usize {
        self.collection(composite)
            .map(BoundCollection::retained_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Option<EntityId>, deleted: bool) -> BoundRow {
        BoundRow {
            index: Some(0),
            id,
            deleted,
            values: FieldMap::new(),
        }
    }

    #[test]
    fn given_deleted_rows_when_counting_then_only_retained_counted() {
        let existing = EntityId::generate();
        let collection = BoundCollection {
            rows: vec![row(None, false), row(Some(existing), true), row(None, true)],
        };

        assert_eq!(collection.retained_count(), 1);
        assert_eq!(collection.removed_ids().collect::<Vec<_>>(), vec![&existing]);
    }

    #[test]
    fn given_sub_value_when_looking_up_field_ref_then_reads_sub_entity() {
        let mut aggregate = BoundAggregate::new("question", None);
        let mut control = BoundEntity::default();
        control.values.insert("max_vote_count".into(), Value::Int(5));
        aggregate.subs.insert("max_vote_count_control".into(), control);

        let value = aggregate.value(&FieldRef::sub("max_vote_count_control", "max_vote_count"));

        assert_eq!(value, Some(&Value::Int(5)));
        assert_eq!(aggregate.value(&FieldRef::root("max_vote_count")), None);
    }
}
