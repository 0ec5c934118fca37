//! Filters and sort keys the engine hands to the storage collaborator

use std::cmp::Ordering;

use crate::domain::entities::{Entity, Value};

/// Equality filter over entity fields; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub equals: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field_equals(field: &str, value: Value) -> Self {
        Self {
            equals: vec![(field.to_string(), value)],
        }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| entity.get(field) == Some(expected))
    }
}

/// One ordering key. Absent values sort before present ones ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let ord = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Stable sort by the given keys: ties keep their incoming order.
pub fn sort_entities(entities: &mut [Entity], order: &[SortKey]) {
    entities.sort_by(|a, b| {
        order
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}
