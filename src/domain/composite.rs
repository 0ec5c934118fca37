//! Composite declaration model
//!
//! An aggregate is a root form plus an ordered list of composite fields:
//! sub-entities (one nested entity) and child collections (bounded lists of
//! rows tied to the root by a back-reference). Declarations are checked once
//! against the schema registry when registered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::domain::aggregate::BoundRow;
use crate::domain::derive::FieldDerivation;
use crate::domain::error::DomainError;
use crate::domain::entities::{FieldMap, Value};
use crate::domain::query::SortKey;
use crate::domain::report::{ErrorEntry, ErrorKind};
use crate::domain::rules::CrossEntityRule;
use crate::domain::schema::{FormDefinition, SchemaRegistry};

/// Builds the per-row or per-sub-entity form.
pub type FormFactory = fn() -> FormDefinition;

/// A labelled detail value computed from the root's stored fields.
pub type ComputedDetail = (&'static str, fn(&FieldMap) -> String);

/// How a sub-entity is stored relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubEntityLink {
    /// The sub-form edits fields of the root entity itself.
    SharesRoot,
    /// A separate entity whose named field points at the root.
    BackReference(String),
}

/// Validator run across all retained rows of a collection together.
pub trait RowValidator: Send + Sync + Debug {
    fn validate(&self, rows: &[&BoundRow]) -> Option<ErrorEntry>;
}

/// No two retained rows may share the same values for `fields`.
/// Rows with any key field absent take no part in the check.
#[derive(Debug, Clone)]
pub struct UniqueRowKey {
    pub fields: Vec<String>,
}

impl UniqueRowKey {
    pub fn new(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn key(&self, row: &BoundRow) -> Option<Vec<String>> {
        self.fields
            .iter()
            .map(|f| row.values.get(f).map(Value::to_raw))
            .collect()
    }
}

impl RowValidator for UniqueRowKey {
    fn validate(&self, rows: &[&BoundRow]) -> Option<ErrorEntry> {
        let mut seen = BTreeSet::new();
        let duplicate = rows
            .iter()
            .filter_map(|row| self.key(row))
            .any(|key| !seen.insert(key));
        duplicate.then(|| {
            ErrorEntry::new(
                ErrorKind::Duplicate,
                "unique",
                "Please correct the duplicate values below.",
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub back_reference: String,
    pub min_rows: usize,
    pub max_rows: Option<usize>,
    /// Hydration order; ties fall back to insertion order.
    pub order_by: Vec<SortKey>,
    pub row_validator: Option<Arc<dyn RowValidator>>,
}

impl CollectionSpec {
    pub fn new(back_reference: &str) -> Self {
        Self {
            back_reference: back_reference.into(),
            min_rows: 0,
            max_rows: None,
            order_by: Vec::new(),
            row_validator: None,
        }
    }

    pub fn min_rows(mut self, min: usize) -> Self {
        self.min_rows = min;
        self
    }

    pub fn max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order_by.push(key);
        self
    }

    pub fn validator(mut self, validator: impl RowValidator + 'static) -> Self {
        self.row_validator = Some(Arc::new(validator));
        self
    }
}

#[derive(Debug, Clone)]
pub enum CompositeKind {
    SubEntity(SubEntityLink),
    Collection(CollectionSpec),
}

/// One composite field descriptor.
#[derive(Debug, Clone)]
pub struct CompositeField {
    pub name: String,
    pub entity_type: String,
    pub label: Option<String>,
    pub kind: CompositeKind,
    pub form: FormFactory,
}

impl CompositeField {
    pub fn sub_entity(name: &str, entity_type: &str, link: SubEntityLink, form: FormFactory) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            label: None,
            kind: CompositeKind::SubEntity(link),
            form,
        }
    }

    pub fn collection(name: &str, entity_type: &str, spec: CollectionSpec, form: FormFactory) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            label: None,
            kind: CompositeKind::Collection(spec),
            form,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn back_reference(&self) -> Option<&str> {
        match &self.kind {
            CompositeKind::SubEntity(SubEntityLink::BackReference(f)) => Some(f),
            CompositeKind::Collection(spec) => Some(&spec.back_reference),
            CompositeKind::SubEntity(SubEntityLink::SharesRoot) => None,
        }
    }

    pub fn collection_spec(&self) -> Option<&CollectionSpec> {
        match &self.kind {
            CompositeKind::Collection(spec) => Some(spec),
            CompositeKind::SubEntity(_) => None,
        }
    }

    pub fn shares_root(&self) -> bool {
        matches!(self.kind, CompositeKind::SubEntity(SubEntityLink::SharesRoot))
    }
}

/// Root form, composites, rules and derivations of one aggregate.
#[derive(Debug, Clone)]
pub struct AggregateDefinition {
    pub name: String,
    pub root: FormFactory,
    pub composites: Vec<CompositeField>,
    pub rules: Vec<Arc<dyn CrossEntityRule>>,
    pub derivations: Vec<Arc<dyn FieldDerivation>>,
    /// Root fields listed as detail rows; empty means every root field.
    pub detail_fields: Vec<String>,
    pub computed_details: Vec<ComputedDetail>,
}

impl AggregateDefinition {
    pub fn new(name: &str, root: FormFactory) -> Self {
        Self {
            name: name.into(),
            root,
            composites: Vec::new(),
            rules: Vec::new(),
            derivations: Vec::new(),
            detail_fields: Vec::new(),
            computed_details: Vec::new(),
        }
    }

    pub fn composite(mut self, composite: CompositeField) -> Self {
        self.composites.push(composite);
        self
    }

    pub fn rule(mut self, rule: impl CrossEntityRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn derivation(mut self, derivation: impl FieldDerivation + 'static) -> Self {
        self.derivations.push(Arc::new(derivation));
        self
    }

    pub fn detail_fields(mut self, fields: &[&str]) -> Self {
        self.detail_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn computed_detail(mut self, label: &'static str, compute: fn(&FieldMap) -> String) -> Self {
        self.computed_details.push((label, compute));
        self
    }

    pub fn root_form(&self) -> FormDefinition {
        (self.root)()
    }

    pub fn root_type(&self) -> String {
        self.root_form().entity_type
    }

    pub fn get_composite(&self, name: &str) -> Option<&CompositeField> {
        self.composites.iter().find(|c| c.name == name)
    }

    /// Check the declaration against stored schemas.
    pub fn check(&self, schemas: &SchemaRegistry) -> Result<(), DomainError> {
        let root_form = self.root_form();
        schemas.check_form(&root_form)?;
        let root_type = root_form.entity_type;

        let mut names = BTreeSet::new();
        for composite in &self.composites {
            if !names.insert(composite.name.as_str()) {
                return Err(DomainError::DuplicateComposite {
                    aggregate: self.name.clone(),
                    composite: composite.name.clone(),
                });
            }

            let form = (composite.form)();
            if composite.shares_root() {
                schemas.check_form(&FormDefinition {
                    entity_type: root_type.clone(),
                    ..form
                })?;
                continue;
            }
            schemas.check_form(&form)?;

            if let Some(spec) = composite.collection_spec() {
                if let Some(max) = spec.max_rows {
                    if spec.min_rows > max {
                        return Err(DomainError::InvalidCardinality {
                            composite: composite.name.clone(),
                            min: spec.min_rows,
                            max,
                        });
                    }
                }
            }

            if let Some(back_ref) = composite.back_reference() {
                let child = schemas.get(&composite.entity_type)?;
                let field = child.fields.get(back_ref).ok_or_else(|| {
                    DomainError::UnknownBackReference {
                        composite: composite.name.clone(),
                        child_type: composite.entity_type.clone(),
                        field: back_ref.to_string(),
                    }
                })?;
                match &field.references {
                    Some(target) if *target == root_type => {}
                    other => {
                        return Err(DomainError::BackReferenceTargetMismatch {
                            composite: composite.name.clone(),
                            field: back_ref.to_string(),
                            expected: root_type.clone(),
                            actual: other.clone().unwrap_or_else(|| "nothing".into()),
                        })
                    }
                }
            }
        }
        Ok(())
    }
}

/// All aggregates known to the application, validated on registration.
#[derive(Debug, Clone, Default)]
pub struct CompositeRegistry {
    schemas: SchemaRegistry,
    aggregates: BTreeMap<String, AggregateDefinition>,
}

impl CompositeRegistry {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self {
            schemas,
            aggregates: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, definition: AggregateDefinition) -> Result<(), DomainError> {
        debug!("register aggregate: {}", definition.name);
        definition.check(&self.schemas)?;
        self.aggregates.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&AggregateDefinition, DomainError> {
        self.aggregates
            .get(name)
            .ok_or_else(|| DomainError::UnknownAggregate(name.to_string()))
    }

    /// Ordered composite descriptors for an aggregate.
    pub fn composites_for(&self, name: &str) -> Result<&[CompositeField], DomainError> {
        self.get(name).map(|d| d.composites.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.aggregates.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{EntitySchema, FieldSpec};

    fn poll_form() -> FormDefinition {
        FormDefinition::new("poll").field(FieldSpec::text("title", 50))
    }

    fn option_form() -> FormDefinition {
        FormDefinition::new("option").field(FieldSpec::text("label", 50))
    }

    fn schemas(back_ref_target: &str) -> SchemaRegistry {
        let mut schemas = SchemaRegistry::new();
        schemas.register(EntitySchema::new("poll").field("title"));
        schemas.register(
            EntitySchema::new("option")
                .field("label")
                .reference("poll", back_ref_target),
        );
        schemas
    }

    fn definition(back_ref: &str) -> AggregateDefinition {
        AggregateDefinition::new("poll", poll_form).composite(CompositeField::collection(
            "options",
            "option",
            CollectionSpec::new(back_ref).min_rows(2),
            option_form,
        ))
    }

    #[test]
    fn given_valid_declaration_when_registering_then_composites_listed() {
        let mut registry = CompositeRegistry::new(schemas("poll"));

        registry.register(definition("poll")).unwrap();

        let composites = registry.composites_for("poll").unwrap();
        assert_eq!(composites.len(), 1);
        assert_eq!(composites[0].back_reference(), Some("poll"));
    }

    #[test]
    fn given_missing_back_reference_when_registering_then_fails() {
        let mut registry = CompositeRegistry::new(schemas("poll"));

        let result = registry.register(definition("survey"));

        assert!(matches!(result, Err(DomainError::UnknownBackReference { .. })));
    }

    #[test]
    fn given_back_reference_to_other_type_when_registering_then_fails() {
        let mut registry = CompositeRegistry::new(schemas("user"));

        let result = registry.register(definition("poll"));

        assert!(matches!(result, Err(DomainError::BackReferenceTargetMismatch { .. })));
    }

    #[test]
    fn given_rows_sharing_key_when_validating_unique_then_one_duplicate() {
        let row = |follower: Option<&str>| BoundRow {
            index: Some(0),
            id: None,
            deleted: false,
            values: follower
                .map(|f| FieldMap::from([("follower".to_string(), Value::Text(f.into()))]))
                .unwrap_or_default(),
        };
        let rows = [row(Some("a")), row(None), row(Some("b")), row(None), row(Some("a"))];
        let refs: Vec<&BoundRow> = rows.iter().collect();

        let error = UniqueRowKey::new(&["follower"]).validate(&refs);

        assert_eq!(error.map(|e| e.kind), Some(ErrorKind::Duplicate));
    }
}
