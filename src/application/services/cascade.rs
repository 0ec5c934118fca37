//! Bind & validate cascade
//!
//! Binds a submission against the initial-values snapshot: root fields,
//! then sub-entities, then collection rows, then cross-entity rules, then
//! the summary. Never touches storage, so it can run any number of times.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::domain::policy::{DisabledValue, FieldConstraints, FieldState};
use crate::domain::rules::apply_rules;
use crate::domain::{
    AggregateDefinition, BoundAggregate, BoundCollection, BoundEntity, BoundRow, CollectionSpec,
    CompositeField, CompositeKind, EntityId, ErrorEntry, ErrorKind, ErrorReport, FieldMap,
    FieldPath, FormDefinition, InitialValues, Submission,
};
use crate::infrastructure::traits::Clock;

/// Binds submissions into [`BoundAggregate`]s. Holds only the clock, used
/// for "now" in conditional policies.
pub struct BindValidateService {
    clock: Arc<dyn Clock>,
}

impl BindValidateService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Bind `submission` over `initial` and collect every error.
    ///
    /// The returned aggregate is valid only when its report is empty; an
    /// invalid one carries the "N errors below" summary.
    #[instrument(level = "debug", skip_all, fields(aggregate = %definition.name))]
    pub fn bind(
        &self,
        definition: &AggregateDefinition,
        initial: &InitialValues,
        submission: &Submission,
    ) -> BoundAggregate {
        let now = self.clock.now();
        let mut aggregate = BoundAggregate::new(&definition.name, initial.root_id);

        aggregate.root.values = bind_form(
            &definition.root_form(),
            &|field| submission.root(field),
            &initial.root,
            &FieldPath::Root,
            now,
            &mut aggregate.report,
        );
        check_derivations(definition, &mut aggregate);

        for composite in &definition.composites {
            match &composite.kind {
                CompositeKind::SubEntity(_) => {
                    let sub = bind_sub(composite, initial, submission, now, &mut aggregate.report);
                    aggregate.subs.insert(composite.name.clone(), sub);
                }
                CompositeKind::Collection(spec) => {
                    let collection =
                        bind_collection(composite, spec, initial, submission, now, &mut aggregate.report);
                    aggregate.collections.insert(composite.name.clone(), collection);
                }
            }
        }

        let local_errors = aggregate.report.error_count();
        apply_rules(&definition.rules, &mut aggregate);
        aggregate.report.summarize();
        debug!(
            "bind: {} local errors, {} total",
            local_errors,
            aggregate.report.error_count()
        );
        aggregate
    }
}

/// Derived form-only fields whose bound values cannot be written back get a
/// field error, unless the field already has one.
fn check_derivations(definition: &AggregateDefinition, aggregate: &mut BoundAggregate) {
    for derivation in &definition.derivations {
        let path = FieldPath::root(derivation.field());
        if aggregate.report.has_errors_at(&path) {
            continue;
        }
        if let Some(entry) = derivation.check(&aggregate.root.values) {
            aggregate.report.add(path, entry);
        }
    }
}

/// Bind one form's fields. Driver values for conditional rules come from
/// the same submission, so in-progress edits are honored.
fn bind_form<'s>(
    form: &FormDefinition,
    raw: &dyn Fn(&str) -> Option<&'s str>,
    initial: &FieldMap,
    path: &dyn Fn(String) -> FieldPath,
    now: DateTime<Utc>,
    report: &mut ErrorReport,
) -> FieldMap {
    let driver = |name: &str| {
        form.spec(name)
            .and_then(|spec| spec.kind.parse(raw(name)).ok().flatten())
            .or_else(|| initial.get(name).cloned())
    };
    let constraints = FieldConstraints::resolve(&form.policies, &driver, now);

    let mut values = FieldMap::new();
    for spec in &form.fields {
        let state = constraints.state_for(spec);
        let value = match state {
            FieldState::Disabled(DisabledValue::Clear) => None,
            FieldState::Disabled(DisabledValue::KeepInitial) => {
                let kept = initial.get(&spec.name).cloned();
                if kept.is_none() && spec.required {
                    report.add(path(spec.name.clone()), ErrorEntry::required());
                }
                kept
            }
            FieldState::Enabled { required } => match spec.kind.parse(raw(&spec.name)) {
                Ok(None) if required => {
                    report.add(path(spec.name.clone()), ErrorEntry::required());
                    None
                }
                Ok(value) => value,
                Err(entry) => {
                    report.add(path(spec.name.clone()), entry);
                    None
                }
            },
        };
        if let Some(value) = value {
            if let Some(entry) = spec.kind.check_bounds(&value) {
                report.add(path(spec.name.clone()), entry);
            }
            values.insert(spec.name.clone(), value);
        }
    }
    values
}

/// Bind one sub-entity form under its composite namespace.
fn bind_sub(
    composite: &CompositeField,
    initial: &InitialValues,
    submission: &Submission,
    now: DateTime<Utc>,
    report: &mut ErrorReport,
) -> BoundEntity {
    let empty = FieldMap::new();
    let (id, initial_values) = initial
        .sub(&composite.name)
        .map(|(id, values)| (id.copied(), values))
        .unwrap_or((None, &empty));
    let name = composite.name.as_str();
    let values = bind_form(
        &(composite.form)(),
        &|field| submission.sub(name, field),
        initial_values,
        &|field| FieldPath::sub(name, field),
        now,
        report,
    );
    BoundEntity { id, values }
}

/// Bind the submitted rows of one collection, carry over unmentioned stored
/// rows, then check cardinality and the row validator.
///
/// A row whose `id` is unknown or already claimed by an earlier row is not
/// bound, but still counts towards cardinality unless marked deleted.
fn bind_collection(
    composite: &CompositeField,
    spec: &CollectionSpec,
    initial: &InitialValues,
    submission: &Submission,
    now: DateTime<Utc>,
    report: &mut ErrorReport,
) -> BoundCollection {
    let name = composite.name.as_str();
    let form = (composite.form)();
    let empty = FieldMap::new();
    let mut rows = Vec::new();
    let mut mentioned: BTreeSet<EntityId> = BTreeSet::new();
    let mut unbound = 0;

    for index in submission.row_indices(name) {
        let id = match submission.row_id(name, index) {
            None => None,
            Some(raw) => match raw
                .parse::<EntityId>()
                .ok()
                .filter(|id| initial.row_by_id(name, id).is_some() && mentioned.insert(*id))
            {
                Some(id) => Some(id),
                None => {
                    report.add(
                        FieldPath::row(name, index, "id"),
                        ErrorEntry::field(
                            "invalid_choice",
                            "Select a valid choice. That choice is not one of the available choices.",
                        ),
                    );
                    if !submission.is_deleted(name, index) {
                        unbound += 1;
                    }
                    continue;
                }
            },
        };
        let stored = id
            .as_ref()
            .and_then(|id| initial.row_by_id(name, id))
            .map(|r| &r.values)
            .unwrap_or(&empty);

        if submission.is_deleted(name, index) {
            rows.push(BoundRow {
                index: Some(index),
                id,
                deleted: true,
                values: stored.clone(),
            });
            continue;
        }

        let blank = form
            .fields
            .iter()
            .all(|f| submission.row(name, index, &f.name).map_or(true, |r| r.trim().is_empty()));
        if id.is_none() && blank {
            continue;
        }

        let values = bind_form(
            &form,
            &|field| submission.row(name, index, field),
            stored,
            &|field| FieldPath::row(name, index, field),
            now,
            report,
        );
        rows.push(BoundRow {
            index: Some(index),
            id,
            deleted: false,
            values,
        });
    }

    // Stored rows the submission never mentions stay as they are.
    for stored in initial.rows(name) {
        if !mentioned.contains(&stored.id) {
            rows.push(BoundRow {
                index: None,
                id: Some(stored.id),
                deleted: false,
                values: stored.values.clone(),
            });
        }
    }

    let collection = BoundCollection { rows };
    let retained = collection.retained_count() + unbound;
    if retained < spec.min_rows {
        report.add(
            FieldPath::root(name),
            ErrorEntry::new(
                ErrorKind::Cardinality,
                "too_few_rows",
                format!("Please submit at least {} form(s).", spec.min_rows),
            ),
        );
    }
    if let Some(max) = spec.max_rows {
        if retained > max {
            report.add(
                FieldPath::root(name),
                ErrorEntry::new(
                    ErrorKind::Cardinality,
                    "too_many_rows",
                    format!("Please submit at most {max} form(s)."),
                ),
            );
        }
    }

    if let Some(validator) = &spec.row_validator {
        let retained_rows: Vec<&BoundRow> = collection.retained().collect();
        if let Some(entry) = validator.validate(&retained_rows) {
            report.add(FieldPath::Collection(name.to_string()), entry);
        }
    }
    collection
}
