//! Cross-entity business rules
//!
//! Whole-aggregate checks run after local binding. A rule whose referenced
//! fields already carry errors is skipped, so one bad value does not produce
//! a cascade of follow-up messages.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use crate::domain::aggregate::{BoundAggregate, FieldRef};
use crate::domain::report::{ErrorEntry, ErrorKind, ErrorReport, FieldPath};

pub trait CrossEntityRule: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Fields the rule reads; used for the skip-on-invalid check.
    fn references(&self) -> Vec<FieldRef>;

    /// Violations found, at most one per field.
    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)>;
}

/// Run rules in declaration order. Errors from an earlier rule count as
/// "already invalid" for a later one.
pub fn apply_rules(rules: &[Arc<dyn CrossEntityRule>], aggregate: &mut BoundAggregate) {
    for rule in rules {
        let blocked = rule
            .references()
            .iter()
            .any(|r| aggregate.report.has_errors_at(&r.path()));
        if blocked {
            tracing::debug!(rule = rule.name(), "skipping rule on already invalid field");
            continue;
        }
        let violations = rule.check(aggregate);
        for (path, entry) in violations {
            aggregate.report.add(path, entry);
        }
    }
}

fn compare_present(aggregate: &BoundAggregate, a: &FieldRef, b: &FieldRef) -> Option<Ordering> {
    let a = aggregate.value(a)?;
    let b = aggregate.value(b)?;
    a.compare(b)
}

fn flag_set(aggregate: &BoundAggregate, flag: &FieldRef) -> bool {
    aggregate
        .value(flag)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Start must not be after end when both are present.
#[derive(Debug, Clone)]
pub struct OrderingRule {
    pub start: FieldRef,
    pub end: FieldRef,
    pub code: String,
    pub message: String,
}

impl OrderingRule {
    pub fn new(start: FieldRef, end: FieldRef) -> Self {
        Self {
            start,
            end,
            code: "end_too_early".into(),
            message: "Ensure this time is later than the start.".into(),
        }
    }

    pub fn with_error(mut self, code: &str, message: &str) -> Self {
        self.code = code.into();
        self.message = message.into();
        self
    }
}

impl CrossEntityRule for OrderingRule {
    fn name(&self) -> &str {
        "ordering"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.start.clone(), self.end.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        match compare_present(aggregate, &self.start, &self.end) {
            Some(Ordering::Greater) => vec![(
                self.end.path(),
                ErrorEntry::cross_entity(&self.code, &self.message),
            )],
            _ => Vec::new(),
        }
    }
}

/// When `flag` is set, `value` must be present and non-negative.
///
/// Missing is a RequiredError coded `<field>_required`; negative is a
/// cross-entity error coded `<field>_positive`.
#[derive(Debug, Clone)]
pub struct ConditionalRequirementRule {
    pub flag: FieldRef,
    pub value: FieldRef,
}

impl ConditionalRequirementRule {
    pub fn new(flag: FieldRef, value: FieldRef) -> Self {
        Self { flag, value }
    }

    fn field_name(&self) -> &str {
        match &self.value {
            FieldRef::Root(f) | FieldRef::Sub { field: f, .. } => f,
        }
    }
}

impl CrossEntityRule for ConditionalRequirementRule {
    fn name(&self) -> &str {
        "conditional-requirement"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.flag.clone(), self.value.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        let field = self.field_name();
        match aggregate.value(&self.value) {
            None if flag_set(aggregate, &self.flag) => vec![(
                self.value.path(),
                ErrorEntry::new(
                    ErrorKind::Required,
                    format!("{field}_required"),
                    "This field is required.",
                ),
            )],
            Some(v) if v.as_float().is_some_and(|n| n < 0.0) => vec![(
                self.value.path(),
                ErrorEntry::cross_entity(format!("{field}_positive"), "Ensure this value is positive."),
            )],
            _ => Vec::new(),
        }
    }
}

/// Lower bound must not exceed upper bound; error lands on the upper one.
#[derive(Debug, Clone)]
pub struct RangeContainmentRule {
    pub lower: FieldRef,
    pub upper: FieldRef,
    pub code: String,
    pub message: String,
}

impl RangeContainmentRule {
    pub fn new(lower: FieldRef, upper: FieldRef, code: &str, message: &str) -> Self {
        Self {
            lower,
            upper,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl CrossEntityRule for RangeContainmentRule {
    fn name(&self) -> &str {
        "range-containment"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.lower.clone(), self.upper.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        match compare_present(aggregate, &self.lower, &self.upper) {
            Some(Ordering::Greater) => vec![(
                self.upper.path(),
                ErrorEntry::cross_entity(&self.code, &self.message),
            )],
            _ => Vec::new(),
        }
    }
}

/// A lower bound must not exceed the retained row count of a collection.
#[derive(Debug, Clone)]
pub struct CollectionBoundRule {
    pub lower: FieldRef,
    pub collection: String,
    pub code: String,
    /// Message template; `{len}` is replaced by the retained row count.
    pub message: String,
}

impl CollectionBoundRule {
    pub fn new(lower: FieldRef, collection: &str, code: &str, message: &str) -> Self {
        Self {
            lower,
            collection: collection.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

impl CrossEntityRule for CollectionBoundRule {
    fn name(&self) -> &str {
        "collection-bound"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.lower.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        let len = aggregate.retained_rows(&self.collection);
        match aggregate.value(&self.lower).and_then(|v| v.as_int()) {
            Some(lower) if lower > len as i64 => vec![(
                self.lower.path(),
                ErrorEntry::cross_entity(&self.code, self.message.replace("{len}", &len.to_string())),
            )],
            _ => Vec::new(),
        }
    }
}

/// With `flag` set and a maximum present, `total` must not exceed it.
#[derive(Debug, Clone)]
pub struct CapacityRule {
    pub flag: FieldRef,
    pub maximum: FieldRef,
    pub total: FieldRef,
    pub code: String,
    pub message: String,
}

impl CapacityRule {
    pub fn new(flag: FieldRef, maximum: FieldRef, total: FieldRef, code: &str, message: &str) -> Self {
        Self {
            flag,
            maximum,
            total,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl CrossEntityRule for CapacityRule {
    fn name(&self) -> &str {
        "capacity"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.flag.clone(), self.maximum.clone(), self.total.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        if !flag_set(aggregate, &self.flag) {
            return Vec::new();
        }
        match compare_present(aggregate, &self.total, &self.maximum) {
            Some(Ordering::Greater) => vec![(
                self.maximum.path(),
                ErrorEntry::cross_entity(&self.code, &self.message),
            )],
            _ => Vec::new(),
        }
    }
}

/// `dependent` is required whenever `trigger` has a value.
#[derive(Debug, Clone)]
pub struct DependentPresenceRule {
    pub trigger: FieldRef,
    pub dependent: FieldRef,
    pub message: String,
}

impl DependentPresenceRule {
    pub fn new(trigger: FieldRef, dependent: FieldRef, message: &str) -> Self {
        Self {
            trigger,
            dependent,
            message: message.into(),
        }
    }
}

impl CrossEntityRule for DependentPresenceRule {
    fn name(&self) -> &str {
        "dependent-presence"
    }

    fn references(&self) -> Vec<FieldRef> {
        vec![self.trigger.clone(), self.dependent.clone()]
    }

    fn check(&self, aggregate: &BoundAggregate) -> Vec<(FieldPath, ErrorEntry)> {
        let triggered = aggregate.value(&self.trigger).is_some();
        if triggered && aggregate.value(&self.dependent).is_none() {
            vec![(
                self.dependent.path(),
                ErrorEntry::new(ErrorKind::Required, "required", &self.message),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Total cross-entity errors in a report.
pub fn cross_entity_count(report: &ErrorReport) -> usize {
    report.count_kind(ErrorKind::CrossEntity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::{BoundCollection, BoundRow};
    use crate::domain::entities::{FieldMap, Value};
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> Value {
        Value::DateTime(Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap())
    }

    fn aggregate_with(fields: &[(&str, Value)]) -> BoundAggregate {
        let mut aggregate = BoundAggregate::new("question", None);
        for (name, value) in fields {
            aggregate.root.values.insert(name.to_string(), value.clone());
        }
        aggregate
    }

    #[test]
    fn given_start_after_end_when_checking_ordering_then_error_on_end() {
        let aggregate = aggregate_with(&[("vote_start", day(10)), ("vote_end", day(5))]);
        let rule = OrderingRule::new(FieldRef::root("vote_start"), FieldRef::root("vote_end"));

        let violations = rule.check(&aggregate);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].0, FieldPath::root("vote_end"));
        assert_eq!(violations[0].1.kind, ErrorKind::CrossEntity);
    }

    #[test]
    fn given_start_before_end_when_checking_ordering_then_no_error() {
        let aggregate = aggregate_with(&[("vote_start", day(5)), ("vote_end", day(10))]);
        let rule = OrderingRule::new(FieldRef::root("vote_start"), FieldRef::root("vote_end"));
        assert!(rule.check(&aggregate).is_empty());
    }

    #[test]
    fn given_negative_value_when_checking_requirement_then_positive_error() {
        let aggregate = aggregate_with(&[("has_max", Value::Bool(true)), ("max", Value::Int(-1))]);
        let rule = ConditionalRequirementRule::new(FieldRef::root("has_max"), FieldRef::root("max"));

        let violations = rule.check(&aggregate);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].1.code, "max_positive");
    }

    #[test]
    fn given_invalid_referenced_field_when_applying_rules_then_rule_skipped() {
        let mut aggregate = aggregate_with(&[("vote_start", day(10)), ("vote_end", day(5))]);
        aggregate
            .report
            .add(FieldPath::root("vote_end"), ErrorEntry::field("invalid", "bad"));
        let rules: Vec<Arc<dyn CrossEntityRule>> = vec![Arc::new(OrderingRule::new(
            FieldRef::root("vote_start"),
            FieldRef::root("vote_end"),
        ))];

        apply_rules(&rules, &mut aggregate);

        assert_eq!(cross_entity_count(&aggregate.report), 0);
    }

    #[test]
    fn given_lower_bound_above_row_count_when_checking_then_message_names_count() {
        let mut aggregate = aggregate_with(&[("min_selection", Value::Int(3))]);
        let row = BoundRow {
            index: Some(0),
            id: None,
            deleted: false,
            values: FieldMap::new(),
        };
        aggregate.collections.insert(
            "choices".into(),
            BoundCollection {
                rows: vec![row.clone(), row],
            },
        );
        let rule = CollectionBoundRule::new(
            FieldRef::root("min_selection"),
            "choices",
            "min_selection_too_big",
            "Ensure this value is less than or equal to the number of choices ({len}).",
        );

        let violations = rule.check(&aggregate);

        assert_eq!(violations.len(), 1);
        assert!(violations[0].1.message.contains("(2)"));
    }
}
