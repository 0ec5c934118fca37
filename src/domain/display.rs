//! Detail rows: `(label, value)` pairs describing a stored aggregate

use itertools::Itertools;

use crate::domain::aggregate::{CompositeInitial, InitialValues};
use crate::domain::composite::{AggregateDefinition, CompositeField};
use crate::domain::entities::{FieldMap, Value};
use crate::domain::schema::{FieldKind, FieldSpec};

const NONE: &str = "None";

/// Lazy, finite listing of an aggregate's details. Every call to
/// [`DetailRows::iter`] starts over from the first row.
#[derive(Debug, Clone, Copy)]
pub struct DetailRows<'a> {
    definition: &'a AggregateDefinition,
    values: &'a InitialValues,
}

impl<'a> DetailRows<'a> {
    pub fn new(definition: &'a AggregateDefinition, values: &'a InitialValues) -> Self {
        Self { definition, values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, String)> + 'a {
        let definition = self.definition;
        let values = self.values;

        let root = definition
            .root_form()
            .fields
            .into_iter()
            .filter(move |spec| {
                definition.detail_fields.is_empty() || definition.detail_fields.contains(&spec.name)
            })
            .map(move |spec| field_row(&spec, &values.root));

        let computed = definition
            .computed_details
            .iter()
            .map(move |(label, compute)| (label.to_string(), compute(&values.root)));

        let composites = definition
            .composites
            .iter()
            .flat_map(move |composite| composite_rows(composite, values));

        root.chain(computed).chain(composites)
    }
}

impl<'a> IntoIterator for &DetailRows<'a> {
    type Item = (String, String);
    type IntoIter = Box<dyn Iterator<Item = (String, String)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

fn field_row(spec: &FieldSpec, values: &FieldMap) -> (String, String) {
    (spec.display_label(), display_value(spec, values.get(&spec.name)))
}

/// Display text for one value; choices show their label.
pub fn display_value(spec: &FieldSpec, value: Option<&Value>) -> String {
    match (value, &spec.kind) {
        (None, _) => NONE.to_string(),
        (Some(Value::Text(raw)), FieldKind::Choice { options }) => options
            .iter()
            .find(|o| &o.value == raw)
            .map(|o| o.label.clone())
            .unwrap_or_else(|| raw.clone()),
        (Some(v), _) => v.to_string(),
    }
}

fn composite_label(composite: &CompositeField) -> String {
    composite
        .label
        .clone()
        .unwrap_or_else(|| crate::domain::schema::title_case(&composite.name))
}

fn composite_rows(composite: &CompositeField, values: &InitialValues) -> Vec<(String, String)> {
    let form = (composite.form)();
    match values.composites.get(&composite.name) {
        Some(CompositeInitial::Sub { values: sub, .. }) => {
            form.fields.iter().map(|spec| field_row(spec, sub)).collect()
        }
        Some(CompositeInitial::Collection { rows, .. }) => {
            let summary = rows
                .iter()
                .map(|row| {
                    form.fields
                        .iter()
                        .filter_map(|spec| row.values.get(&spec.name).map(|v| display_value(spec, Some(v))))
                        .join(", ")
                })
                .join("; ");
            let summary = if summary.is_empty() { NONE.to_string() } else { summary };
            vec![(composite_label(composite), summary)]
        }
        None => Vec::new(),
    }
}

/// `"N"` when both bounds agree, otherwise `"min - max"`.
///
/// A missing or zero minimum shows as 1 and a missing or zero maximum as
/// `unbounded`.
pub fn selection_bounds(min: Option<i64>, max: Option<i64>) -> String {
    if min == max {
        return min.map(|n| n.to_string()).unwrap_or_else(|| NONE.to_string());
    }
    let min = min.filter(|n| *n != 0).unwrap_or(1);
    let max = max
        .filter(|n| *n != 0)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unbounded".to_string());
    format!("{min} - {max}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    use crate::domain::aggregate::InitialRow;
    use crate::domain::composite::CollectionSpec;
    use crate::domain::entities::EntityId;
    use crate::domain::schema::FormDefinition;

    #[rstest]
    #[case(Some(2), Some(2), "2")]
    #[case(Some(1), None, "1 - unbounded")]
    #[case(Some(2), Some(4), "2 - 4")]
    #[case(None, Some(3), "1 - 3")]
    fn given_bounds_when_formatting_then_matches(
        #[case] min: Option<i64>,
        #[case] max: Option<i64>,
        #[case] expected: &str,
    ) {
        assert_eq!(selection_bounds(min, max), expected);
    }

    fn poll_form() -> FormDefinition {
        FormDefinition::new("poll")
            .field(FieldSpec::text("title", 50))
            .field(FieldSpec::choice("show_vote", &[("VOTE", "After voting"), ("END", "After vote end")]))
    }

    fn option_form() -> FormDefinition {
        FormDefinition::new("option").field(FieldSpec::text("label", 50))
    }

    #[test]
    fn given_aggregate_when_iterating_twice_then_same_rows() {
        let definition = AggregateDefinition::new("poll", poll_form).composite(CompositeField::collection(
            "options",
            "option",
            CollectionSpec::new("poll"),
            option_form,
        ));
        let row = |label: &str| InitialRow {
            id: EntityId::generate(),
            values: FieldMap::from([("label".to_string(), Value::Text(label.into()))]),
        };
        let values = InitialValues {
            aggregate: "poll".into(),
            root_id: Some(EntityId::generate()),
            root: FieldMap::from([("show_vote".to_string(), Value::Text("END".into()))]),
            composites: BTreeMap::from([(
                "options".to_string(),
                CompositeInitial::Collection {
                    rows: vec![row("Yes"), row("No")],
                    blank: FieldMap::new(),
                    min_rows: 0,
                },
            )]),
        };
        let details = DetailRows::new(&definition, &values);

        let first: Vec<_> = details.iter().collect();
        let second: Vec<_> = (&details).into_iter().collect();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                ("Title".to_string(), "None".to_string()),
                ("Show Vote".to_string(), "After vote end".to_string()),
                ("Options".to_string(), "Yes; No".to_string()),
            ]
        );
    }
}
