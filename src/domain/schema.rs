//! Entity schemas and declarative form definitions
//!
//! An [`EntitySchema`] lists the stored fields of an entity type (including
//! back-references that forms never expose). A [`FormDefinition`] lists the
//! editable fields of one form over that type, with their kinds, defaults
//! and conditional policies.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use regex::Regex;

use crate::domain::entities::{EntityId, FieldMap, Value};
use crate::domain::error::DomainError;
use crate::domain::policy::ConditionalRule;
use crate::domain::report::ErrorEntry;

/// A selectable option: stored value and display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// The data type of a form field, with its local constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text { max_length: Option<usize> },
    Email,
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    /// Checkbox semantics: an absent value binds as `false`.
    Bool,
    DateTime,
    Date,
    Time { minute_precision: bool },
    Choice { options: Vec<ChoiceOption> },
    Reference { target: String },
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z0-9-]{2,}$").expect("valid email regex"))
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

impl FieldKind {
    /// Parse a raw submitted string into a typed value.
    ///
    /// Blank input is `Ok(None)`, except for booleans which are always present.
    /// Range and length constraints are checked separately by [`FieldKind::check_bounds`].
    pub fn parse(&self, raw: Option<&str>) -> Result<Option<Value>, ErrorEntry> {
        if let FieldKind::Bool = self {
            return Ok(Some(Value::Bool(raw.map(truthy).unwrap_or(false))));
        }
        let raw = match raw.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };

        let value = match self {
            FieldKind::Text { .. } => Value::Text(raw.to_string()),
            FieldKind::Email => {
                if !email_pattern().is_match(raw) {
                    return Err(ErrorEntry::field("invalid", "Enter a valid email address."));
                }
                Value::Text(raw.to_string())
            }
            FieldKind::Integer { .. } => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ErrorEntry::field("invalid", "Enter a whole number."))?,
            FieldKind::Float { .. } => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Float)
                .ok_or_else(|| ErrorEntry::field("invalid", "Enter a number."))?,
            FieldKind::Bool => Value::Bool(truthy(raw)),
            FieldKind::DateTime => parse_datetime(raw)
                .map(Value::DateTime)
                .ok_or_else(|| ErrorEntry::field("invalid", "Enter a valid date/time."))?,
            FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| ErrorEntry::field("invalid", "Enter a valid date."))?,
            FieldKind::Time { minute_precision } => {
                let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
                    .map_err(|_| ErrorEntry::field("invalid", "Enter a valid time."))?;
                let time = if *minute_precision {
                    time.with_second(0)
                        .and_then(|t| t.with_nanosecond(0))
                        .unwrap_or(time)
                } else {
                    time
                };
                Value::Time(time)
            }
            FieldKind::Choice { options } => {
                if !options.iter().any(|o| o.value == raw) {
                    return Err(ErrorEntry::field(
                        "invalid_choice",
                        format!("Select a valid choice. {raw} is not one of the available choices."),
                    ));
                }
                Value::Text(raw.to_string())
            }
            FieldKind::Reference { .. } => raw.parse::<EntityId>().map(Value::Ref).map_err(|_| {
                ErrorEntry::field(
                    "invalid_choice",
                    "Select a valid choice. That choice is not one of the available choices.",
                )
            })?,
        };
        Ok(Some(value))
    }

    /// Length and range checks on an already typed value.
    pub fn check_bounds(&self, value: &Value) -> Option<ErrorEntry> {
        match (self, value) {
            (FieldKind::Text { max_length: Some(max) }, Value::Text(s)) => {
                let len = s.chars().count();
                (len > *max).then(|| {
                    ErrorEntry::field(
                        "max_length",
                        format!("Ensure this value has at most {max} characters (it has {len})."),
                    )
                })
            }
            (FieldKind::Integer { min, max }, Value::Int(n)) => {
                range_error(min.map(|m| (*n < m, m.to_string())), max.map(|m| (*n > m, m.to_string())))
            }
            (FieldKind::Float { min, max }, Value::Float(n)) => {
                range_error(min.map(|m| (*n < m, m.to_string())), max.map(|m| (*n > m, m.to_string())))
            }
            _ => None,
        }
    }
}

fn range_error(below: Option<(bool, String)>, above: Option<(bool, String)>) -> Option<ErrorEntry> {
    if let Some((true, min)) = below {
        return Some(ErrorEntry::field(
            "min_value",
            format!("Ensure this value is greater than or equal to {min}."),
        ));
    }
    if let Some((true, max)) = above {
        return Some(ErrorEntry::field(
            "max_value",
            format!("Ensure this value is less than or equal to {max}."),
        ));
    }
    None
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Initial value used when no stored aggregate exists.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    /// The clock's current instant (date-time fields only).
    Now,
}

/// One field of a form definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    /// Form-only fields are bound and validated but never written to the entity.
    pub persisted: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: false,
            default: None,
            persisted: true,
        }
    }

    /// Shorthand for a text field with a maximum length.
    pub fn text(name: &str, max_length: usize) -> Self {
        Self::new(name, FieldKind::Text { max_length: Some(max_length) })
    }

    pub fn email(name: &str) -> Self {
        Self::new(name, FieldKind::Email)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer { min: None, max: None })
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float { min: None, max: None })
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Bool).with_default(Value::Bool(false))
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn time(name: &str) -> Self {
        Self::new(name, FieldKind::Time { minute_precision: false })
    }

    pub fn choice(name: &str, options: &[(&str, &str)]) -> Self {
        let options = options
            .iter()
            .map(|(value, label)| ChoiceOption {
                value: (*value).to_string(),
                label: (*label).to_string(),
            })
            .collect();
        Self::new(name, FieldKind::Choice { options })
    }

    pub fn reference(name: &str, target: &str) -> Self {
        Self::new(name, FieldKind::Reference { target: target.to_string() })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    pub fn form_only(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Bound an integer field; no effect on other kinds.
    pub fn int_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        if let FieldKind::Integer { .. } = self.kind {
            self.kind = FieldKind::Integer { min, max };
        }
        self
    }

    /// Truncate bound time values to whole minutes; no effect on other kinds.
    pub fn minute_precision(mut self) -> Self {
        if let FieldKind::Time { .. } = self.kind {
            self.kind = FieldKind::Time { minute_precision: true };
        }
        self
    }

    /// Display label: the explicit label, else the humanized field name.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| title_case(&self.name))
    }

    pub fn default_value(&self, now: DateTime<Utc>) -> Option<Value> {
        match &self.default {
            Some(DefaultValue::Value(v)) => Some(v.clone()),
            Some(DefaultValue::Now) => Some(Value::DateTime(now)),
            None => None,
        }
    }
}

/// `subs_day_count` -> `subs day count`
pub fn humanize(name: &str) -> String {
    name.replace('_', " ")
}

/// `subs_day_count` -> `Subs Day Count`
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Editable fields of one form over an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDefinition {
    pub entity_type: String,
    pub fields: Vec<FieldSpec>,
    pub policies: Vec<ConditionalRule>,
}

impl FormDefinition {
    pub fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            fields: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn policy(mut self, rule: ConditionalRule) -> Self {
        self.policies.push(rule);
        self
    }

    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.persisted)
    }

    /// Type-appropriate defaults for every field that declares one.
    pub fn defaults(&self, now: DateTime<Utc>) -> FieldMap {
        self.fields
            .iter()
            .filter_map(|f| f.default_value(now).map(|v| (f.name.clone(), v)))
            .collect()
    }
}

/// A stored field; `references` names the target type for entity links.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaField {
    pub references: Option<String>,
}

/// Stored fields of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: BTreeMap<String, SchemaField>,
}

impl EntitySchema {
    pub fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), SchemaField::default());
        self
    }

    pub fn reference(mut self, name: &str, target: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            SchemaField {
                references: Some(target.to_string()),
            },
        );
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// All known entity schemas, keyed by type.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    pub fn get(&self, entity_type: &str) -> Result<&EntitySchema, DomainError> {
        self.schemas
            .get(entity_type)
            .ok_or_else(|| DomainError::UnknownEntityType(entity_type.to_string()))
    }

    /// Check that every persisted field of a form exists on its entity schema.
    pub fn check_form(&self, form: &FormDefinition) -> Result<(), DomainError> {
        let schema = self.get(&form.entity_type)?;
        for spec in form.persisted_fields() {
            if !schema.has_field(&spec.name) {
                return Err(DomainError::UnknownField {
                    entity_type: form.entity_type.clone(),
                    field: spec.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Some(Value::Int(42)))]
    #[case("  7 ", Some(Value::Int(7)))]
    #[case("", None)]
    fn given_integer_input_when_parsing_then_binds(#[case] raw: &str, #[case] expected: Option<Value>) {
        let kind = FieldKind::Integer { min: None, max: None };
        assert_eq!(kind.parse(Some(raw)).unwrap(), expected);
    }

    #[rstest]
    #[case(FieldKind::Integer { min: None, max: None }, "4.5")]
    #[case(FieldKind::Date, "2024-13-01")]
    #[case(FieldKind::Email, "not-an-email")]
    #[case(FieldKind::Reference { target: "user".into() }, "42")]
    fn given_malformed_input_when_parsing_then_field_error(#[case] kind: FieldKind, #[case] raw: &str) {
        let err = kind.parse(Some(raw)).unwrap_err();
        assert_eq!(err.kind, crate::domain::report::ErrorKind::Field);
    }

    #[test]
    fn given_absent_checkbox_when_parsing_then_false() {
        assert_eq!(FieldKind::Bool.parse(None).unwrap(), Some(Value::Bool(false)));
        assert_eq!(FieldKind::Bool.parse(Some("on")).unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn given_minute_precision_when_parsing_time_then_drops_seconds() {
        let kind = FieldKind::Time { minute_precision: true };
        let value = kind.parse(Some("08:15:42")).unwrap().unwrap();
        assert_eq!(value, Value::Time(NaiveTime::from_hms_opt(8, 15, 0).unwrap()));
    }

    #[test]
    fn given_text_over_max_length_when_checking_bounds_then_max_length_error() {
        let kind = FieldKind::Text { max_length: Some(3) };
        let err = kind.check_bounds(&Value::Text("abcd".into())).unwrap();
        assert_eq!(err.code, "max_length");
        assert!(err.message.contains("it has 4"));
    }

    #[test]
    fn given_negative_when_min_zero_then_min_value_error() {
        let kind = FieldKind::Integer { min: Some(0), max: None };
        assert_eq!(kind.check_bounds(&Value::Int(-1)).unwrap().code, "min_value");
        assert!(kind.check_bounds(&Value::Int(0)).is_none());
    }

    #[test]
    fn given_choice_outside_options_when_parsing_then_invalid_choice() {
        let spec = FieldSpec::choice("show_vote", &[("VOTE", "after vote"), ("END", "after voting ends")]);
        assert_eq!(spec.kind.parse(Some("SOMETIMES")).unwrap_err().code, "invalid_choice");
        assert_eq!(spec.kind.parse(Some("END")).unwrap(), Some(Value::Text("END".into())));
    }

    #[test]
    fn given_naive_and_rfc3339_datetimes_when_parsing_then_both_bind_as_utc() {
        let a = FieldKind::DateTime.parse(Some("2024-05-10 12:30")).unwrap().unwrap();
        let b = FieldKind::DateTime.parse(Some("2024-05-10T12:30:00Z")).unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn given_snake_name_when_title_casing_then_capitalizes_words() {
        assert_eq!(title_case("subs_day_count"), "Subs Day Count");
        assert_eq!(humanize("vote_start"), "vote start");
    }

    #[test]
    fn given_form_field_missing_on_schema_when_checking_then_unknown_field() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntitySchema::new("choice").field("choice_text"));
        let form = FormDefinition::new("choice")
            .field(FieldSpec::text("choice_text", 200))
            .field(FieldSpec::integer("votes"));

        let err = registry.check_form(&form).unwrap_err();
        assert!(matches!(err, DomainError::UnknownField { ref field, .. } if field == "votes"));
    }
}
