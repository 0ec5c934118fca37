//! Conditional field policy
//!
//! Field enablement and required-ness derived from sibling field values.
//! Rules are re-evaluated on every bind against the submitted (possibly
//! unsaved) driver values, never cached from the initial load.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::entities::Value;
use crate::domain::schema::FieldSpec;

/// What happens to a disabled field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledValue {
    /// The value is dropped; nothing is validated as required.
    Clear,
    /// The submitted value is ignored and the initial value kept.
    KeepInitial,
}

/// Effective constraint on one field for the current bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Enabled { required: bool },
    Disabled(DisabledValue),
}

impl FieldState {
    pub fn is_required(&self) -> bool {
        matches!(self, FieldState::Enabled { required: true })
    }
}

/// A declarative conditional rule over fields of the same form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalRule {
    /// A boolean driver makes `dependent` required when true; when false
    /// the dependent is disabled and cleared.
    Toggle { driver: String, dependent: String },
    /// While `now` lies inside `[start, end]`, the dependents are locked to
    /// their initial values.
    LockDuringWindow {
        start: String,
        end: String,
        dependents: Vec<String>,
    },
}

impl ConditionalRule {
    pub fn toggle(driver: &str, dependent: &str) -> Self {
        ConditionalRule::Toggle {
            driver: driver.to_string(),
            dependent: dependent.to_string(),
        }
    }

    pub fn lock_during_window(start: &str, end: &str, dependents: &[&str]) -> Self {
        ConditionalRule::LockDuringWindow {
            start: start.to_string(),
            end: end.to_string(),
            dependents: dependents.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Fields whose current value drives this rule.
    pub fn drivers(&self) -> Vec<&str> {
        match self {
            ConditionalRule::Toggle { driver, .. } => vec![driver.as_str()],
            ConditionalRule::LockDuringWindow { start, end, .. } => vec![start.as_str(), end.as_str()],
        }
    }

    /// Derive the constraints this rule imposes, given driver values.
    pub fn evaluate(
        &self,
        driver_value: &dyn Fn(&str) -> Option<Value>,
        now: DateTime<Utc>,
    ) -> Vec<(String, FieldState)> {
        match self {
            ConditionalRule::Toggle { driver, dependent } => {
                vec![(dependent.clone(), toggle_state(driver_value(driver).as_ref()))]
            }
            ConditionalRule::LockDuringWindow {
                start,
                end,
                dependents,
            } => {
                let start = driver_value(start).and_then(|v| v.as_datetime());
                let end = driver_value(end).and_then(|v| v.as_datetime());
                match (start, end) {
                    (Some(start), Some(end)) if start <= now && now <= end => dependents
                        .iter()
                        .map(|d| (d.clone(), FieldState::Disabled(DisabledValue::KeepInitial)))
                        .collect(),
                    _ => Vec::new(),
                }
            }
        }
    }
}

/// Sibling value to dependent constraint for a boolean toggle.
pub fn toggle_state(driver: Option<&Value>) -> FieldState {
    match driver.and_then(Value::as_bool) {
        Some(true) => FieldState::Enabled { required: true },
        _ => FieldState::Disabled(DisabledValue::Clear),
    }
}

/// Constraints resolved for one form and one bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldConstraints {
    states: BTreeMap<String, FieldState>,
}

impl FieldConstraints {
    /// Evaluate all rules in declaration order; a later rule overrides an
    /// earlier one for the same dependent.
    pub fn resolve(
        rules: &[ConditionalRule],
        driver_value: &dyn Fn(&str) -> Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        let states = rules
            .iter()
            .flat_map(|rule| rule.evaluate(driver_value, now))
            .collect();
        Self { states }
    }

    /// The state for a field, falling back to its schema required flag.
    pub fn state_for(&self, spec: &FieldSpec) -> FieldState {
        self.states
            .get(&spec.name)
            .copied()
            .unwrap_or(FieldState::Enabled {
                required: spec.required,
            })
    }
}
