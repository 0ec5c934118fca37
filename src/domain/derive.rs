//! Form-only fields derived from stored ones

use std::fmt::Debug;

use chrono::{NaiveDate, TimeDelta};

use crate::domain::entities::{Entity, FieldMap, Value};
use crate::domain::report::ErrorEntry;

/// Two-way mapping between a form-only field and stored fields of the root.
pub trait FieldDerivation: Send + Sync + Debug {
    /// The form-only field this derivation fills.
    fn field(&self) -> &str;

    /// Value for the form field, computed from a stored entity.
    fn hydrate(&self, stored: &Entity) -> Option<Value>;

    /// Error for the form field when the bound values cannot be written back.
    fn check(&self, _bound: &FieldMap) -> Option<ErrorEntry> {
        None
    }

    /// Write the bound form values back onto the entity about to be stored.
    fn apply(&self, bound: &FieldMap, target: &mut Entity);
}

/// `days` between a start date and an end date.
///
/// On save, the end is recomputed as `start + days` when both are given;
/// otherwise the stored end is left alone. A span that leaves the calendar
/// range fails [`FieldDerivation::check`].
#[derive(Debug, Clone)]
pub struct DaySpan {
    pub start: String,
    pub days: String,
    pub end: String,
}

impl DaySpan {
    pub fn new(start: &str, days: &str, end: &str) -> Self {
        Self {
            start: start.into(),
            days: days.into(),
            end: end.into(),
        }
    }

    fn end_date(start: NaiveDate, days: i64) -> Option<NaiveDate> {
        TimeDelta::try_days(days).and_then(|span| start.checked_add_signed(span))
    }

    fn bounds(&self, bound: &FieldMap) -> Option<(NaiveDate, i64)> {
        let start = bound.get(&self.start).and_then(Value::as_date)?;
        let days = bound.get(&self.days).and_then(Value::as_int)?;
        Some((start, days))
    }
}

impl FieldDerivation for DaySpan {
    fn field(&self) -> &str {
        &self.days
    }

    fn hydrate(&self, stored: &Entity) -> Option<Value> {
        let start = stored.get(&self.start)?.as_date()?;
        let end = stored.get(&self.end)?.as_date()?;
        Some(Value::Int((end - start).num_days()))
    }

    fn check(&self, bound: &FieldMap) -> Option<ErrorEntry> {
        let (start, days) = self.bounds(bound)?;
        match Self::end_date(start, days) {
            Some(_) => None,
            None => Some(ErrorEntry::field(
                "out_of_range",
                "Ensure the duration ends on a valid calendar date.",
            )),
        }
    }

    fn apply(&self, bound: &FieldMap, target: &mut Entity) {
        if let Some(end) = self.bounds(bound).and_then(|(start, days)| Self::end_date(start, days)) {
            target.set(&self.end, Some(Value::Date(end)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
    }

    #[test]
    fn given_stored_dates_when_hydrating_then_counts_days() {
        let span = DaySpan::new("subs_start", "subs_day_count", "subs_expire");
        let user = Entity::new("user")
            .with_field("subs_start", date(1))
            .with_field("subs_expire", date(31));

        assert_eq!(span.hydrate(&user), Some(Value::Int(30)));
    }

    #[test]
    fn given_start_and_days_when_applying_then_sets_expiry() {
        let span = DaySpan::new("subs_start", "subs_day_count", "subs_expire");
        let mut bound = FieldMap::new();
        bound.insert("subs_start".into(), date(1));
        bound.insert("subs_day_count".into(), Value::Int(10));
        let mut user = Entity::new("user");

        span.apply(&bound, &mut user);

        assert_eq!(user.get("subs_expire"), Some(&date(11)));
    }

    #[test]
    fn given_no_days_when_applying_then_keeps_stored_expiry() {
        let span = DaySpan::new("subs_start", "subs_day_count", "subs_expire");
        let mut user = Entity::new("user").with_field("subs_expire", date(5));

        span.apply(&FieldMap::new(), &mut user);

        assert_eq!(user.get("subs_expire"), Some(&date(5)));
    }

    #[test]
    fn given_day_count_past_calendar_when_checking_then_error_and_expiry_untouched() {
        let span = DaySpan::new("subs_start", "subs_day_count", "subs_expire");
        let mut bound = FieldMap::new();
        bound.insert("subs_start".into(), date(1));
        bound.insert("subs_day_count".into(), Value::Int(i64::MAX));
        let mut user = Entity::new("user").with_field("subs_expire", date(5));

        let error = span.check(&bound);
        span.apply(&bound, &mut user);

        assert_eq!(error.map(|e| e.code), Some("out_of_range".to_string()));
        assert_eq!(user.get("subs_expire"), Some(&date(5)));
    }
}
