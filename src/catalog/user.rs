//! User aggregates: account creation and the full profile edit.

use crate::domain::derive::DaySpan;
use crate::domain::rules::DependentPresenceRule;
use crate::domain::{
    AggregateDefinition, CollectionSpec, CompositeField, FieldRef, FieldSpec, FormDefinition, SortKey,
    SubEntityLink, UniqueRowKey, Value,
};

pub const CREATE_AGGREGATE: &str = "user_create";
pub const UPDATE_AGGREGATE: &str = "user_update";

pub const ACCOUNT: &str = "account";
pub const FOLLOWED_USERS: &str = "followed_users";
pub const FOLLOWED_QUESTIONS: &str = "followed_questions";

pub const GROUP_OPTIONS: &[(&str, &str)] = &[
    ("DEFAULT", "default"),
    ("SUBS", "subscriber"),
    ("SA", "super admin"),
];

fn group() -> FieldSpec {
    FieldSpec::choice("group", GROUP_OPTIONS)
        .required()
        .with_default(Value::Text("DEFAULT".into()))
}

pub fn user_create_form() -> FormDefinition {
    FormDefinition::new("user")
        .field(group())
        .field(FieldSpec::date("subs_start"))
        .field(FieldSpec::date("subs_expire"))
}

pub fn account_create_form() -> FormDefinition {
    FormDefinition::new("account")
        .field(FieldSpec::text("username", 150).required())
        .field(FieldSpec::email("email").required())
}

/// Subscription expiry is edited as a day count from the start date.
pub fn user_update_form() -> FormDefinition {
    FormDefinition::new("user")
        .field(group())
        .field(FieldSpec::date("subs_start"))
        .field(
            FieldSpec::integer("subs_day_count")
                .int_range(Some(0), None)
                .with_label("Subscription duration (in days)")
                .form_only(),
        )
}

pub fn account_update_form() -> FormDefinition {
    FormDefinition::new("account")
        .field(FieldSpec::text("username", 150).required())
        .field(FieldSpec::email("email").required())
        .field(FieldSpec::text("first_name", 150))
        .field(FieldSpec::text("last_name", 150))
        .field(FieldSpec::boolean("is_active").with_default(Value::Bool(true)))
        .field(FieldSpec::boolean("is_staff").with_label("Staff status"))
        .field(FieldSpec::boolean("is_superuser").with_label("Superuser status"))
}

pub fn followed_user_form() -> FormDefinition {
    FormDefinition::new("user_follower")
        .field(FieldSpec::reference("followed_user", "user").required())
        .field(FieldSpec::float("ordering").with_default(Value::Float(0.0)))
        .field(FieldSpec::boolean("enable_email_notify"))
        .field(FieldSpec::time("notify_time").minute_precision())
}

pub fn followed_question_form() -> FormDefinition {
    FormDefinition::new("question_follower")
        .field(FieldSpec::reference("question", "question").required())
        .field(FieldSpec::float("ordering").with_default(Value::Float(0.0)))
        .field(FieldSpec::boolean("enable_email_notify"))
        .field(FieldSpec::time("notify_time").minute_precision())
}

pub fn create_definition() -> AggregateDefinition {
    AggregateDefinition::new(CREATE_AGGREGATE, user_create_form).composite(CompositeField::sub_entity(
        ACCOUNT,
        "account",
        SubEntityLink::BackReference("user".into()),
        account_create_form,
    ))
}

pub fn update_definition() -> AggregateDefinition {
    AggregateDefinition::new(UPDATE_AGGREGATE, user_update_form)
        .composite(CompositeField::sub_entity(
            ACCOUNT,
            "account",
            SubEntityLink::BackReference("user".into()),
            account_update_form,
        ))
        .composite(CompositeField::collection(
            FOLLOWED_USERS,
            "user_follower",
            CollectionSpec::new("follower")
                .order_by(SortKey::desc("ordering"))
                .validator(UniqueRowKey::new(&["followed_user"])),
            followed_user_form,
        ))
        .composite(CompositeField::collection(
            FOLLOWED_QUESTIONS,
            "question_follower",
            CollectionSpec::new("follower").order_by(SortKey::desc("ordering")),
            followed_question_form,
        ))
        .derivation(DaySpan::new("subs_start", "subs_day_count", "subs_expire"))
        .rule(DependentPresenceRule::new(
            FieldRef::root("subs_day_count"),
            FieldRef::root("subs_start"),
            "This field is required if subscription duration is provided.",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schemas;

    #[test]
    fn given_user_definitions_when_checking_against_schemas_then_valid() {
        let schemas = schemas::registry();
        assert!(create_definition().check(&schemas).is_ok());
        assert!(update_definition().check(&schemas).is_ok());
    }

    #[test]
    fn given_day_count_when_listing_persisted_fields_then_excluded() {
        let form = user_update_form();
        let persisted: Vec<_> = form.persisted_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(persisted, ["group", "subs_start"]);
    }
}
