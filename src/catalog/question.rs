//! The question aggregate: a question with its vote cap, attachments,
//! followers and choices.

use crate::domain::rules::{
    CapacityRule, CollectionBoundRule, ConditionalRequirementRule, OrderingRule, RangeContainmentRule,
};
use crate::domain::{
    selection_bounds, AggregateDefinition, CollectionSpec, CompositeField, ConditionalRule, FieldMap, FieldRef,
    FieldSpec, FormDefinition, SortKey, SubEntityLink, UniqueRowKey, Value,
};

pub const AGGREGATE: &str = "question";

pub const SHOW_VOTE_OPTIONS: &[(&str, &str)] = &[
    ("VOTE", "after vote"),
    ("END", "after voting ends"),
    ("NEVER", "never"),
];

pub const MAX_VOTE_COUNT_CONTROL: &str = "max_vote_count_control";
pub const ATTACHMENTS: &str = "attachments";
pub const FOLLOWERS: &str = "q_followers";
pub const CHOICES: &str = "choices";

pub fn question_form() -> FormDefinition {
    FormDefinition::new("question")
        .field(FieldSpec::text("question_text", 200).required())
        .field(FieldSpec::integer("total_vote_count").with_default(Value::Int(0)))
        .field(FieldSpec::reference("thumbnail", "file"))
        .field(FieldSpec::reference("creator", "user"))
        .field(FieldSpec::boolean("show_creator"))
        .field(
            FieldSpec::datetime("pub_date")
                .with_label("Date published")
                .default_now(),
        )
        .field(FieldSpec::datetime("vote_start").default_now())
        .field(FieldSpec::datetime("vote_end"))
        .field(
            FieldSpec::choice("show_vote", SHOW_VOTE_OPTIONS)
                .with_default(Value::Text("END".into())),
        )
        .field(FieldSpec::integer("min_selection").with_default(Value::Int(1)))
        .field(FieldSpec::integer("max_selection"))
        .field(FieldSpec::boolean("allow_custom").with_label("Allow custom votes"))
        // no edits to the question while a poll is running
        .policy(ConditionalRule::lock_during_window("vote_start", "vote_end", &["question_text"]))
}

/// Vote cap settings, stored on the question itself.
pub fn max_vote_count_form() -> FormDefinition {
    FormDefinition::new("question")
        .field(FieldSpec::boolean("has_max_vote_count"))
        .field(FieldSpec::integer("max_vote_count"))
        .policy(ConditionalRule::toggle("has_max_vote_count", "max_vote_count"))
}

pub fn attachment_form() -> FormDefinition {
    FormDefinition::new("attachment").field(
        FieldSpec::reference("file", "file")
            .required()
            .with_label("Attachment"),
    )
}

pub fn question_follower_form() -> FormDefinition {
    FormDefinition::new("question_follower")
        .field(FieldSpec::reference("follower", "user").required())
        .field(FieldSpec::float("ordering").with_default(Value::Float(0.0)))
}

pub fn choice_form() -> FormDefinition {
    FormDefinition::new("choice")
        .field(FieldSpec::text("choice_text", 200).required())
        .field(FieldSpec::integer("vote_count").with_default(Value::Int(0)))
}

fn selection_detail(values: &FieldMap) -> String {
    selection_bounds(
        values.get("min_selection").and_then(Value::as_int),
        values.get("max_selection").and_then(Value::as_int),
    )
}

pub fn definition() -> AggregateDefinition {
    let cap = |field: &str| FieldRef::sub(MAX_VOTE_COUNT_CONTROL, field);

    AggregateDefinition::new(AGGREGATE, question_form)
        .composite(CompositeField::sub_entity(
            MAX_VOTE_COUNT_CONTROL,
            "question",
            SubEntityLink::SharesRoot,
            max_vote_count_form,
        ))
        .composite(CompositeField::collection(
            ATTACHMENTS,
            "attachment",
            CollectionSpec::new("question"),
            attachment_form,
        ))
        .composite(
            CompositeField::collection(
                FOLLOWERS,
                "question_follower",
                CollectionSpec::new("question")
                    .order_by(SortKey::desc("ordering"))
                    .validator(UniqueRowKey::new(&["follower"])),
                question_follower_form,
            )
            .with_label("Followers"),
        )
        .composite(CompositeField::collection(
            CHOICES,
            "choice",
            CollectionSpec::new("question").min_rows(2),
            choice_form,
        ))
        .rule(
            OrderingRule::new(FieldRef::root("vote_start"), FieldRef::root("vote_end")).with_error(
                "vote_end_too_early",
                "Ensure this time is later than the vote start date.",
            ),
        )
        .rule(ConditionalRequirementRule::new(
            cap("has_max_vote_count"),
            cap("max_vote_count"),
        ))
        .rule(RangeContainmentRule::new(
            FieldRef::root("min_selection"),
            FieldRef::root("max_selection"),
            "max_selection_too_small",
            "Ensure this value is greater than or equal to the min selection.",
        ))
        .rule(CollectionBoundRule::new(
            FieldRef::root("min_selection"),
            CHOICES,
            "min_selection_too_big",
            "Ensure this value is less than or equal to the number of choices ({len}).",
        ))
        .rule(CapacityRule::new(
            cap("has_max_vote_count"),
            cap("max_vote_count"),
            FieldRef::root("total_vote_count"),
            "total_vote_count_too_big",
            "Ensure total vote count is less than or equal to the max vote count.",
        ))
        .detail_fields(&[
            "question_text",
            "total_vote_count",
            "creator",
            "show_creator",
            "pub_date",
            "vote_start",
            "vote_end",
            "show_vote",
            "allow_custom",
        ])
        .computed_detail("Selection Bounds", selection_detail)
}
