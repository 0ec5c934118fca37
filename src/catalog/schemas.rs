//! Stored shape of every polls entity type

use crate::domain::{EntitySchema, SchemaRegistry};

pub fn question() -> EntitySchema {
    EntitySchema::new("question")
        .field("question_text")
        .field("total_vote_count")
        .reference("thumbnail", "file")
        .reference("creator", "user")
        .field("show_creator")
        .field("pub_date")
        .field("vote_start")
        .field("vote_end")
        .field("show_vote")
        .field("has_max_vote_count")
        .field("max_vote_count")
        .field("min_selection")
        .field("max_selection")
        .field("allow_custom")
}

pub fn choice() -> EntitySchema {
    EntitySchema::new("choice")
        .reference("question", "question")
        .field("choice_text")
        .field("vote_count")
}

pub fn attachment() -> EntitySchema {
    EntitySchema::new("attachment")
        .reference("question", "question")
        .reference("file", "file")
}

pub fn question_follower() -> EntitySchema {
    EntitySchema::new("question_follower")
        .reference("question", "question")
        .reference("follower", "user")
        .field("ordering")
        .field("enable_email_notify")
        .field("notify_time")
}

pub fn file() -> EntitySchema {
    EntitySchema::new("file").field("name").field("path")
}

pub fn user() -> EntitySchema {
    EntitySchema::new("user")
        .field("group")
        .field("subs_start")
        .field("subs_expire")
}

/// Login identity of a user; one per user.
pub fn account() -> EntitySchema {
    EntitySchema::new("account")
        .reference("user", "user")
        .field("username")
        .field("email")
        .field("first_name")
        .field("last_name")
        .field("is_active")
        .field("is_staff")
        .field("is_superuser")
}

pub fn user_follower() -> EntitySchema {
    EntitySchema::new("user_follower")
        .reference("follower", "user")
        .reference("followed_user", "user")
        .field("ordering")
        .field("enable_email_notify")
        .field("notify_time")
}

pub fn registry() -> SchemaRegistry {
    let mut schemas = SchemaRegistry::new();
    for schema in [
        question(),
        choice(),
        attachment(),
        question_follower(),
        file(),
        user(),
        account(),
        user_follower(),
    ] {
        schemas.register(schema);
    }
    schemas
}
