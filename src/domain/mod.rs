//! Domain layer: entities, declarations and validation rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod aggregate;
pub mod composite;
pub mod derive;
pub mod display;
pub mod entities;
pub mod error;
pub mod policy;
pub mod query;
pub mod report;
pub mod rules;
pub mod schema;
pub mod submission;
pub mod theme;

pub use aggregate::{
    BoundAggregate, BoundCollection, BoundEntity, BoundRow, CompositeInitial, FieldRef,
    InitialRow, InitialValues,
};
pub use composite::{
    AggregateDefinition, CollectionSpec, CompositeField, CompositeKind, CompositeRegistry,
    RowValidator, SubEntityLink, UniqueRowKey,
};
pub use display::{selection_bounds, DetailRows};
pub use entities::*;
pub use error::DomainError;
pub use policy::{ConditionalRule, DisabledValue, FieldConstraints, FieldState};
pub use query::{Filter, SortKey};
pub use report::{ErrorEntry, ErrorKind, ErrorReport, FieldPath};
pub use schema::{EntitySchema, FieldKind, FieldSpec, FormDefinition, SchemaRegistry};
pub use submission::Submission;
pub use theme::ThemeSettings;

/// Expand `~` and `$VAR` / `${VAR}` in a path-like string.
///
/// Unknown variables are left as written.
pub fn expand_env_vars(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(input).into_owned())
}
