//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors are configuration or programming mistakes in the declared
/// schemas and aggregates. Validation problems in user input never end up
/// here; they go to the aggregate's `ErrorReport`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("entity type {entity_type} has no field {field}")]
    UnknownField { entity_type: String, field: String },

    #[error("composite {composite}: {child_type} has no back-reference field {field}")]
    UnknownBackReference {
        composite: String,
        child_type: String,
        field: String,
    },

    #[error("composite {composite}: back-reference {field} points at {actual}, expected {expected}")]
    BackReferenceTargetMismatch {
        composite: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("aggregate {aggregate} declares composite {composite} twice")]
    DuplicateComposite { aggregate: String, composite: String },

    #[error("composite {composite}: min rows {min} exceeds max rows {max}")]
    InvalidCardinality {
        composite: String,
        min: usize,
        max: usize,
    },

    #[error("unknown aggregate: {0}")]
    UnknownAggregate(String),

    #[error("unknown theme key: {0}")]
    UnknownThemeKey(String),
}
