//! Application-level errors (wraps domain errors)

use std::fmt;

use thiserror::Error;

use crate::domain::{DomainError, EntityId};
use crate::infrastructure::error::StorageError;

/// The persistence step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStep {
    Begin,
    Root,
    SubEntity(String),
    Collection(String),
    Commit,
}

impl fmt::Display for PersistStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistStep::Begin => write!(f, "begin"),
            PersistStep::Root => write!(f, "root"),
            PersistStep::SubEntity(name) => write!(f, "sub-entity {name}"),
            PersistStep::Collection(name) => write!(f, "collection {name}"),
            PersistStep::Commit => write!(f, "commit"),
        }
    }
}

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: EntityId },

    #[error("aggregate is invalid ({error_count} errors), refusing to persist")]
    InvalidAggregate { error_count: usize },

    /// A write failed part way through a save. The root may already be
    /// committed; callers should re-read the aggregate before retrying.
    #[error("persisting {step} failed (rolled back: {rolled_back})")]
    FatalStorage {
        step: PersistStep,
        rolled_back: bool,
        #[source]
        source: StorageError,
    },

    #[error("storage read failed: {context}")]
    Storage {
        context: String,
        #[source]
        source: StorageError,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub fn storage(context: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
