//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::infrastructure::{InfraError, StorageError};

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    /// The submission was bound but failed validation.
    #[error("submission invalid: {error_count} error(s)")]
    Invalid { error_count: usize },
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Invalid { .. } => crate::exitcode::DATAERR,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Submission { .. } => crate::exitcode::DATAERR,
                InfraError::Storage(StorageError::NotFound { .. }) => crate::exitcode::NOINPUT,
                InfraError::Storage(_) => crate::exitcode::IOERR,
                InfraError::Application(app) => match app {
                    ApplicationError::NotFound { .. } => crate::exitcode::NOINPUT,
                    ApplicationError::InvalidAggregate { .. } => crate::exitcode::DATAERR,
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::Domain(_) => crate::exitcode::USAGE,
                    ApplicationError::FatalStorage { .. } | ApplicationError::Storage { .. } => {
                        crate::exitcode::IOERR
                    }
                    ApplicationError::OperationFailed { .. } => crate::exitcode::SOFTWARE,
                },
            },
        }
    }
}
