use thiserror::Error;

use switchyard_core::{AggregateError, ConfigError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Usage(_) => 2,
            Self::Aggregate(AggregateError::SubjectNotFound(_)) => 3,
            Self::Aggregate(AggregateError::Cancelled) => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
