use thiserror::Error;

use crate::SubjectId;

/// Validation and contract errors exposed by `switchyard-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid provider '{value}', expected one of profiles, subscription, billing, catalog")]
    InvalidProvider { value: String },
    #[error("invalid transport '{value}', expected one of rest, graphql, grpc, mock")]
    InvalidTransport { value: String },
    #[error("invalid use case '{value}', expected 'dashboard'")]
    InvalidUseCase { value: String },

    #[error("timeout budget for provider '{provider}' must be greater than zero")]
    ZeroBudget { provider: &'static str },
    #[error("outbound pool setting '{field}' must be greater than zero")]
    ZeroPoolSetting { field: &'static str },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: String, value: String },

    #[error("invalid {provider} endpoint '{url}': {message}")]
    InvalidEndpoint {
        provider: &'static str,
        url: String,
        message: String,
    },

    #[error("failed to build outbound runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Fatal failures of one aggregate request.
///
/// Provider failures never appear here; they are absorbed into defaults and
/// reported through the latency report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("subject '{0}' was not found")]
    SubjectNotFound(SubjectId),

    #[error("aggregate request was cancelled before all providers joined")]
    Cancelled,
}

impl AggregateError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SubjectNotFound(_) => "subject.not_found",
            Self::Cancelled => "aggregate.cancelled",
        }
    }
}
