use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SnoozerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rule {0} is no longer pending and cannot be edited")]
    RuleNotPending(Uuid),

    #[error("Rule {0} is being executed and cannot be edited")]
    RuleInFlight(Uuid),

    #[error("Storage error: {0}")]
    Store(String),
}

impl SnoozerError {
    pub fn rule_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("rule {id}"))
    }
}

/// Malformed operator input, rejected before anything is persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown action '{0}': must be STOP or DELETE")]
    UnknownAction(String),

    #[error("invalid timestamp '{0}': expected RFC 3339 (e.g. 2025-01-31T18:00:00Z)")]
    InvalidTimestamp(String),

    #[error("service id must not be empty")]
    EmptyServiceId,

    #[error("note exceeds {max} characters ({len})")]
    NoteTooLong { len: usize, max: usize },

    #[error("invalid service name '{name}': {reason}")]
    InvalidServiceName { name: String, reason: &'static str },

    #[error("invalid ttl '{0}': use 1h, 6h, 24h, 1w or a custom 1-168 hours")]
    InvalidTtl(String),
}

pub type Result<T> = std::result::Result<T, SnoozerError>;
