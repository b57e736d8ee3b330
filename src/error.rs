use crate::db::error::DbError;
use thiserror::Error;

pub type AppResult<T> = Result<T, DomainError>;

/// The economic error taxonomy surfaced to callers of the engine. Routing maps
/// these to client-facing responses; nothing below this layer leaks through.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Credit/debit amount was zero or negative
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance too low for the requested debit
    #[error("insufficient stars: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },

    #[error("account not found")]
    AccountNotFound,

    #[error("item not found")]
    ItemNotFound,

    #[error("template not found")]
    TemplateNotFound,

    /// A referral was already credited for this user
    #[error("already referred")]
    AlreadyReferred,

    /// Transient conflict; the caller may retry with fresh input
    #[error("retryable conflict: {0}")]
    RetryableConflict(&'static str),

    /// Login payload failed signature verification
    #[error("login rejected: {0}")]
    LoginRejected(&'static str),

    /// Persistence-layer failure, not an economic outcome
    #[error("storage unavailable")]
    StorageUnavailable(#[source] DbError),
}

impl From<DbError> for DomainError {
    fn from(e: DbError) -> Self {
        match e {
            // Serialization failures and deadlocks are safe to retry at a
            // higher level with fresh input.
            DbError::Serialization => DomainError::RetryableConflict("serialization failure"),
            other => DomainError::StorageUnavailable(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(&'static str, String),

    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: &'static str, message: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failures_become_retryable() {
        let e = DomainError::from(DbError::Serialization);
        assert!(matches!(e, DomainError::RetryableConflict(_)));
    }

    #[test]
    fn other_db_errors_become_storage_unavailable() {
        let e = DomainError::from(DbError::NotFound);
        assert!(matches!(e, DomainError::StorageUnavailable(DbError::NotFound)));

        let e = DomainError::from(DbError::UniqueViolation);
        assert!(matches!(e, DomainError::StorageUnavailable(DbError::UniqueViolation)));
    }
}
