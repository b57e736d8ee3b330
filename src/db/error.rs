use deadpool_postgres::{BuildError, PoolError};
use thiserror::Error;
use tokio_postgres::error::SqlState;

// DbError is the lowest level error type, wrapping errors from the database
// layer. It does not wrap any higher level errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Record not found
    #[error("not found")]
    NotFound,

    /// Unique constraint violation
    #[error("unique violation")]
    UniqueViolation,

    /// Serialization failure or deadlock; the transaction can be retried
    #[error("serialization conflict")]
    Serialization,

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Pg(tokio_postgres::Error),

    #[error(transparent)]
    Migrate(#[from] refinery::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("row decode error: {0}")]
    Decode(String),
}

impl From<tokio_postgres::Error> for DbError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.code() {
            Some(&SqlState::UNIQUE_VIOLATION) => DbError::UniqueViolation,
            Some(&SqlState::T_R_SERIALIZATION_FAILURE) | Some(&SqlState::T_R_DEADLOCK_DETECTED) => {
                DbError::Serialization
            }
            _ => DbError::Pg(e),
        }
    }
}
