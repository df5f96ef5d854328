//! Storage errors and their mapping into engine errors.

use sea_orm::{DbErr, SqlErr};

use carryover_core::engine::EngineError;

/// Error types for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Account book row does not describe a valid configuration.
    #[error("Account book {book}: {message}")]
    InvalidAccountBook {
        /// Account book ID.
        book: uuid::Uuid,
        /// What is wrong with the row.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidAccountBook { .. } => Self::integrity(err.to_string()),
            StoreError::Database(db) => Self::repository(db.to_string()),
        }
    }
}

/// Returns true if the error is a unique-key violation.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
