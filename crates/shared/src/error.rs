//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., duplicate entry).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Ownership could not be resolved and needs manual review.
    #[error("Unresolved ownership: {0}")]
    Unresolved(String),

    /// Stored data violates an invariant.
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code used by command-line tools.
    ///
    /// Codes follow the `sysexits.h` conventions.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotFound(_) | Self::Unresolved(_) => 65,
            Self::Integrity(_) => 66,
            Self::Database(_) => 69,
            Self::Internal(_) => 70,
            Self::Conflict(_) => 75,
            Self::Config(_) => 78,
        }
    }

    /// Returns a stable machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unresolved(_) => "SCOPE_UNRESOLVED",
            Self::Integrity(_) => "DATA_INTEGRITY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound(String::new()), 65, "NOT_FOUND")]
    #[case(AppError::Unresolved(String::new()), 65, "SCOPE_UNRESOLVED")]
    #[case(AppError::Integrity(String::new()), 66, "DATA_INTEGRITY_ERROR")]
    #[case(AppError::Database(String::new()), 69, "DATABASE_ERROR")]
    #[case(AppError::Internal(String::new()), 70, "INTERNAL_ERROR")]
    #[case(AppError::Conflict(String::new()), 75, "CONFLICT")]
    #[case(AppError::Config(String::new()), 78, "CONFIG_ERROR")]
    fn test_error_codes(#[case] err: AppError, #[case] exit: u8, #[case] code: &str) {
        assert_eq!(err.exit_code(), exit);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Unresolved("member".into()).to_string(),
            "Unresolved ownership: member"
        );
        assert_eq!(
            AppError::Integrity("missing book".into()).to_string(),
            "Data integrity error: missing book"
        );
    }
}
