//! Engine error types.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use carryover_shared::AppError;
use carryover_shared::types::{AccountBookId, BudgetPeriodId};

use crate::period::ScheduleError;
use crate::scope::{Scope, UnresolvedReason};

/// Errors raised while generating, reading, or reconciling period chains.
///
/// Drift is not an error: it is corrected and reported as a
/// [`Correction`](crate::rollover::Correction).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Ownership could not be mapped to a scope; the scope is skipped for manual review.
    #[error("Scope unresolved: {0}")]
    ScopeUnresolved(UnresolvedReason),

    /// Two periods of one scope overlap.
    #[error("Periods {first} and {second} of scope {scope} overlap")]
    PeriodOverlap {
        /// Affected scope.
        scope: Scope,
        /// Earlier period.
        first: BudgetPeriodId,
        /// Later period starting inside the earlier one.
        second: BudgetPeriodId,
    },

    /// Another writer inserted the same (scope, account book, start date) first.
    #[error("Period starting {start_date} for scope {scope} was created concurrently")]
    ConcurrentCreationConflict {
        /// Affected scope.
        scope: Scope,
        /// Start date of the contested period.
        start_date: NaiveDate,
    },

    /// The scope has no base-case period to extend.
    #[error("Scope {scope} has no budget period in account book {account_book_id}")]
    MissingBasePeriod {
        /// Affected scope.
        scope: Scope,
        /// Account book.
        account_book_id: AccountBookId,
    },

    /// The as-of date precedes the first period of the chain.
    #[error("Scope {scope} has no period on {as_of}; its chain starts {chain_start}")]
    BeforeChainStart {
        /// Affected scope.
        scope: Scope,
        /// Requested date.
        as_of: NaiveDate,
        /// Start of the earliest period.
        chain_start: NaiveDate,
    },

    /// No attribution change was recorded under the run id.
    #[error("Repair run {0} recorded no attribution changes")]
    RunNotFound(Uuid),

    /// Stored data violates an invariant (fatal for the scope).
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Period schedule arithmetic failed.
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Storage backend failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl EngineError {
    /// Creates a data integrity error.
    #[must_use]
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Creates a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Returns true if the error only affects one scope and processing of
    /// other scopes may continue.
    #[must_use]
    pub const fn is_scope_local(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ScopeUnresolved(_) => Self::Unresolved(err.to_string()),
            EngineError::BeforeChainStart { .. } | EngineError::RunNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            EngineError::PeriodOverlap { .. }
            | EngineError::MissingBasePeriod { .. }
            | EngineError::DataIntegrity(_)
            | EngineError::Schedule(_) => Self::Integrity(err.to_string()),
            EngineError::ConcurrentCreationConflict { .. } => Self::Conflict(err.to_string()),
            EngineError::Repository(_) => Self::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carryover_shared::types::{FamilyMemberId, UserId};

    #[test]
    fn test_maps_to_app_error() {
        let unresolved = EngineError::ScopeUnresolved(UnresolvedReason::UserNotInFamily(
            UserId::new(),
        ));
        assert_eq!(AppError::from(unresolved).error_code(), "SCOPE_UNRESOLVED");

        let overlap = EngineError::PeriodOverlap {
            scope: Scope::custodial(FamilyMemberId::new()),
            first: BudgetPeriodId::new(),
            second: BudgetPeriodId::new(),
        };
        assert_eq!(AppError::from(overlap).error_code(), "DATA_INTEGRITY_ERROR");

        let early = EngineError::BeforeChainStart {
            scope: Scope::user(UserId::new()),
            as_of: NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            chain_start: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        };
        assert!(early.to_string().contains("chain starts 2025-05-01"));
        assert_eq!(AppError::from(early).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::from(EngineError::RunNotFound(Uuid::now_v7())).exit_code(),
            65
        );

        let db = EngineError::repository("connection reset");
        assert!(!db.is_scope_local());
        assert_eq!(AppError::from(db).error_code(), "DATABASE_ERROR");
    }
}
