//! Storage traits implemented by the db crate.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use carryover_shared::types::{AccountBookId, FamilyId};

use super::error::EngineError;
use crate::period::{AccountBookConfig, BudgetPeriod, DateRange};
use crate::rollover::{Correction, RolloverRecord};
use crate::scope::{FamilyContext, Scope};
use crate::spend::SpendFilter;

/// Writes produced by reconciling one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRepair {
    /// Gap-filling periods to insert.
    pub inserts: Vec<BudgetPeriod>,
    /// Every correction; drift entries update stored periods, all entries
    /// are written to the audit table.
    pub corrections: Vec<Correction>,
}

impl ChainRepair {
    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.corrections.is_empty()
    }
}

/// Budget period persistence.
pub trait PeriodStore: Send + Sync {
    /// All periods of a scope in an account book, in no particular order.
    fn list(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Vec<BudgetPeriod>, EngineError>> + Send;

    /// Period with the greatest start date.
    fn latest(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Option<BudgetPeriod>, EngineError>> + Send;

    /// Period with the given start date.
    fn find_by_start(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<BudgetPeriod>, EngineError>> + Send;

    /// Period whose range contains `date`.
    fn find_containing(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<BudgetPeriod>, EngineError>> + Send;

    /// Distinct scopes that own at least one period in the account book.
    fn list_scopes(
        &self,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Vec<Scope>, EngineError>> + Send;

    /// Override amount with the greatest `effective_from <= start_date`.
    ///
    /// Member scopes match on the member id whatever kind the override was
    /// written under.
    fn amount_override(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<Decimal>, EngineError>> + Send;

    /// Rollover history of a scope, oldest period first.
    ///
    /// Member scopes match on the member id whatever kind the entries were
    /// written under.
    fn rollover_history(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Vec<RolloverRecord>, EngineError>> + Send;

    /// Inserts a period, together with the history entry of the period it
    /// closes.
    ///
    /// Returns `EngineError::ConcurrentCreationConflict` when the
    /// (scope, account book, start date) key is taken.
    fn insert(
        &self,
        period: &BudgetPeriod,
        closed: Option<&RolloverRecord>,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Applies a scope's repair atomically, audit rows included.
    fn apply_repair(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        repair: &ChainRepair,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;
}

/// Expense aggregation over the transaction store.
pub trait SpendSource: Send + Sync {
    /// Sum of EXPENSE amounts matching the filter in the book and range.
    fn expense_total(
        &self,
        filter: &SpendFilter,
        account_book_id: AccountBookId,
        range: DateRange,
    ) -> impl std::future::Future<Output = Result<Decimal, EngineError>> + Send;
}

/// Account book and family lookups.
pub trait Directory: Send + Sync {
    /// Account book configuration.
    fn account_book(
        &self,
        id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Option<AccountBookConfig>, EngineError>> + Send;

    /// Family with its members.
    fn family(
        &self,
        id: FamilyId,
    ) -> impl std::future::Future<Output = Result<Option<FamilyContext>, EngineError>> + Send;

    /// IDs of every account book.
    fn account_books(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<AccountBookId>, EngineError>> + Send;
}
