//! Storage for attribution backfill and resumption cursors.

use uuid::Uuid;

use carryover_shared::types::{AccountBookId, BudgetPeriodId};

use super::types::{
    AttributionChange, BudgetAttributionRecord, BudgetFix, RepairCursor, TransactionAttributionRecord,
    TransactionFix,
};
use crate::engine::EngineError;
use crate::scope::Scope;

/// Repository trait for repair runs.
pub trait RepairStore: Send + Sync {
    /// Budgets of a family account book with missing family or member
    /// attribution, or still owned by one of the `stale` scopes, ordered by
    /// id, strictly after `after`.
    fn budgets_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        stale: &[Scope],
        after: Option<Uuid>,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<BudgetAttributionRecord>, EngineError>> + Send;

    /// Transactions of a family account book with no family member,
    /// ordered by id, strictly after `after`.
    fn transactions_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        after: Option<Uuid>,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<TransactionAttributionRecord>, EngineError>> + Send;

    /// Ownership columns of the given budgets.
    fn budgets_by_ids(
        &self,
        ids: &[BudgetPeriodId],
    ) -> impl std::future::Future<Output = Result<Vec<BudgetAttributionRecord>, EngineError>> + Send;

    /// Writes one budget's attribution and records the change under
    /// `run_id` atomically.
    ///
    /// Returns `EngineError::ConcurrentCreationConflict` if the member
    /// already owns a period with the same start date.
    fn apply_budget_fix(
        &self,
        run_id: Uuid,
        fix: &BudgetFix,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Writes a batch of transaction attributions and their change records
    /// in one transaction.
    fn apply_transaction_fixes(
        &self,
        run_id: Uuid,
        fixes: &[TransactionFix],
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Attribution changes recorded by a run, ordered by record id.
    fn run_changes(
        &self,
        run_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AttributionChange>, EngineError>> + Send;

    /// Restores the `before` columns of one change and marks it rolled back.
    ///
    /// Returns `false`, writing nothing, when the record no longer holds
    /// the `after` columns. Returns `EngineError::ConcurrentCreationConflict`
    /// when a restored budget would collide with an existing period.
    fn revert_change(
        &self,
        change: &AttributionChange,
    ) -> impl std::future::Future<Output = Result<bool, EngineError>> + Send;

    /// Stored cursor of an account book.
    fn load_cursor(
        &self,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<Option<RepairCursor>, EngineError>> + Send;

    /// Upserts the cursor of an account book.
    fn save_cursor(
        &self,
        cursor: &RepairCursor,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Removes the cursor of an account book.
    fn clear_cursor(
        &self,
        account_book_id: AccountBookId,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;
}
