//! Repair repository: attribution backfill, the per-run change log that
//! makes a run reversible, and run cursors.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use tracing::debug;
use uuid::Uuid;

use carryover_core::engine::EngineError;
use carryover_core::repair::{
    Attribution, AttributionChange, BudgetAttributionRecord, BudgetFix, RecordKind, RepairCursor,
    RepairStore, TransactionAttributionRecord, TransactionFix,
};
use carryover_core::scope::Scope;
use carryover_shared::types::{AccountBookId, BudgetPeriodId, FamilyId, TransactionId, UserId};

use super::error::{StoreError, is_unique_violation};
use super::mapping::{attribution_from_model, change_from_model, change_to_active};
use crate::entities::{
    account_books, attribution_changes, budget_periods, repair_cursors,
    sea_orm_active_enums::OwnerKind, transactions,
};

/// Repository for repair runs.
#[derive(Debug, Clone)]
pub struct RepairRepository {
    db: DatabaseConnection,
}

impl RepairRepository {
    /// Creates a new repair repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Only family account books have anything to attribute.
    async fn is_family_book(&self, account_book_id: AccountBookId) -> Result<bool, StoreError> {
        Ok(account_books::Entity::find_by_id(account_book_id.0)
            .one(&self.db)
            .await?
            .is_some_and(|book| book.family_id.is_some()))
    }
}

/// Marks one change of a run as rolled back.
async fn mark_rolled_back<C: ConnectionTrait>(conn: &C, change: &AttributionChange) -> Result<(), StoreError> {
    attribution_changes::Entity::update_many()
        .col_expr(attribution_changes::Column::RolledBackAt, Expr::value(Utc::now()))
        .filter(attribution_changes::Column::RunId.eq(change.run_id))
        .filter(attribution_changes::Column::RecordId.eq(change.record_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Condition matching a nullable uuid column against an optional value.
fn column_is<C: ColumnTrait>(column: C, value: Option<Uuid>) -> Condition {
    match value {
        Some(value) => Condition::all().add(column.eq(value)),
        None => Condition::all().add(column.is_null()),
    }
}

/// Pages a query by ascending id, strictly after `after`.
fn page<E>(query: Select<E>, id: E::Column, after: Option<Uuid>, limit: u64) -> Select<E>
where
    E: EntityTrait,
{
    let query = match after {
        Some(after) => query.filter(id.gt(after)),
        None => query,
    };
    query.order_by_asc(id).limit(limit)
}

impl RepairStore for RepairRepository {
    async fn budgets_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        stale: &[Scope],
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<BudgetAttributionRecord>, EngineError> {
        if !self.is_family_book(account_book_id).await? {
            return Ok(Vec::new());
        }

        let mut needs_fix = Condition::any()
            .add(budget_periods::Column::FamilyId.is_null())
            .add(budget_periods::Column::FamilyMemberId.is_null());
        for scope in stale {
            needs_fix = needs_fix.add(
                Condition::all()
                    .add(budget_periods::Column::OwnerKind.eq(OwnerKind::from(scope.kind)))
                    .add(budget_periods::Column::OwnerId.eq(scope.owner_id)),
            );
        }
        let query = budget_periods::Entity::find()
            .filter(budget_periods::Column::AccountBookId.eq(account_book_id.0))
            .filter(needs_fix);
        let rows = page(query, budget_periods::Column::Id, after, limit)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;

        Ok(rows.iter().map(attribution_from_model).collect())
    }

    async fn transactions_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<TransactionAttributionRecord>, EngineError> {
        if !self.is_family_book(account_book_id).await? {
            return Ok(Vec::new());
        }

        let query = transactions::Entity::find()
            .filter(transactions::Column::AccountBookId.eq(account_book_id.0))
            .filter(transactions::Column::FamilyMemberId.is_null());
        let rows = page(query, transactions::Column::Id, after, limit)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;

        Ok(rows
            .into_iter()
            .map(|t| TransactionAttributionRecord {
                id: TransactionId(t.id),
                account_book_id: AccountBookId(t.account_book_id),
                user_id: t.user_id.map(UserId),
                family_id: t.family_id.map(FamilyId),
                budget_id: t.budget_id.map(BudgetPeriodId),
            })
            .collect())
    }

    async fn budgets_by_ids(&self, ids: &[BudgetPeriodId]) -> Result<Vec<BudgetAttributionRecord>, EngineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = budget_periods::Entity::find()
            .filter(budget_periods::Column::Id.is_in(ids.iter().map(|id| id.0)))
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.iter().map(attribution_from_model).collect())
    }

    async fn apply_budget_fix(&self, run_id: Uuid, fix: &BudgetFix) -> Result<(), EngineError> {
        let txn = self.db.begin().await.map_err(StoreError::from)?;
        let Some(budget) = budget_periods::Entity::find_by_id(fix.id.0)
            .one(&txn)
            .await
            .map_err(StoreError::from)?
        else {
            return Err(EngineError::integrity(format!("Budget {} disappeared during repair", fix.id)));
        };
        let account_book_id = AccountBookId(budget.account_book_id);

        let start_date = budget.start_date;
        let mut active = budget.into_active_model();
        active.family_id = Set(Some(fix.family_id.0));
        active.family_member_id = Set(Some(fix.family_member_id.0));
        active.owner_kind = Set(OwnerKind::from(fix.scope.kind));
        active.owner_id = Set(fix.scope.owner_id);
        active.updated_at = Set(Utc::now().into());

        // Dropping txn on conflict rolls it back
        match active.update(&txn).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(EngineError::ConcurrentCreationConflict {
                    scope: fix.scope,
                    start_date,
                });
            }
            Err(err) => return Err(StoreError::from(err).into()),
        }
        change_to_active(&fix.change(run_id, account_book_id))
            .insert(&txn)
            .await
            .map_err(StoreError::from)?;
        txn.commit().await.map_err(StoreError::from)?;

        debug!(%run_id, budget_id = %fix.id, scope = %fix.scope, "Budget attribution written");
        Ok(())
    }

    async fn apply_transaction_fixes(&self, run_id: Uuid, fixes: &[TransactionFix]) -> Result<(), EngineError> {
        if fixes.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin().await.map_err(StoreError::from)?;
        for fix in fixes {
            let written = transactions::Entity::update_many()
                .col_expr(transactions::Column::FamilyId, Expr::value(fix.family_id.0))
                .col_expr(
                    transactions::Column::FamilyMemberId,
                    Expr::value(fix.family_member_id.0),
                )
                .filter(transactions::Column::Id.eq(fix.id.0))
                .filter(transactions::Column::FamilyMemberId.is_null())
                .exec_with_returning(&txn)
                .await
                .map_err(StoreError::from)?;
            let Some(row) = written.first() else {
                continue;
            };
            let change = fix.change(run_id, AccountBookId(row.account_book_id));
            change_to_active(&change).insert(&txn).await.map_err(StoreError::from)?;
        }
        txn.commit().await.map_err(StoreError::from)?;

        debug!(%run_id, count = fixes.len(), "Transaction attributions written");
        Ok(())
    }

    async fn run_changes(&self, run_id: Uuid) -> Result<Vec<AttributionChange>, EngineError> {
        let rows = attribution_changes::Entity::find()
            .filter(attribution_changes::Column::RunId.eq(run_id))
            .order_by_asc(attribution_changes::Column::RecordId)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(change_from_model).collect())
    }

    async fn revert_change(&self, change: &AttributionChange) -> Result<bool, EngineError> {
        let txn = self.db.begin().await.map_err(StoreError::from)?;
        let Attribution {
            family_id: before_family,
            family_member_id: before_member,
            scope: before_scope,
        } = change.before;
        let after = change.after;

        let restored = match change.kind {
            RecordKind::Budget => {
                let (Some(scope), Some(after_scope)) = (before_scope, after.scope) else {
                    return Err(EngineError::integrity(format!(
                        "Budget change of {} has no owner scope",
                        change.record_id
                    )));
                };
                let still_as_written = Condition::all()
                    .add(budget_periods::Column::Id.eq(change.record_id))
                    .add(column_is(budget_periods::Column::FamilyId, after.family_id.map(|id| id.0)))
                    .add(column_is(
                        budget_periods::Column::FamilyMemberId,
                        after.family_member_id.map(|id| id.0),
                    ))
                    .add(budget_periods::Column::OwnerKind.eq(OwnerKind::from(after_scope.kind)))
                    .add(budget_periods::Column::OwnerId.eq(after_scope.owner_id));
                let Some(budget) = budget_periods::Entity::find()
                    .filter(still_as_written)
                    .one(&txn)
                    .await
                    .map_err(StoreError::from)?
                else {
                    return Ok(false);
                };

                let start_date = budget.start_date;
                let mut active = budget.into_active_model();
                active.family_id = Set(before_family.map(|id| id.0));
                active.family_member_id = Set(before_member.map(|id| id.0));
                active.owner_kind = Set(OwnerKind::from(scope.kind));
                active.owner_id = Set(scope.owner_id);
                active.updated_at = Set(Utc::now().into());
                match active.update(&txn).await {
                    Ok(_) => true,
                    Err(err) if is_unique_violation(&err) => {
                        return Err(EngineError::ConcurrentCreationConflict { scope, start_date });
                    }
                    Err(err) => return Err(StoreError::from(err).into()),
                }
            }
            RecordKind::Transaction => {
                let result = transactions::Entity::update_many()
                    .col_expr(transactions::Column::FamilyId, Expr::value(before_family.map(|id| id.0)))
                    .col_expr(
                        transactions::Column::FamilyMemberId,
                        Expr::value(before_member.map(|id| id.0)),
                    )
                    .filter(transactions::Column::Id.eq(change.record_id))
                    .filter(column_is(transactions::Column::FamilyId, after.family_id.map(|id| id.0)))
                    .filter(column_is(
                        transactions::Column::FamilyMemberId,
                        after.family_member_id.map(|id| id.0),
                    ))
                    .exec(&txn)
                    .await
                    .map_err(StoreError::from)?;
                result.rows_affected > 0
            }
        };

        if !restored {
            return Ok(false);
        }
        mark_rolled_back(&txn, change).await?;
        txn.commit().await.map_err(StoreError::from)?;
        debug!(run_id = %change.run_id, record_id = %change.record_id, "Attribution restored");
        Ok(true)
    }

    async fn load_cursor(&self, account_book_id: AccountBookId) -> Result<Option<RepairCursor>, EngineError> {
        let row = repair_cursors::Entity::find_by_id(account_book_id.0)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(|c| RepairCursor {
            account_book_id: AccountBookId(c.account_book_id),
            phase: c.phase.into(),
            last_id: c.last_id,
            last_kind: c.last_owner_kind.map(Into::into),
        }))
    }

    async fn save_cursor(&self, cursor: &RepairCursor) -> Result<(), EngineError> {
        let model = repair_cursors::ActiveModel {
            account_book_id: Set(cursor.account_book_id.0),
            phase: Set(cursor.phase.into()),
            last_id: Set(cursor.last_id),
            last_owner_kind: Set(cursor.last_kind.map(Into::into)),
            updated_at: Set(Utc::now().into()),
        };

        repair_cursors::Entity::insert(model)
            .on_conflict(
                OnConflict::column(repair_cursors::Column::AccountBookId)
                    .update_columns([
                        repair_cursors::Column::Phase,
                        repair_cursors::Column::LastId,
                        repair_cursors::Column::LastOwnerKind,
                        repair_cursors::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn clear_cursor(&self, account_book_id: AccountBookId) -> Result<(), EngineError> {
        repair_cursors::Entity::delete_by_id(account_book_id.0)
            .exec(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}
