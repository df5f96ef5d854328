//! Budget period repository.
//!
//! Implements `PeriodStore`: chain reads, period creation with its rollover
//! history entry, and atomic application of reconciliation repairs.
//! Overrides and history of a member are matched under either member kind.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, info};
use uuid::Uuid;

use carryover_core::engine::{ChainRepair, EngineError, PeriodStore};
use carryover_core::period::BudgetPeriod;
use carryover_core::rollover::{Correction, CorrectionKind, RolloverRecord};
use carryover_core::scope::Scope;
use carryover_shared::types::AccountBookId;

use super::error::{StoreError, is_unique_violation};
use super::mapping::{history_from_model, period_from_model, stored_kinds};
use crate::entities::{
    account_books, budget_amount_overrides, budget_periods, budget_rollover_history,
    rollover_corrections, sea_orm_active_enums::OwnerKind,
};

/// Repository for budget periods, rollover history and reconciliation audit.
#[derive(Debug, Clone)]
pub struct BudgetPeriodRepository {
    db: DatabaseConnection,
}

impl BudgetPeriodRepository {
    /// Creates a new budget period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn chain(scope: Scope, account_book_id: AccountBookId) -> Select<budget_periods::Entity> {
        budget_periods::Entity::find()
            .filter(budget_periods::Column::AccountBookId.eq(account_book_id.0))
            .filter(budget_periods::Column::OwnerKind.eq(OwnerKind::from(scope.kind)))
            .filter(budget_periods::Column::OwnerId.eq(scope.owner_id))
    }

    /// Inserts a period row on `conn`, mapping key conflicts.
    async fn insert_period<C: ConnectionTrait>(
        conn: &C,
        period: &BudgetPeriod,
        family_id: Option<Uuid>,
    ) -> Result<(), EngineError> {
        let now = Utc::now().into();
        let model = budget_periods::ActiveModel {
            id: Set(period.id.0),
            account_book_id: Set(period.account_book_id.0),
            owner_kind: Set(period.scope.kind.into()),
            owner_id: Set(period.scope.owner_id),
            user_id: Set(period.scope.user_id().map(|u| u.0)),
            family_id: Set(family_id),
            family_member_id: Set(period.scope.member_id().map(|m| m.0)),
            start_date: Set(period.start_date),
            end_date: Set(period.end_date),
            base_amount: Set(period.base_amount),
            rollover_enabled: Set(period.rollover_enabled),
            rollover_amount: Set(period.rollover_amount),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match model.insert(conn).await {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(EngineError::ConcurrentCreationConflict {
                scope: period.scope,
                start_date: period.start_date,
            }),
            Err(err) => Err(StoreError::from(err).into()),
        }
    }

    async fn book_family<C: ConnectionTrait>(
        conn: &C,
        account_book_id: AccountBookId,
    ) -> Result<Option<Uuid>, DbErr> {
        Ok(account_books::Entity::find_by_id(account_book_id.0)
            .one(conn)
            .await?
            .and_then(|book| book.family_id))
    }

    async fn insert_history<C: ConnectionTrait>(conn: &C, record: &RolloverRecord) -> Result<(), DbErr> {
        budget_rollover_history::ActiveModel {
            id: Set(Uuid::now_v7()),
            budget_period_id: Set(record.period_id.0),
            account_book_id: Set(record.account_book_id.0),
            owner_kind: Set(record.scope.kind.into()),
            owner_id: Set(record.scope.owner_id),
            period_start: Set(record.range.start),
            period_end: Set(record.range.end),
            base_amount: Set(record.base_amount),
            previous_rollover: Set(record.previous_rollover),
            spent: Set(record.spent),
            carried: Set(record.carried),
            kind: Set(record.kind.into()),
            created_at: Set(Utc::now().into()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    async fn insert_correction<C: ConnectionTrait>(
        conn: &C,
        account_book_id: AccountBookId,
        correction: &Correction,
    ) -> Result<(), DbErr> {
        rollover_corrections::ActiveModel {
            id: Set(Uuid::now_v7()),
            budget_period_id: Set(correction.period_id.0),
            account_book_id: Set(account_book_id.0),
            owner_kind: Set(correction.scope.kind.into()),
            owner_id: Set(correction.scope.owner_id),
            start_date: Set(correction.start_date),
            old_amount: Set(correction.old_amount),
            new_amount: Set(correction.new_amount),
            kind: Set(correction.kind.into()),
            created_at: Set(Utc::now().into()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }
}

impl PeriodStore for BudgetPeriodRepository {
    async fn list(&self, scope: Scope, account_book_id: AccountBookId) -> Result<Vec<BudgetPeriod>, EngineError> {
        let rows = Self::chain(scope, account_book_id)
            .order_by_asc(budget_periods::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(period_from_model).collect())
    }

    async fn latest(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        let row = Self::chain(scope, account_book_id)
            .order_by_desc(budget_periods::Column::StartDate)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(period_from_model))
    }

    async fn find_by_start(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        let row = Self::chain(scope, account_book_id)
            .filter(budget_periods::Column::StartDate.eq(start_date))
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(period_from_model))
    }

    async fn find_containing(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        date: NaiveDate,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        let row = Self::chain(scope, account_book_id)
            .filter(budget_periods::Column::StartDate.lte(date))
            .filter(budget_periods::Column::EndDate.gte(date))
            .order_by_desc(budget_periods::Column::StartDate)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(period_from_model))
    }

    async fn list_scopes(&self, account_book_id: AccountBookId) -> Result<Vec<Scope>, EngineError> {
        let pairs: Vec<(OwnerKind, Uuid)> = budget_periods::Entity::find()
            .filter(budget_periods::Column::AccountBookId.eq(account_book_id.0))
            .select_only()
            .column(budget_periods::Column::OwnerKind)
            .column(budget_periods::Column::OwnerId)
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;

        Ok(pairs
            .into_iter()
            .map(|(kind, owner_id)| Scope {
                kind: kind.into(),
                owner_id,
            })
            .collect())
    }

    async fn amount_override(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> Result<Option<Decimal>, EngineError> {
        let row = budget_amount_overrides::Entity::find()
            .filter(budget_amount_overrides::Column::AccountBookId.eq(account_book_id.0))
            .filter(budget_amount_overrides::Column::OwnerKind.is_in(stored_kinds(scope)))
            .filter(budget_amount_overrides::Column::OwnerId.eq(scope.owner_id))
            .filter(budget_amount_overrides::Column::EffectiveFrom.lte(start_date))
            .order_by_desc(budget_amount_overrides::Column::EffectiveFrom)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(|o| o.amount))
    }

    async fn rollover_history(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> Result<Vec<RolloverRecord>, EngineError> {
        let rows = budget_rollover_history::Entity::find()
            .filter(budget_rollover_history::Column::AccountBookId.eq(account_book_id.0))
            .filter(budget_rollover_history::Column::OwnerKind.is_in(stored_kinds(scope)))
            .filter(budget_rollover_history::Column::OwnerId.eq(scope.owner_id))
            .order_by_asc(budget_rollover_history::Column::PeriodStart)
            .order_by_asc(budget_rollover_history::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(history_from_model).collect())
    }

    async fn insert(&self, period: &BudgetPeriod, closed: Option<&RolloverRecord>) -> Result<(), EngineError> {
        let txn = self.db.begin().await.map_err(StoreError::from)?;
        let family_id = Self::book_family(&txn, period.account_book_id)
            .await
            .map_err(StoreError::from)?;

        // Dropping txn on conflict rolls it back
        Self::insert_period(&txn, period, family_id).await?;
        if let Some(record) = closed {
            Self::insert_history(&txn, record).await.map_err(StoreError::from)?;
        }

        txn.commit().await.map_err(StoreError::from)?;
        debug!(
            scope = %period.scope,
            period_id = %period.id,
            start = %period.start_date,
            "Budget period created"
        );
        Ok(())
    }

    async fn apply_repair(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        repair: &ChainRepair,
    ) -> Result<(), EngineError> {
        if repair.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin().await.map_err(StoreError::from)?;
        let family_id = Self::book_family(&txn, account_book_id)
            .await
            .map_err(StoreError::from)?;

        for period in &repair.inserts {
            Self::insert_period(&txn, period, family_id).await?;
        }

        let now = Utc::now();
        for correction in &repair.corrections {
            if correction.kind == CorrectionKind::RolloverDrift {
                budget_periods::Entity::update_many()
                    .col_expr(
                        budget_periods::Column::RolloverAmount,
                        Expr::value(correction.new_amount),
                    )
                    .col_expr(budget_periods::Column::UpdatedAt, Expr::value(now))
                    .filter(budget_periods::Column::Id.eq(correction.period_id.0))
                    .exec(&txn)
                    .await
                    .map_err(StoreError::from)?;
            }
            Self::insert_correction(&txn, account_book_id, correction)
                .await
                .map_err(StoreError::from)?;
        }

        txn.commit().await.map_err(StoreError::from)?;
        info!(
            scope = %scope,
            account_book_id = %account_book_id,
            inserts = repair.inserts.len(),
            corrections = repair.corrections.len(),
            "Chain repair applied"
        );
        Ok(())
    }
}
