//! Transaction repository: expense totals per scope.

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
    sea_query::Expr,
};

use carryover_core::engine::{EngineError, SpendSource};
use carryover_core::period::DateRange;
use carryover_core::spend::SpendFilter;
use carryover_shared::types::AccountBookId;

use super::error::StoreError;
use crate::entities::{sea_orm_active_enums::TransactionType, transactions};

/// Repository for transaction reads.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Owner condition matching `SpendFilter` semantics.
pub(crate) fn owner_condition(filter: &SpendFilter) -> Condition {
    match *filter {
        SpendFilter::User { user_id } => Condition::all()
            .add(transactions::Column::UserId.eq(user_id.0))
            .add(transactions::Column::FamilyMemberId.is_null()),
        SpendFilter::Member {
            member_id,
            linked_user,
        } => {
            let by_member = Condition::any().add(transactions::Column::FamilyMemberId.eq(member_id.0));
            match linked_user {
                Some(user) => by_member.add(
                    Condition::all()
                        .add(transactions::Column::FamilyMemberId.is_null())
                        .add(transactions::Column::UserId.eq(user.0)),
                ),
                None => by_member,
            }
        }
    }
}

impl SpendSource for TransactionRepository {
    async fn expense_total(
        &self,
        filter: &SpendFilter,
        account_book_id: AccountBookId,
        range: DateRange,
    ) -> Result<Decimal, EngineError> {
        let total: Option<Option<Decimal>> = transactions::Entity::find()
            .filter(transactions::Column::AccountBookId.eq(account_book_id.0))
            .filter(transactions::Column::TransactionType.eq(TransactionType::Expense))
            .filter(transactions::Column::TransactionDate.between(range.start, range.end))
            .filter(owner_condition(filter))
            .select_only()
            .column_as(Expr::col(transactions::Column::Amount).sum(), "total")
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;

        Ok(total.flatten().unwrap_or_default())
    }
}
