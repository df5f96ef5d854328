//! `SeaORM` Entity for budget_periods table.
//!
//! `(owner_kind, owner_id)` is the canonical scope. `user_id`, `family_id`
//! and `family_member_id` are the raw attribution columns the repair run
//! backfills.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::OwnerKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_book_id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub user_id: Option<Uuid>,
    pub family_id: Option<Uuid>,
    pub family_member_id: Option<Uuid>,
    pub start_date: Date,
    pub end_date: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_amount: Decimal,
    pub rollover_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub rollover_amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account_books::Entity",
        from = "Column::AccountBookId",
        to = "super::account_books::Column::Id"
    )]
    AccountBooks,
    #[sea_orm(has_many = "super::budget_rollover_history::Entity")]
    BudgetRolloverHistory,
    #[sea_orm(has_many = "super::rollover_corrections::Entity")]
    RolloverCorrections,
}

impl Related<super::account_books::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountBooks.def()
    }
}

impl Related<super::budget_rollover_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetRolloverHistory.def()
    }
}

impl Related<super::rollover_corrections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolloverCorrections.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
