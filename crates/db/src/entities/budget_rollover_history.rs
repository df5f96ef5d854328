//! `SeaORM` Entity for budget_rollover_history table.
//!
//! One row per closed period, written when the generator carries it forward.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{OwnerKind, RolloverKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_rollover_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_period_id: Uuid,
    pub account_book_id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub period_start: Date,
    pub period_end: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub previous_rollover: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub spent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub carried: Decimal,
    pub kind: RolloverKind,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budget_periods::Entity",
        from = "Column::BudgetPeriodId",
        to = "super::budget_periods::Column::Id"
    )]
    BudgetPeriods,
}

impl Related<super::budget_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
