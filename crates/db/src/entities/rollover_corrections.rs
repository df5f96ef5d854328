//! `SeaORM` Entity for rollover_corrections table (reconciliation audit).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{CorrectionKind, OwnerKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "rollover_corrections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_period_id: Uuid,
    pub account_book_id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub start_date: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub old_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub new_amount: Decimal,
    pub kind: CorrectionKind,
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
