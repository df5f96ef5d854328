//! `SeaORM` Entity for budget_amount_overrides table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::OwnerKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_amount_overrides")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_book_id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub effective_from: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account_books::Entity",
        from = "Column::AccountBookId",
        to = "super::account_books::Column::Id"
    )]
    AccountBooks,
}

impl Related<super::account_books::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountBooks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
