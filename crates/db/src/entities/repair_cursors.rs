//! `SeaORM` Entity for repair_cursors table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{OwnerKind, RepairPhase};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "repair_cursors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_book_id: Uuid,
    pub phase: RepairPhase,
    pub last_id: Option<Uuid>,
    pub last_owner_kind: Option<OwnerKind>,
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
}

impl Related<super::account_books::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountBooks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
