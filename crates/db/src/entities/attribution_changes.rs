//! `SeaORM` Entity for attribution_changes table.
//!
//! One row per attribution a repair run wrote, keyed by (run, record).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{FixMethod, OwnerKind, RecordKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "attribution_changes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub run_id: Uuid,
    pub account_book_id: Uuid,
    pub record_kind: RecordKind,
    pub record_id: Uuid,
    pub method: FixMethod,
    pub old_family_id: Option<Uuid>,
    pub old_family_member_id: Option<Uuid>,
    pub old_owner_kind: Option<OwnerKind>,
    pub old_owner_id: Option<Uuid>,
    pub new_family_id: Option<Uuid>,
    pub new_family_member_id: Option<Uuid>,
    pub new_owner_kind: Option<OwnerKind>,
    pub new_owner_id: Option<Uuid>,
    pub rolled_back_at: Option<DateTimeWithTimeZone>,
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
