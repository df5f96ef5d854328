//! `SeaORM` Entity for families table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "families")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::family_members::Entity")]
    FamilyMembers,
    #[sea_orm(has_many = "super::account_books::Entity")]
    AccountBooks,
}

impl Related<super::family_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FamilyMembers.def()
    }
}

impl Related<super::account_books::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountBooks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
