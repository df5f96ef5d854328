//! `SeaORM` entity definitions.

pub mod prelude;

pub mod account_books;
pub mod attribution_changes;
pub mod budget_amount_overrides;
pub mod budget_periods;
pub mod budget_rollover_history;
pub mod families;
pub mod family_members;
pub mod repair_cursors;
pub mod rollover_corrections;
pub mod sea_orm_active_enums;
pub mod transactions;
