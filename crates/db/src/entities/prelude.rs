//! Entity re-exports.

pub use super::account_books::Entity as AccountBooks;
pub use super::attribution_changes::Entity as AttributionChanges;
pub use super::budget_amount_overrides::Entity as BudgetAmountOverrides;
pub use super::budget_periods::Entity as BudgetPeriods;
pub use super::budget_rollover_history::Entity as BudgetRolloverHistory;
pub use super::families::Entity as Families;
pub use super::family_members::Entity as FamilyMembers;
pub use super::repair_cursors::Entity as RepairCursors;
pub use super::rollover_corrections::Entity as RolloverCorrections;
pub use super::transactions::Entity as Transactions;
