//! Budget period data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carryover_shared::types::{AccountBookId, BudgetPeriodId, Currency, FamilyId};

use super::schedule::PeriodSchedule;
use crate::scope::Scope;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns true if the given date falls within this range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Implicit state of a period relative to an as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    /// `end_date >= as_of`; figures are recomputed live.
    Open,
    /// `end_date < as_of`; its carry-over feeds the next period.
    Closed,
}

/// One budget period in a scope's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    /// Period ID.
    pub id: BudgetPeriodId,
    /// Owning scope.
    pub scope: Scope,
    /// Account book the budget lives in.
    pub account_book_id: AccountBookId,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
    /// Budgeted amount for the period.
    pub base_amount: Decimal,
    /// Whether carry-over applies to this period.
    pub rollover_enabled: bool,
    /// Amount carried into this period from the previous one (signed).
    pub rollover_amount: Decimal,
}

impl BudgetPeriod {
    /// Date range covered by the period.
    #[must_use]
    pub const fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Carry-over that counts toward this period's budget.
    #[must_use]
    pub fn effective_rollover(&self) -> Decimal {
        if self.rollover_enabled {
            self.rollover_amount
        } else {
            Decimal::ZERO
        }
    }

    /// `base_amount + effective_rollover`.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.base_amount + self.effective_rollover()
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }

    /// Open or closed relative to `as_of`.
    #[must_use]
    pub fn state(&self, as_of: NaiveDate) -> PeriodState {
        if self.end_date < as_of {
            PeriodState::Closed
        } else {
            PeriodState::Open
        }
    }
}

/// Account book settings the engine depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBookConfig {
    /// Account book ID.
    pub id: AccountBookId,
    /// Family the book belongs to; `None` for personal books.
    pub family_id: Option<FamilyId>,
    /// Period length and refresh day.
    pub schedule: PeriodSchedule,
    /// Currency amounts are kept in.
    pub currency: Currency,
}

#[cfg(test)]
mod tests {
    use super::*;
    use carryover_shared::types::UserId;
    use rust_decimal_macros::dec;

    fn period(enabled: bool, rollover: Decimal) -> BudgetPeriod {
        BudgetPeriod {
            id: BudgetPeriodId::new(),
            scope: Scope::user(UserId::new()),
            account_book_id: AccountBookId::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            base_amount: dec!(1000),
            rollover_enabled: enabled,
            rollover_amount: rollover,
        }
    }

    #[test]
    fn test_available_includes_enabled_rollover() {
        assert_eq!(period(true, dec!(180)).available(), dec!(1180));
        assert_eq!(period(true, dec!(-250)).available(), dec!(750));
    }

    #[test]
    fn test_available_ignores_disabled_rollover() {
        let p = period(false, dec!(180));
        assert_eq!(p.available(), dec!(1000));
        assert_eq!(p.effective_rollover(), Decimal::ZERO);
    }

    #[test]
    fn test_state_relative_to_as_of() {
        let p = period(true, Decimal::ZERO);
        let last_day = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        assert_eq!(p.state(last_day), PeriodState::Open);
        assert_eq!(p.state(last_day.succ_opt().unwrap()), PeriodState::Closed);
    }
}
