//! Budget status and sweep reports.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use carryover_shared::types::{AccountBookId, BudgetPeriodId, Currency, Money};

use crate::period::{BudgetPeriod, DateRange};
use crate::rollover::Correction;
use crate::scope::{Scope, UnresolvedReason};

/// Figures for the period containing an as-of date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetStatus {
    /// Scope.
    pub scope: Scope,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Period the figures belong to.
    pub period_id: BudgetPeriodId,
    /// Period bounds.
    pub period: DateRange,
    /// Budgeted amount.
    pub base_amount: Decimal,
    /// Carry-over counted in this period (0 when disabled).
    pub rollover_amount: Decimal,
    /// `base_amount + rollover_amount`.
    pub available: Decimal,
    /// Expense total over the whole period.
    pub spent: Decimal,
    /// `available - spent`; negative when overspent.
    pub remaining: Decimal,
    /// Days left including the as-of date.
    pub days_remaining: i64,
    /// Currency of all amounts.
    pub currency: Currency,
}

impl BudgetStatus {
    /// Builds the status of `period` as of `as_of`.
    #[must_use]
    pub fn new(period: &BudgetPeriod, spent: Decimal, as_of: NaiveDate, currency: Currency) -> Self {
        let available = period.available();
        Self {
            scope: period.scope,
            account_book_id: period.account_book_id,
            period_id: period.id,
            period: period.range(),
            base_amount: period.base_amount,
            rollover_amount: period.effective_rollover(),
            available,
            spent,
            remaining: available - spent,
            days_remaining: (period.end_date - as_of).num_days() + 1,
            currency,
        }
    }

    /// Amount in the account book's currency.
    #[must_use]
    pub const fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }

    /// Spending has gone past what was available.
    #[must_use]
    pub fn is_overspent(&self) -> bool {
        self.money(self.remaining).is_negative()
    }
}

/// A status figure that is either computed or explicitly unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusFigure {
    /// Ownership resolved; figures computed.
    Available(BudgetStatus),
    /// Ownership could not be resolved; no figure is shown.
    Unavailable {
        /// Why resolution failed.
        reason: UnresolvedReason,
    },
}

/// A scope whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeFailure {
    /// Scope.
    pub scope: Scope,
    /// Error message.
    pub error: String,
}

/// Outcome of sweeping one account book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Scopes visited.
    pub scopes: usize,
    /// Periods created by chain extension.
    pub periods_created: usize,
    /// Corrections applied by reconciliation.
    pub corrections: Vec<Correction>,
    /// Scopes that failed.
    pub failures: Vec<ScopeFailure>,
}
