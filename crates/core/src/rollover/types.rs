//! Rollover data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carryover_shared::types::{AccountBookId, BudgetPeriodId};

use crate::period::{BudgetPeriod, DateRange};
use crate::scope::Scope;

/// Direction of a carry-over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloverKind {
    /// Unspent budget carried forward.
    Surplus,
    /// Overspend carried forward as negative budget.
    Deficit,
}

impl RolloverKind {
    /// Classifies a carried amount.
    #[must_use]
    pub fn of(carried: Decimal) -> Self {
        if carried.is_sign_negative() && !carried.is_zero() {
            Self::Deficit
        } else {
            Self::Surplus
        }
    }
}

/// History entry written when a period is closed and carried forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverRecord {
    /// The closed period.
    pub period_id: BudgetPeriodId,
    /// Owning scope.
    pub scope: Scope,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Range of the closed period.
    pub range: DateRange,
    /// Base amount of the closed period.
    pub base_amount: Decimal,
    /// Carry-over that was counted in the closed period.
    pub previous_rollover: Decimal,
    /// Expense total of the closed period.
    pub spent: Decimal,
    /// Amount carried into the next period.
    pub carried: Decimal,
    /// Surplus or deficit.
    pub kind: RolloverKind,
}

/// Warning-level observation about a carry-over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverAnomaly {
    /// Carry-over magnitude exceeds five times the base amount.
    Oversized,
    /// Deficit exceeds twice the base amount.
    HeavyDeficit,
}

/// What a correction changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionKind {
    /// A stored rollover amount disagreed with the chain and was overwritten.
    RolloverDrift,
    /// A missing period was synthesized to close a gap in the chain.
    GapFilled,
}

/// Audit entry produced by chain reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Corrected (or created) period.
    pub period_id: BudgetPeriodId,
    /// Owning scope.
    pub scope: Scope,
    /// Start of the period.
    pub start_date: NaiveDate,
    /// Previously stored rollover; `None` for synthesized periods.
    pub old_amount: Option<Decimal>,
    /// Rollover recomputed from the chain.
    pub new_amount: Decimal,
    /// Kind of correction.
    pub kind: CorrectionKind,
}

impl Correction {
    /// Drift correction on a stored period.
    #[must_use]
    pub fn drift(period: &BudgetPeriod, old_amount: Decimal) -> Self {
        Self {
            period_id: period.id,
            scope: period.scope,
            start_date: period.start_date,
            old_amount: Some(old_amount),
            new_amount: period.rollover_amount,
            kind: CorrectionKind::RolloverDrift,
        }
    }

    /// Creation of a gap-filling period.
    #[must_use]
    pub fn gap_filled(period: &BudgetPeriod) -> Self {
        Self {
            period_id: period.id,
            scope: period.scope,
            start_date: period.start_date,
            old_amount: None,
            new_amount: period.rollover_amount,
            kind: CorrectionKind::GapFilled,
        }
    }
}
