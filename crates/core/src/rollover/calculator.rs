//! Carry-over arithmetic.

use rust_decimal::Decimal;

use super::types::{RolloverAnomaly, RolloverKind, RolloverRecord};
use crate::period::BudgetPeriod;

/// Largest difference between a stored and a recomputed rollover that is not drift.
pub const DRIFT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Carry-over magnitude, as a multiple of base amount, flagged as oversized.
const OVERSIZED_FACTOR: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Deficit, as a multiple of base amount, flagged as heavy.
const HEAVY_DEFICIT_FACTOR: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

/// Pure rollover computations.
pub struct RolloverCalculator;

impl RolloverCalculator {
    /// Amount the period after `prev` inherits.
    ///
    /// `available(prev) - prev_spent`, with no floor: overspending carries
    /// forward as a negative amount.
    #[must_use]
    pub fn next_rollover(prev: &BudgetPeriod, prev_spent: Decimal) -> Decimal {
        prev.available() - prev_spent
    }

    /// Rollover stored on the next period: the computed amount when the next
    /// period has rollover enabled, zero otherwise.
    #[must_use]
    pub fn carry_into(next_rollover_enabled: bool, computed: Decimal) -> Decimal {
        if next_rollover_enabled {
            computed
        } else {
            Decimal::ZERO
        }
    }

    /// Returns true if `stored` differs from `expected` by more than the tolerance.
    #[must_use]
    pub fn is_drift(stored: Decimal, expected: Decimal) -> bool {
        (stored - expected).abs() > DRIFT_TOLERANCE
    }

    /// Flags carry-overs that are legal but worth a look.
    #[must_use]
    pub fn assess(base_amount: Decimal, carried: Decimal) -> Option<RolloverAnomaly> {
        if base_amount <= Decimal::ZERO {
            return None;
        }
        if carried.abs() > base_amount * OVERSIZED_FACTOR {
            return Some(RolloverAnomaly::Oversized);
        }
        if -carried > base_amount * HEAVY_DEFICIT_FACTOR {
            return Some(RolloverAnomaly::HeavyDeficit);
        }
        None
    }

    /// History entry for closing `prev` with `carried` flowing forward.
    #[must_use]
    pub fn record(prev: &BudgetPeriod, spent: Decimal, carried: Decimal) -> RolloverRecord {
        RolloverRecord {
            period_id: prev.id,
            scope: prev.scope,
            account_book_id: prev.account_book_id,
            range: prev.range(),
            base_amount: prev.base_amount,
            previous_rollover: prev.effective_rollover(),
            spent,
            carried,
            kind: RolloverKind::of(carried),
        }
    }
}
