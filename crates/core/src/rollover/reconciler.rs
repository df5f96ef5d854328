//! Pure chain reconciliation.
//!
//! The chain of a scope is folded from its earliest period forward: every
//! period's rollover is recomputed from its predecessor's available amount
//! and spend. Storage and spend lookup live in the engine; this module only
//! orders, checks, and walks.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::calculator::RolloverCalculator;
use super::types::Correction;
use crate::engine::EngineError;
use crate::period::{BudgetPeriod, DateRange, PeriodSchedule, ScheduleError};
use crate::scope::Scope;

/// Where a link in the walked chain came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    /// Already persisted.
    Stored,
    /// Synthesized to fill a gap; persisted only when the plan is applied.
    GapFill,
}

/// One period in the chain being walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// The period, updated in place by [`walk`].
    pub period: BudgetPeriod,
    /// Origin of the period.
    pub origin: LinkOrigin,
}

impl ChainLink {
    /// Link for a persisted period.
    #[must_use]
    pub const fn stored(period: BudgetPeriod) -> Self {
        Self {
            period,
            origin: LinkOrigin::Stored,
        }
    }

    /// Link for a synthesized gap-filling period.
    #[must_use]
    pub const fn gap_fill(period: BudgetPeriod) -> Self {
        Self {
            period,
            origin: LinkOrigin::GapFill,
        }
    }
}

/// Sorts a scope's periods by start date and rejects malformed chains.
///
/// # Errors
///
/// `DataIntegrity` for an inverted period, `PeriodOverlap` when a period
/// starts on or before its predecessor's end.
pub fn order_chain(
    scope: Scope,
    mut periods: Vec<BudgetPeriod>,
) -> Result<Vec<BudgetPeriod>, EngineError> {
    periods.sort_by_key(|p| p.start_date);

    if let Some(bad) = periods.iter().find(|p| p.end_date < p.start_date) {
        return Err(EngineError::integrity(format!(
            "period {} of scope {scope} ends before it starts",
            bad.id
        )));
    }

    for pair in periods.windows(2) {
        if pair[1].start_date <= pair[0].end_date {
            return Err(EngineError::PeriodOverlap {
                scope,
                first: pair[0].id,
                second: pair[1].id,
            });
        }
    }

    Ok(periods)
}

/// Ranges of the periods missing between `prev_end` and `next_start`.
///
/// Ranges follow the schedule; the last one is cut short at `next_start - 1`
/// if the stored successor is misaligned. Returns an empty list for
/// contiguous periods.
pub fn gap_ranges(
    schedule: &PeriodSchedule,
    prev_end: NaiveDate,
    next_start: NaiveDate,
) -> Result<Vec<DateRange>, ScheduleError> {
    let mut ranges = Vec::new();
    let mut start = prev_end
        .succ_opt()
        .ok_or(ScheduleError::DateOutOfRange(prev_end))?;

    while start < next_start {
        let limit = next_start
            .pred_opt()
            .ok_or(ScheduleError::DateOutOfRange(next_start))?;
        let end = schedule.end_for(start)?.min(limit);
        ranges.push(DateRange::new(start, end));
        start = end.succ_opt().ok_or(ScheduleError::DateOutOfRange(end))?;
    }

    Ok(ranges)
}

/// Returns true if every period starts the day after its predecessor ends.
#[must_use]
pub fn is_contiguous(periods: &[BudgetPeriod]) -> bool {
    periods
        .windows(2)
        .all(|pair| pair[0].end_date.succ_opt() == Some(pair[1].start_date))
}

/// Walks an ordered, gap-free chain and rewrites rollovers in place.
///
/// `spent[i]` is the expense total of `links[i]`; the last link's spend is
/// optional since nothing follows it. The head keeps its stored
/// rollover. Gap fills always get the computed carry; stored periods with
/// rollover disabled are left untouched; stored enabled periods are
/// rewritten when they drift beyond the tolerance.
#[must_use]
pub fn walk(links: &mut [ChainLink], spent: &[Decimal]) -> Vec<Correction> {
    debug_assert!(spent.len() + 1 >= links.len());
    let mut corrections = Vec::new();

    for i in 1..links.len().min(spent.len() + 1) {
        let expected = RolloverCalculator::next_rollover(&links[i - 1].period, spent[i - 1]);
        let link = &mut links[i];

        match link.origin {
            LinkOrigin::GapFill => {
                link.period.rollover_amount =
                    RolloverCalculator::carry_into(link.period.rollover_enabled, expected);
                corrections.push(Correction::gap_filled(&link.period));
            }
            LinkOrigin::Stored => {
                if !link.period.rollover_enabled {
                    continue;
                }
                let stored = link.period.rollover_amount;
                if RolloverCalculator::is_drift(stored, expected) {
                    link.period.rollover_amount = expected;
                    corrections.push(Correction::drift(&link.period, stored));
                }
            }
        }
    }

    corrections
}
