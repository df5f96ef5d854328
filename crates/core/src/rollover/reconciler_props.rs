//! Property-based tests for the chain walk.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use carryover_shared::types::{AccountBookId, BudgetPeriodId, UserId};

use super::calculator::{DRIFT_TOLERANCE, RolloverCalculator};
use super::reconciler::{ChainLink, walk};
use crate::period::{BudgetPeriod, PeriodSchedule};
use crate::scope::Scope;

/// Amounts from 0.00 to 20,000.00.
fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..2_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Signed stored rollovers from -20,000.00 to 20,000.00.
fn stored_rollover() -> impl Strategy<Value = Decimal> {
    (-2_000_000i64..2_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// (base, enabled, stored rollover, spent) per period.
fn chain_spec() -> impl Strategy<Value = Vec<(Decimal, bool, Decimal, Decimal)>> {
    prop::collection::vec((amount(), any::<bool>(), stored_rollover(), amount()), 1..24)
}

fn build(spec: &[(Decimal, bool, Decimal, Decimal)]) -> (Vec<ChainLink>, Vec<Decimal>) {
    let schedule = PeriodSchedule::monthly();
    let scope = Scope::user(UserId::new());
    let book = AccountBookId::new();
    let mut start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut links = Vec::new();
    let mut spent = Vec::new();

    for &(base, enabled, rollover, spend) in spec {
        let end = schedule.end_for(start).unwrap();
        links.push(ChainLink::stored(BudgetPeriod {
            id: BudgetPeriodId::new(),
            scope,
            account_book_id: book,
            start_date: start,
            end_date: end,
            base_amount: base,
            rollover_enabled: enabled,
            rollover_amount: rollover,
        }));
        spent.push(spend);
        start = end.succ_opt().unwrap();
    }

    (links, spent)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// After a walk every enabled successor carries exactly what its
    /// predecessor left, within the drift tolerance.
    #[test]
    fn prop_walk_restores_chain_invariant(spec in chain_spec()) {
        let (mut links, spent) = build(&spec);
        let _ = walk(&mut links, &spent);

        for i in 1..links.len() {
            let period = &links[i].period;
            if !period.rollover_enabled {
                continue;
            }
            let expected = RolloverCalculator::next_rollover(&links[i - 1].period, spent[i - 1]);
            prop_assert!(
                (period.rollover_amount - expected).abs() <= DRIFT_TOLERANCE,
                "period {} carries {} but predecessor left {}",
                i,
                period.rollover_amount,
                expected
            );
        }
    }

    /// A second walk over a reconciled chain corrects nothing.
    #[test]
    fn prop_walk_is_idempotent(spec in chain_spec()) {
        let (mut links, spent) = build(&spec);
        let _ = walk(&mut links, &spent);
        let second = walk(&mut links, &spent);
        prop_assert!(second.is_empty(), "second walk produced {:?}", second);
    }

    /// The head and disabled periods are never rewritten.
    #[test]
    fn prop_walk_keeps_head_and_disabled(spec in chain_spec()) {
        let (mut links, spent) = build(&spec);
        let before: Vec<Decimal> = links.iter().map(|l| l.period.rollover_amount).collect();
        let _ = walk(&mut links, &spent);

        prop_assert_eq!(links[0].period.rollover_amount, before[0]);
        for (link, old) in links.iter().zip(&before) {
            if !link.period.rollover_enabled {
                prop_assert_eq!(link.period.rollover_amount, *old);
            }
        }
    }
}
