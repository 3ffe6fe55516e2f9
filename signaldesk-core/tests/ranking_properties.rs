//! Property tests for the rank order.
//!
//! Uses proptest to verify:
//! 1. Status classes appear in BUY, SELL, HOLD, unrecognized order
//! 2. Earnings are non-increasing inside a status class
//! 3. Ranking an already ranked list changes nothing
//! 4. Input order does not change the ranked key sequence
//! 5. Ranking is a permutation: nothing added, dropped or modified

use proptest::prelude::*;
use signaldesk_core::{rank, BacktestResult, Status};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_status() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("BUY".to_string()),
        Just("SELL".to_string()),
        Just("HOLD".to_string()),
        Just("UNKNOWN".to_string()),
        "[A-Z]{3,6}",
    ]
}

fn arb_earnings() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-10_000.0..10_000.0_f64),
        // coarse values so exact ties show up
        (-5i32..5).prop_map(|v| v as f64 * 10.0),
    ]
}

fn arb_results() -> impl Strategy<Value = Vec<BacktestResult>> {
    prop::collection::vec((arb_status(), -5.0..5.0_f64, arb_earnings()), 0..80).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (status, sqn, earnings))| {
                BacktestResult::new(format!("T{i}"), status, sqn, earnings)
            })
            .collect()
    })
}

fn keys(results: &[BacktestResult]) -> Vec<(u8, f64)> {
    results
        .iter()
        .map(|r| (r.status.priority(), r.earnings))
        .collect()
}

proptest! {
    #[test]
    fn status_classes_are_grouped_in_signal_order(results in arb_results()) {
        let ranked = rank(results);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].status.priority() <= pair[1].status.priority());
        }
    }

    #[test]
    fn earnings_non_increasing_within_status(results in arb_results()) {
        let ranked = rank(results);
        for pair in ranked.windows(2) {
            if pair[0].status.priority() == pair[1].status.priority() {
                prop_assert!(pair[0].earnings >= pair[1].earnings);
            }
        }
    }

    #[test]
    fn unrecognized_status_follows_every_recognized_one(results in arb_results()) {
        let ranked = rank(results);
        if let Some(first_unknown) = ranked.iter().position(|r| !r.status.is_recognized()) {
            prop_assert!(ranked[first_unknown..].iter().all(|r| !r.status.is_recognized()));
        }
    }

    #[test]
    fn ranking_is_idempotent(results in arb_results()) {
        let once = rank(results);
        let twice = rank(once.clone().into_vec());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn input_order_does_not_change_key_sequence(
        (original, shuffled) in arb_results()
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let a = rank(original);
        let b = rank(shuffled);
        prop_assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn ranking_is_a_permutation(results in arb_results()) {
        let mut expected = results.clone();
        let mut ranked = rank(results).into_vec();
        expected.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        ranked.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        prop_assert_eq!(expected, ranked);
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn unknown_status_with_huge_earnings_still_ranks_last() {
    let ranked = rank(vec![
        BacktestResult::new("ODD", "UNKNOWN", 9.9, 1e12),
        BacktestResult::new("AAPL", "BUY", 1.5, 120.0),
        BacktestResult::new("MSFT", "HOLD", 0.9, -30.0),
        BacktestResult::new("GOOG", "SELL", 2.1, 75.0),
    ]);
    let order: Vec<_> = ranked.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["AAPL", "GOOG", "MSFT", "ODD"]);
    assert_eq!(ranked[3].status, Status::Other("UNKNOWN".into()));
}
