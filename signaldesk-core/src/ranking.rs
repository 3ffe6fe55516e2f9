//! Rank order over backtest results.
//!
//! Key: `(status priority, -earnings)`. Actionable signals come first (BUY, then
//! SELL), then HOLD, then anything unrecognized. Within a status class, higher
//! earnings rank first. The sort is stable, so full ties keep collection order.
//! NaN earnings rank last within their status class.

use std::cmp::Ordering;
use std::ops::Deref;

use serde::Serialize;

use crate::domain::BacktestResult;

/// Results in rank order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RankedResults(Vec<BacktestResult>);

impl RankedResults {
    pub fn as_slice(&self) -> &[BacktestResult] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<BacktestResult> {
        self.0
    }
}

impl Deref for RankedResults {
    type Target = [BacktestResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a RankedResults {
    type Item = &'a BacktestResult;
    type IntoIter = std::slice::Iter<'a, BacktestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Total-order the collected results.
pub fn rank(mut results: Vec<BacktestResult>) -> RankedResults {
    results.sort_by(compare);
    RankedResults(results)
}

/// Rank-order comparison of two results.
pub fn compare(a: &BacktestResult, b: &BacktestResult) -> Ordering {
    a.status
        .priority()
        .cmp(&b.status.priority())
        .then_with(|| earnings_descending(a.earnings, b.earnings))
}

fn earnings_descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        // -0.0 and 0.0 compare equal here, keeping the sort stable across them
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
