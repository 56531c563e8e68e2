//! Per-day trade counters
//!
//! Days are keyed by their UTC calendar date. A day's entry is created by
//! the first executed trade of that day and removed by `prune_before`.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Executed trades for a single UTC day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTally {
    pub trades: u32,
    /// Executed notional (USD)
    pub volume: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DailyCounters {
    days: BTreeMap<NaiveDate, DailyTally>,
}

impl DailyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one executed trade to `day`, returning the new tally
    pub fn record(&mut self, day: NaiveDate, notional: f64) -> DailyTally {
        let tally = self.days.entry(day).or_default();
        tally.trades = tally.trades.saturating_add(1);
        tally.volume += notional;
        *tally
    }

    /// Tally for `day`, zero if nothing was recorded
    pub fn tally(&self, day: NaiveDate) -> DailyTally {
        self.days.get(&day).copied().unwrap_or_default()
    }

    /// Drop every day strictly before `day`, returning how many were removed
    pub fn prune_before(&mut self, day: NaiveDate) -> usize {
        let kept = self.days.split_off(&day);
        let removed = self.days.len();
        self.days = kept;
        removed
    }

    pub fn tracked_days(&self) -> usize {
        self.days.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn records_accumulate_per_day() {
        let mut counters = DailyCounters::new();
        counters.record(day(1), 100.0);
        let tally = counters.record(day(1), 250.0);
        assert_eq!(tally.trades, 2);
        assert!((tally.volume - 350.0).abs() < 1e-9);

        assert_eq!(counters.tally(day(2)), DailyTally::default());
        counters.record(day(2), 10.0);
        assert_eq!(counters.tally(day(2)).trades, 1);
        assert_eq!(counters.tally(day(1)).trades, 2);
    }

    #[test]
    fn prune_removes_only_earlier_days() {
        let mut counters = DailyCounters::new();
        counters.record(day(1), 1.0);
        counters.record(day(2), 1.0);
        counters.record(day(3), 1.0);

        assert_eq!(counters.prune_before(day(3)), 2);
        assert_eq!(counters.tracked_days(), 1);
        assert_eq!(counters.tally(day(3)).trades, 1);
        assert_eq!(counters.tally(day(2)).trades, 0);

        assert_eq!(counters.prune_before(day(3)), 0);
    }
}
