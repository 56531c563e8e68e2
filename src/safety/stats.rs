//! Process-lifetime counters

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub trades_executed: u64,
    /// Executed notional since start (USD)
    pub total_volume: f64,
    /// Evaluations that produced at least one violation
    pub risk_violations: u64,
    /// Confirmation tickets approved by an operator
    pub manual_interventions: u64,
    pub start_time: DateTime<Utc>,
}

impl SessionStats {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            trades_executed: 0,
            total_volume: 0.0,
            risk_violations: 0,
            manual_interventions: 0,
            start_time,
        }
    }

    pub fn session_age(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }
}
