//! Dashboard snapshot

use super::stats::SessionStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Record of an active emergency stop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyStop {
    pub reason: String,
    pub stopped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLimitsStatus {
    pub trades_today: u32,
    pub volume_today: f64,
    pub max_trades: u32,
    pub max_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleStatus {
    pub enabled: bool,
    pub current: f64,
    pub max: f64,
    pub violations: u64,
    pub last_violation: Option<DateTime<Utc>>,
}

/// JSON-serializable view of the safety system
///
/// Two snapshots taken without an intervening mutation differ only in
/// `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStatus {
    pub sandboxed: bool,
    pub session_stats: SessionStats,
    pub daily_limits: DailyLimitsStatus,
    pub safety_rules_status: BTreeMap<String, RuleStatus>,
    pub pending_confirmations: usize,
    /// Approving a ticket needs the operator approval code
    pub approval_code_required: bool,
    pub emergency_stop: Option<EmergencyStop>,
    pub timestamp: DateTime<Utc>,
}
