//! Declarative rule table
//!
//! Every rule is an upper bound: a check fails when the observed value
//! exceeds `max_value`. The confidence floor is stored inverted
//! (`1 - min_confidence`) to fit the same shape.

use crate::config::SafetyConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MAX_POSITION_SIZE: &str = "max_position_size";
pub const MAX_DAILY_TRADES: &str = "max_daily_trades";
pub const MAX_DAILY_VOLUME: &str = "max_daily_volume";
pub const MAX_POSITION_RISK: &str = "max_position_risk";
pub const MAX_PORTFOLIO_RISK: &str = "max_portfolio_risk";
pub const MIN_CONFIDENCE: &str = "min_confidence";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyRule {
    pub name: String,
    pub description: String,
    pub max_value: f64,
    pub current_value: f64,
    pub enabled: bool,
    pub violation_count: u64,
    pub last_violation: Option<DateTime<Utc>>,
}

impl SafetyRule {
    fn new(name: &str, description: &str, max_value: f64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            max_value,
            current_value: 0.0,
            enabled: true,
            violation_count: 0,
            last_violation: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: BTreeMap<String, SafetyRule>,
}

impl RuleTable {
    pub fn from_config(config: &SafetyConfig) -> Self {
        let rules = [
            SafetyRule::new(
                MAX_POSITION_SIZE,
                "Maximum notional of a single position (USD)",
                config.max_position_size,
            ),
            SafetyRule::new(
                MAX_DAILY_TRADES,
                "Maximum executed trades per UTC day",
                f64::from(config.max_daily_trades),
            ),
            SafetyRule::new(
                MAX_DAILY_VOLUME,
                "Maximum executed volume per UTC day (USD)",
                config.max_daily_volume,
            ),
            SafetyRule::new(
                MAX_POSITION_RISK,
                "Maximum share of the portfolio in one position (%)",
                config.max_position_risk,
            ),
            SafetyRule::new(
                MAX_PORTFOLIO_RISK,
                "Maximum share of the portfolio exposed (%)",
                config.max_portfolio_risk,
            ),
            SafetyRule::new(
                MIN_CONFIDENCE,
                "Minimum signal confidence (stored as 1 - threshold)",
                1.0 - config.min_confidence,
            ),
        ];

        Self {
            rules: rules.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SafetyRule> {
        self.rules.get(name)
    }

    /// Threshold of an enabled rule; `None` when the rule is off
    pub fn active_limit(&self, name: &str) -> Option<f64> {
        self.rules
            .get(name)
            .filter(|r| r.enabled)
            .map(|r| r.max_value)
    }

    /// Threshold regardless of the `enabled` flag
    #[cfg(test)]
    pub fn limit(&self, name: &str) -> Option<f64> {
        self.rules.get(name).map(|r| r.max_value)
    }

    pub fn record_violation(&mut self, name: &str, at: DateTime<Utc>) {
        if let Some(rule) = self.rules.get_mut(name) {
            rule.violation_count += 1;
            rule.last_violation = Some(at);
        }
    }

    pub fn set_current(&mut self, name: &str, value: f64) {
        if let Some(rule) = self.rules.get_mut(name) {
            rule.current_value = value;
        }
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for rule in self.rules.values_mut() {
            rule.enabled = enabled;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SafetyRule> {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let table = RuleTable::from_config(&SafetyConfig::default());
        assert_eq!(table.limit(MAX_POSITION_SIZE), Some(1000.0));
        assert_eq!(table.limit(MAX_DAILY_TRADES), Some(10.0));
        assert_eq!(table.limit(MAX_DAILY_VOLUME), Some(5000.0));
        assert_eq!(table.limit(MAX_POSITION_RISK), Some(5.0));
        assert_eq!(table.limit(MAX_PORTFOLIO_RISK), Some(20.0));
        let inverted = table.limit(MIN_CONFIDENCE).unwrap();
        assert!((inverted - 0.3).abs() < 1e-9);
        assert_eq!(table.iter().count(), 6);
    }

    #[test]
    fn disabled_rules_have_no_active_limit() {
        let mut table = RuleTable::from_config(&SafetyConfig::default());
        table.set_all_enabled(false);
        assert_eq!(table.active_limit(MAX_POSITION_SIZE), None);
        assert_eq!(table.limit(MAX_POSITION_SIZE), Some(1000.0));
        assert!(table.iter().all(|r| !r.enabled));
    }

    #[test]
    fn violation_bookkeeping() {
        let mut table = RuleTable::from_config(&SafetyConfig::default());
        let at = Utc::now();
        table.record_violation(MAX_DAILY_TRADES, at);
        table.record_violation(MAX_DAILY_TRADES, at);
        table.record_violation("no_such_rule", at);

        let rule = table.get(MAX_DAILY_TRADES).unwrap();
        assert_eq!(rule.violation_count, 2);
        assert_eq!(rule.last_violation, Some(at));
        assert_eq!(table.get(MAX_POSITION_SIZE).unwrap().violation_count, 0);
    }
}
