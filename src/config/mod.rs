//! Configuration for the agent safety system

pub mod secrets;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use secrets::SafetySecrets;

/// Safety thresholds and switches
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Maximum notional of a single position (USD)
    pub max_position_size: f64,
    /// Maximum number of executed trades per UTC day
    pub max_daily_trades: u32,
    /// Maximum executed volume per UTC day (USD)
    pub max_daily_volume: f64,
    /// Maximum share of the portfolio a single position may take (percent)
    pub max_position_risk: f64,
    /// Maximum share of the portfolio exposed across positions (percent)
    pub max_portfolio_risk: f64,
    /// Minimum signal confidence (0.0 - 1.0)
    pub min_confidence: f64,
    /// Maximum session length before every operation is flagged
    pub max_session_hours: f64,
    /// Risk violations tolerated per session before every operation is flagged
    pub max_session_violations: u64,
    /// Allow real-money operations at all
    pub real_trading_enabled: bool,
    /// Start in sandbox mode
    pub sandboxed: bool,
    /// Lifetime of a confirmation ticket (seconds)
    pub confirmation_ttl_secs: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_position_size: 1000.0,
            max_daily_trades: 10,
            max_daily_volume: 5000.0,
            max_position_risk: 5.0,
            max_portfolio_risk: 20.0,
            min_confidence: 0.7,
            max_session_hours: 24.0,
            max_session_violations: 10,
            real_trading_enabled: false,
            sandboxed: true,
            confirmation_ttl_secs: 300, // 5 minutes
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Safety thresholds
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Path to audit log file
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safety: SafetyConfig::default(),
            audit_log_path: Some("safety_audit.jsonl".to_string()),
        }
    }
}

impl Config {
    /// Load a JSON config file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("invalid {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overrides_merge_with_defaults() {
        let value = serde_json::json!({
            "safety": {
                "max_position_size": 250.0,
                "max_daily_trades": 3
            }
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.safety.max_position_size, 250.0);
        assert_eq!(parsed.safety.max_daily_trades, 3);
        assert_eq!(parsed.safety.max_daily_volume, 5000.0);
        assert_eq!(parsed.safety.min_confidence, 0.7);
        assert!(parsed.safety.sandboxed);
        assert!(parsed.audit_log_path.is_none());
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let parsed: Config = serde_json::from_str("{}").expect("parse config");
        assert_eq!(parsed.safety, SafetyConfig::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
