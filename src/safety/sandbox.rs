//! Sandbox gate
//!
//! A fixed allow/block list of operation names consulted before any rule
//! evaluation. Allowed operations return canned results; nothing here talks
//! to an exchange.

use serde::Serialize;
use serde_json::{json, Value};

pub const ALLOWED_OPERATIONS: &[&str] = &[
    "market_analysis",
    "portfolio_check",
    "risk_assessment",
    "news_analysis",
    "technical_analysis",
    "generate_signals",
];

pub const BLOCKED_OPERATIONS: &[&str] = &[
    "real_trade",
    "withdraw_funds",
    "change_api_keys",
    "modify_safety_rules",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxVerdict {
    Allowed,
    Blocked,
    Unlisted,
}

pub fn classify(operation: &str) -> SandboxVerdict {
    if BLOCKED_OPERATIONS.contains(&operation) {
        SandboxVerdict::Blocked
    } else if ALLOWED_OPERATIONS.contains(&operation) {
        SandboxVerdict::Allowed
    } else {
        SandboxVerdict::Unlisted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Completed,
    Blocked,
    Rejected,
    RequiresConfirmation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxResponse {
    pub status: SandboxStatus,
    pub operation: String,
    pub blocked: bool,
    pub requires_confirmation: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_operations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl SandboxResponse {
    fn base(status: SandboxStatus, operation: &str, message: String) -> Self {
        Self {
            status,
            operation: operation.to_string(),
            blocked: false,
            requires_confirmation: false,
            message,
            confirmation_id: None,
            allowed_operations: None,
            result: None,
        }
    }

    pub(crate) fn completed(operation: &str, result: Value) -> Self {
        let mut response = Self::base(
            SandboxStatus::Completed,
            operation,
            format!("{} completed in sandbox", operation),
        );
        response.result = Some(result);
        response
    }

    pub(crate) fn blocked(operation: &str) -> Self {
        let mut response = Self::base(
            SandboxStatus::Blocked,
            operation,
            format!("Operation {} is blocked in sandbox mode", operation),
        );
        response.blocked = true;
        response
    }

    pub(crate) fn unlisted(operation: &str) -> Self {
        let mut response = Self::base(
            SandboxStatus::Rejected,
            operation,
            format!("Operation {} is not permitted in sandbox mode", operation),
        );
        response.allowed_operations =
            Some(ALLOWED_OPERATIONS.iter().map(|s| s.to_string()).collect());
        response
    }

    pub(crate) fn requires_confirmation(operation: &str, confirmation_id: String) -> Self {
        let mut response = Self::base(
            SandboxStatus::RequiresConfirmation,
            operation,
            format!(
                "Sandbox mode is off; {} needs operator approval of ticket {}",
                operation, confirmation_id
            ),
        );
        response.requires_confirmation = true;
        response.confirmation_id = Some(confirmation_id);
        response
    }
}

/// Canned payload for an allowed operation
pub(crate) fn canned_result(operation: &str, params: &Value) -> Value {
    let body = match operation {
        "market_analysis" => json!({
            "trend": "neutral",
            "volatility": "moderate",
            "summary": "Sandbox market analysis: no live data consulted",
        }),
        "portfolio_check" => json!({
            "positions": [],
            "cash_usd": 0.0,
            "summary": "Sandbox portfolio is empty",
        }),
        "risk_assessment" => json!({
            "risk_level": "LOW",
            "summary": "Sandbox risk assessment: no exposure",
        }),
        "news_analysis" => json!({
            "sentiment": "neutral",
            "headlines": [],
        }),
        "technical_analysis" => json!({
            "indicators": { "rsi": 50.0, "macd": 0.0 },
            "signal": "hold",
        }),
        "generate_signals" => json!({
            "signals": [],
            "note": "Signals generated in sandbox are informational only",
        }),
        _ => json!({}),
    };

    json!({
        "sandbox": true,
        "input": params,
        "output": body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_are_disjoint() {
        for op in ALLOWED_OPERATIONS {
            assert!(!BLOCKED_OPERATIONS.contains(op), "{} is on both lists", op);
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify("real_trade"), SandboxVerdict::Blocked);
        assert_eq!(classify("technical_analysis"), SandboxVerdict::Allowed);
        assert_eq!(classify("rebalance"), SandboxVerdict::Unlisted);
        assert_eq!(classify("Market_Analysis"), SandboxVerdict::Unlisted);
    }

    #[test]
    fn response_shapes() {
        let blocked = serde_json::to_value(SandboxResponse::blocked("withdraw_funds")).unwrap();
        assert_eq!(blocked["blocked"], true);
        assert_eq!(blocked["status"], "blocked");
        assert!(blocked.get("allowed_operations").is_none());

        let unlisted = serde_json::to_value(SandboxResponse::unlisted("rebalance")).unwrap();
        assert_eq!(unlisted["status"], "rejected");
        assert_eq!(
            unlisted["allowed_operations"].as_array().map(|a| a.len()),
            Some(ALLOWED_OPERATIONS.len())
        );

        let canned = canned_result("market_analysis", &json!({"symbol": "ETHUSDT"}));
        assert_eq!(canned["input"]["symbol"], "ETHUSDT");
        assert_eq!(canned["output"]["trend"], "neutral");
    }
}
