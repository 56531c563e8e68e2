//! Evaluation results

use super::operation::OperationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ordered severity attached to a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule that produced the violation, if it came from the rule table
    pub rule: Option<String>,
    pub severity: RiskLevel,
    pub message: String,
}

impl Violation {
    pub fn new(severity: RiskLevel, message: impl Into<String>) -> Self {
        Self {
            rule: None,
            severity,
            message: message.into(),
        }
    }

    pub fn for_rule(rule: &str, severity: RiskLevel, message: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.to_string()),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Outcome of `check_operation_safety`
///
/// `approved` and `risk_level` are independent: a HIGH assessment with no
/// violations is still approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub decision_id: Uuid,
    pub operation_type: OperationType,
    pub approved: bool,
    pub violations: Vec<Violation>,
    pub risk_level: RiskLevel,
    pub evaluated_at: DateTime<Utc>,
}

impl SafetyDecision {
    pub(crate) fn new(
        operation_type: OperationType,
        violations: Vec<Violation>,
        risk_level: RiskLevel,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            operation_type,
            approved: violations.is_empty(),
            violations,
            risk_level,
            evaluated_at,
        }
    }

    /// Fail-closed result for an internal error
    pub(crate) fn system_error(
        operation_type: OperationType,
        error: &crate::Error,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            operation_type,
            vec![Violation::new(
                RiskLevel::Critical,
                format!("system error: {}", error),
            )],
            RiskLevel::Critical,
            evaluated_at,
        )
    }

    pub fn violation_messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }

    /// True if any violation came from the named rule
    pub fn violates(&self, rule: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.rule.as_deref() == Some(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(
            serde_json::to_value(RiskLevel::Critical).unwrap(),
            serde_json::json!("CRITICAL")
        );
    }

    #[test]
    fn approval_follows_violations() {
        let now = Utc::now();
        let clean = SafetyDecision::new(OperationType::SmallTrade, vec![], RiskLevel::High, now);
        assert!(clean.approved);

        let blocked = SafetyDecision::new(
            OperationType::SmallTrade,
            vec![Violation::for_rule("max_daily_trades", RiskLevel::High, "too many")],
            RiskLevel::High,
            now,
        );
        assert!(!blocked.approved);
        assert!(blocked.violates("max_daily_trades"));
        assert_eq!(blocked.violation_messages(), vec!["too many".to_string()]);
    }
}
