//! The safety system
//!
//! Owns all mutable safety state behind one lock. Callers share it by
//! cloning; every clone sees the same rules, counters and tickets.

use super::clock::{Clock, SystemClock};
use super::confirmation::{ApprovalOutcome, ConfirmationBroker, PendingConfirmation};
use super::daily::{DailyCounters, DailyTally};
use super::decision::{RiskLevel, SafetyDecision};
use super::evaluator::{validate_trade, Evaluator};
use super::notify::{LogNotifier, Notifier};
use super::operation::{Operation, TradeOperation};
use super::rules::{RuleTable, SafetyRule, MAX_DAILY_TRADES, MAX_DAILY_VOLUME, MAX_POSITION_SIZE};
use super::sandbox::{self, SandboxResponse, SandboxVerdict};
use super::stats::SessionStats;
use super::status::{DailyLimitsStatus, EmergencyStop, RuleStatus, SafetyStatus};
use crate::audit_log::AuditLog;
use crate::config::{SafetyConfig, SafetySecrets};
use crate::Result;
use chrono::Duration;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const MAX_CONFIRMATION_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Serialize)]
struct DecisionRecord<'a> {
    operation: &'a Operation,
    decision: &'a SafetyDecision,
}

struct SafetyState {
    config: SafetyConfig,
    rules: RuleTable,
    daily: DailyCounters,
    confirmations: ConfirmationBroker,
    stats: SessionStats,
    sandboxed: bool,
    emergency_stop: Option<EmergencyStop>,
}

/// Builder for [`SafetySystem`]
pub struct SafetySystemBuilder {
    config: SafetyConfig,
    admin_key: Option<SecretString>,
    approval_code: Option<SecretString>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    audit_log: Option<AuditLog>,
}

impl SafetySystemBuilder {
    pub fn secrets(mut self, secrets: SafetySecrets) -> Self {
        if let Some(enabled) = secrets.real_trading_enabled {
            self.config.real_trading_enabled = enabled;
        }
        self.admin_key = secrets.admin_key;
        self.approval_code = secrets.approval_code;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn audit_log(mut self, audit_log: AuditLog) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn build(self) -> SafetySystem {
        let now = self.clock.now();
        let ttl_secs = self
            .config
            .confirmation_ttl_secs
            .min(MAX_CONFIRMATION_TTL_SECS);
        let ttl = Duration::seconds(ttl_secs as i64);

        info!(
            max_position_size = self.config.max_position_size,
            max_daily_trades = self.config.max_daily_trades,
            max_daily_volume = self.config.max_daily_volume,
            sandboxed = self.config.sandboxed,
            real_trading_enabled = self.config.real_trading_enabled,
            "Safety system initialised"
        );

        let state = SafetyState {
            rules: RuleTable::from_config(&self.config),
            daily: DailyCounters::new(),
            confirmations: ConfirmationBroker::new(ttl, self.approval_code),
            stats: SessionStats::new(now),
            sandboxed: self.config.sandboxed,
            emergency_stop: None,
            config: self.config,
        };

        SafetySystem {
            state: Arc::new(RwLock::new(state)),
            admin_key: self.admin_key.map(Arc::new),
            clock: self.clock,
            notifier: self.notifier,
            audit_log: self.audit_log,
        }
    }
}

#[derive(Clone)]
pub struct SafetySystem {
    state: Arc<RwLock<SafetyState>>,
    admin_key: Option<Arc<SecretString>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    audit_log: Option<AuditLog>,
}

impl SafetySystem {
    pub fn builder(config: SafetyConfig) -> SafetySystemBuilder {
        SafetySystemBuilder {
            config,
            admin_key: None,
            approval_code: None,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            audit_log: None,
        }
    }

    /// System clock, log-only notifier, no audit file
    pub fn new(config: SafetyConfig, secrets: SafetySecrets) -> Self {
        Self::builder(config).secrets(secrets).build()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Decide whether `operation` may proceed
    ///
    /// Never fails: internal errors become a rejected CRITICAL decision.
    pub async fn check_operation_safety(&self, operation: &Operation) -> SafetyDecision {
        let kind = operation.kind();
        let now = self.clock.now();

        if kind.is_analytical() {
            return SafetyDecision::new(kind, Vec::new(), RiskLevel::Low, now);
        }

        let decision = {
            let mut state = self.state.write().await;
            let evaluator = Evaluator {
                rules: &state.rules,
                config: &state.config,
                today: state.daily.tally(now.date_naive()),
                stats: &state.stats,
                emergency_stop: state.emergency_stop.as_ref(),
                now,
            };

            match evaluator.evaluate(operation) {
                Ok(assessment) => {
                    if let Operation::SmallTrade(trade) | Operation::LargeTrade(trade) = operation {
                        state
                            .rules
                            .set_current(MAX_POSITION_SIZE, trade.position_size());
                    }
                    for rule in assessment.violations.iter().filter_map(|v| v.rule.as_deref()) {
                        state.rules.record_violation(rule, now);
                    }
                    if !assessment.violations.is_empty() {
                        state.stats.risk_violations += 1;
                    }
                    SafetyDecision::new(kind, assessment.violations, assessment.risk_level, now)
                }
                Err(e) => {
                    error!(
                        operation_type = %kind,
                        error = %e,
                        "Safety evaluation failed, rejecting"
                    );
                    state.stats.risk_violations += 1;
                    SafetyDecision::system_error(kind, &e, now)
                }
            }
        };

        if decision.approved {
            info!(
                decision_id = %decision.decision_id,
                operation_type = %kind,
                risk_level = %decision.risk_level,
                "Safety check passed"
            );
        } else {
            for violation in &decision.violations {
                warn!(
                    decision_id = %decision.decision_id,
                    operation_type = %kind,
                    rule = violation.rule.as_deref().unwrap_or("-"),
                    severity = %violation.severity,
                    "{}",
                    violation.message
                );
            }
        }

        if let Some(log) = &self.audit_log {
            let record = DecisionRecord {
                operation,
                decision: &decision,
            };
            log.record_serialized(now, "safety_decision", &record).await;
        }

        decision
    }

    // ------------------------------------------------------------------
    // Daily counters
    // ------------------------------------------------------------------

    /// Record an executed trade
    ///
    /// Called by the execution side after an order was actually placed; the
    /// evaluator never counts trades on its own. Input that the evaluator
    /// would reject is rejected here too.
    pub async fn update_daily_limits(&self, trade: &TradeOperation) -> Result<DailyTally> {
        validate_trade(trade)?;
        let notional = trade.position_size();

        let now = self.clock.now();
        let mut state = self.state.write().await;
        let tally = state.daily.record(now.date_naive(), notional);
        state.stats.trades_executed += 1;
        state.stats.total_volume += notional;
        state
            .rules
            .set_current(MAX_DAILY_TRADES, f64::from(tally.trades));
        state.rules.set_current(MAX_DAILY_VOLUME, tally.volume);

        info!(
            symbol = %trade.symbol,
            notional = notional,
            trades_today = tally.trades,
            volume_today = tally.volume,
            "Updated daily trade counters"
        );
        Ok(tally)
    }

    /// Drop counters for every day before today (UTC)
    ///
    /// Meant to be run by a scheduler shortly after midnight.
    pub async fn reset_daily_limits(&self) -> usize {
        let today = self.clock.now().date_naive();
        let mut state = self.state.write().await;
        let removed = state.daily.prune_before(today);
        let tally = state.daily.tally(today);
        state
            .rules
            .set_current(MAX_DAILY_TRADES, f64::from(tally.trades));
        state.rules.set_current(MAX_DAILY_VOLUME, tally.volume);
        info!(
            days_removed = removed,
            days_tracked = state.daily.tracked_days(),
            %today,
            "Daily limits reset"
        );
        removed
    }

    // ------------------------------------------------------------------
    // Confirmations
    // ------------------------------------------------------------------

    /// Issue a confirmation ticket and hand it to the notifier
    pub async fn request_confirmation(
        &self,
        operation: &str,
        details: Value,
        risk_level: RiskLevel,
    ) -> String {
        let now = self.clock.now();
        let ticket = {
            let mut state = self.state.write().await;
            state
                .confirmations
                .request(operation, details, risk_level, now)
        };

        info!(
            confirmation_id = %ticket.id,
            operation = operation,
            risk_level = %risk_level,
            "Confirmation requested"
        );
        self.notifier.confirmation_requested(&ticket).await;
        if let Some(log) = &self.audit_log {
            log.record_serialized(now, "confirmation_requested", &ticket)
                .await;
        }
        ticket.id
    }

    /// Approve a pending ticket; `true` only on the first valid approval
    pub async fn approve_operation(&self, confirmation_id: &str, user_code: Option<&str>) -> bool {
        let now = self.clock.now();
        let outcome = {
            let mut state = self.state.write().await;
            let outcome = state.confirmations.approve(confirmation_id, user_code, now);
            if matches!(outcome, ApprovalOutcome::Approved(_)) {
                state.stats.manual_interventions += 1;
            }
            outcome
        };

        match outcome {
            ApprovalOutcome::Approved(ticket) => {
                info!(
                    confirmation_id = confirmation_id,
                    operation = %ticket.operation,
                    "Operation approved by operator"
                );
                if let Some(log) = &self.audit_log {
                    log.record_serialized(now, "confirmation_approved", &ticket)
                        .await;
                }
                true
            }
            ApprovalOutcome::Unknown => {
                error!(confirmation_id = confirmation_id, "Unknown confirmation id");
                false
            }
            ApprovalOutcome::Expired(ticket) => {
                error!(
                    confirmation_id = confirmation_id,
                    operation = %ticket.operation,
                    expired_at = %ticket.expires_at,
                    "Confirmation expired"
                );
                false
            }
            ApprovalOutcome::CodeRejected => {
                error!(confirmation_id = confirmation_id, "Approval code rejected");
                false
            }
        }
    }

    /// Remove expired tickets, returning how many were dropped
    pub async fn purge_expired_confirmations(&self) -> usize {
        let now = self.clock.now();
        let removed = self.state.write().await.confirmations.purge_expired(now);
        if removed > 0 {
            info!(removed = removed, "Purged expired confirmations");
        }
        removed
    }

    pub async fn pending_confirmations(&self) -> Vec<PendingConfirmation> {
        self.state.read().await.confirmations.list()
    }

    // ------------------------------------------------------------------
    // Sandbox
    // ------------------------------------------------------------------

    /// Run a named operation through the sandbox gate
    pub async fn execute_in_sandbox(&self, operation: &str, params: &Value) -> SandboxResponse {
        let sandboxed = self.state.read().await.sandboxed;

        if !sandboxed {
            let id = self
                .request_confirmation(operation, params.clone(), RiskLevel::High)
                .await;
            return SandboxResponse::requires_confirmation(operation, id);
        }

        match sandbox::classify(operation) {
            SandboxVerdict::Blocked => {
                warn!(operation = operation, "Blocked operation attempted in sandbox");
                SandboxResponse::blocked(operation)
            }
            SandboxVerdict::Allowed => {
                info!(operation = operation, "Executing operation in sandbox");
                SandboxResponse::completed(operation, sandbox::canned_result(operation, params))
            }
            SandboxVerdict::Unlisted => {
                warn!(operation = operation, "Unlisted operation rejected by sandbox");
                SandboxResponse::unlisted(operation)
            }
        }
    }

    pub async fn is_sandboxed(&self) -> bool {
        self.state.read().await.sandboxed
    }

    pub async fn enable_sandbox_mode(&self) {
        self.state.write().await.sandboxed = true;
        info!("Sandbox mode enabled");
    }

    /// Leave sandbox mode; requires the configured admin key
    pub async fn disable_sandbox_mode(&self, admin_key: &str) -> bool {
        if !self.admin_key_matches(admin_key) {
            error!("Invalid admin key, sandbox mode stays enabled");
            return false;
        }
        self.state.write().await.sandboxed = false;
        warn!("Sandbox mode DISABLED");
        true
    }

    /// Halt everything: sandbox on, tickets dropped, rules disabled
    ///
    /// Until [`resume`](Self::resume) every non-analytical operation is
    /// rejected.
    pub async fn emergency_stop(&self, reason: &str) {
        let now = self.clock.now();
        let cleared = {
            let mut state = self.state.write().await;
            state.sandboxed = true;
            state.rules.set_all_enabled(false);
            state.emergency_stop = Some(EmergencyStop {
                reason: reason.to_string(),
                stopped_at: now,
            });
            state.confirmations.clear()
        };

        error!(reason = reason, cleared_confirmations = cleared, "Emergency stop triggered");
        self.notifier.emergency_stop(reason, now).await;
        if let Some(log) = &self.audit_log {
            let event = json!({
                "reason": reason,
                "cleared_confirmations": cleared,
            });
            log.record(now, "emergency_stop", &event).await;
        }
    }

    /// Lift an emergency stop; requires the configured admin key
    ///
    /// Rules are re-enabled; sandbox mode stays on.
    pub async fn resume(&self, admin_key: &str) -> bool {
        if !self.admin_key_matches(admin_key) {
            error!("Invalid admin key, emergency stop stays active");
            return false;
        }

        let now = self.clock.now();
        let previous = {
            let mut state = self.state.write().await;
            state.rules.set_all_enabled(true);
            state.emergency_stop.take()
        };

        match &previous {
            Some(stop) => info!(reason = %stop.reason, "Resumed after emergency stop"),
            None => info!("Resume requested without an active emergency stop"),
        }
        if let Some(log) = &self.audit_log {
            let event = json!({ "previous_reason": previous.map(|s| s.reason) });
            log.record(now, "resume", &event).await;
        }
        true
    }

    fn admin_key_matches(&self, candidate: &str) -> bool {
        crate::config::secrets::matches_secret(self.admin_key.as_deref(), candidate)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub async fn get_safety_status(&self) -> SafetyStatus {
        let now = self.clock.now();
        let state = self.state.read().await;
        let today = state.daily.tally(now.date_naive());

        SafetyStatus {
            sandboxed: state.sandboxed,
            session_stats: state.stats.clone(),
            daily_limits: DailyLimitsStatus {
                trades_today: today.trades,
                volume_today: today.volume,
                max_trades: state.config.max_daily_trades,
                max_volume: state.config.max_daily_volume,
            },
            safety_rules_status: state
                .rules
                .iter()
                .map(|rule| {
                    (
                        rule.name.clone(),
                        RuleStatus {
                            enabled: rule.enabled,
                            current: rule.current_value,
                            max: rule.max_value,
                            violations: rule.violation_count,
                            last_violation: rule.last_violation,
                        },
                    )
                })
                .collect(),
            pending_confirmations: state.confirmations.len(),
            approval_code_required: state.confirmations.requires_code(),
            emergency_stop: state.emergency_stop.clone(),
            timestamp: now,
        }
    }

    pub async fn session_stats(&self) -> SessionStats {
        self.state.read().await.stats.clone()
    }

    pub async fn rule(&self, name: &str) -> Option<SafetyRule> {
        self.state.read().await.rules.get(name).cloned()
    }

    pub async fn config(&self) -> SafetyConfig {
        self.state.read().await.config.clone()
    }
}
