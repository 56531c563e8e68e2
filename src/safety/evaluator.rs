//! Rule evaluation
//!
//! Pure functions over a read-only view of the safety state. Bookkeeping
//! (violation counters, session stats) is applied by the caller once the
//! assessment is known.

use super::daily::DailyTally;
use super::decision::{RiskLevel, Violation};
use super::operation::{
    Operation, PositionCloseOperation, RealMoneyOperation, SystemConfigOperation, TradeOperation,
};
use super::rules::{
    RuleTable, MAX_DAILY_TRADES, MAX_DAILY_VOLUME, MAX_PORTFOLIO_RISK, MAX_POSITION_RISK,
    MAX_POSITION_SIZE, MIN_CONFIDENCE,
};
use super::stats::SessionStats;
use super::status::EmergencyStop;
use crate::config::SafetyConfig;
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Settings no automated caller may change
pub const PROTECTED_CONFIG_KEYS: &[&str] = &[
    "openai_api_key",
    "binance_api_secret",
    "database_url",
    "security_enabled",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assessment {
    pub violations: Vec<Violation>,
    pub risk_level: RiskLevel,
}

impl Assessment {
    fn at(risk_level: RiskLevel) -> Self {
        Self {
            violations: Vec::new(),
            risk_level,
        }
    }

    fn raise(&mut self, level: RiskLevel) {
        self.risk_level = self.risk_level.max(level);
    }

    fn flag(&mut self, violation: Violation) {
        self.raise(violation.severity);
        self.violations.push(violation);
    }

    /// Final level: never below the worst violation, and never LOW once
    /// anything was flagged
    fn aggregate(mut self) -> Self {
        if let Some(worst) = self.violations.iter().map(|v| v.severity).max() {
            self.raise(worst);
            self.raise(RiskLevel::Medium);
        }
        self
    }
}

pub(crate) struct Evaluator<'a> {
    pub rules: &'a RuleTable,
    pub config: &'a SafetyConfig,
    pub today: DailyTally,
    pub stats: &'a SessionStats,
    pub emergency_stop: Option<&'a EmergencyStop>,
    pub now: DateTime<Utc>,
}

impl Evaluator<'_> {
    pub fn evaluate(&self, operation: &Operation) -> Result<Assessment> {
        let mut assessment = match operation {
            Operation::MarketAnalysis | Operation::PortfolioCheck => {
                return Ok(Assessment::at(RiskLevel::Low));
            }
            Operation::SmallTrade(trade) | Operation::LargeTrade(trade) => {
                self.check_trading(trade)?
            }
            Operation::RealMoney(op) => self.check_real_money(op)?,
            Operation::PositionClose(op) => self.check_position_close(op)?,
            Operation::SystemConfig(op) => self.check_system_config(op),
        };

        if let Some(stop) = self.emergency_stop {
            assessment.flag(Violation::new(
                RiskLevel::Critical,
                format!("emergency stop active: {}", stop.reason),
            ));
        }
        self.general_checks(&mut assessment);

        Ok(assessment.aggregate())
    }

    fn check_trading(&self, trade: &TradeOperation) -> Result<Assessment> {
        validate_trade(trade)?;

        let mut assessment = Assessment::at(RiskLevel::Low);
        let position_size = trade.position_size();

        if let Some(max) = self.rules.active_limit(MAX_POSITION_SIZE) {
            if position_size > max {
                assessment.flag(Violation::for_rule(
                    MAX_POSITION_SIZE,
                    RiskLevel::High,
                    format!(
                        "Position size ${:.2} exceeds maximum ${:.2}",
                        position_size, max
                    ),
                ));
            }
        }

        if let Some(inverted) = self.rules.active_limit(MIN_CONFIDENCE) {
            let min_confidence = 1.0 - inverted;
            if trade.confidence < min_confidence {
                assessment.flag(Violation::for_rule(
                    MIN_CONFIDENCE,
                    RiskLevel::Medium,
                    format!(
                        "Signal confidence {:.2} below minimum {:.2}",
                        trade.confidence, min_confidence
                    ),
                ));
            }
        }

        if let Some(max) = self.rules.active_limit(MAX_DAILY_TRADES) {
            if f64::from(self.today.trades) >= max {
                assessment.flag(Violation::for_rule(
                    MAX_DAILY_TRADES,
                    RiskLevel::High,
                    format!(
                        "Daily trade limit reached: {} of {} trades",
                        self.today.trades, max
                    ),
                ));
            }
        }

        if let Some(max) = self.rules.active_limit(MAX_DAILY_VOLUME) {
            if self.today.volume + position_size > max {
                assessment.flag(Violation::for_rule(
                    MAX_DAILY_VOLUME,
                    RiskLevel::High,
                    format!(
                        "Daily volume limit exceeded: ${:.2} traded + ${:.2} requested > ${:.2}",
                        self.today.volume, position_size, max
                    ),
                ));
            }
        }

        if let Some(portfolio_value) = trade.portfolio_value {
            if let Some(max) = self.rules.active_limit(MAX_POSITION_RISK) {
                let position_risk = position_size / portfolio_value * 100.0;
                if position_risk > max {
                    assessment.flag(Violation::for_rule(
                        MAX_POSITION_RISK,
                        RiskLevel::High,
                        format!(
                            "Position risk {:.2}% of portfolio exceeds maximum {:.2}%",
                            position_risk, max
                        ),
                    ));
                }
            }

            if let (Some(exposure), Some(max)) = (
                trade.open_exposure,
                self.rules.active_limit(MAX_PORTFOLIO_RISK),
            ) {
                let portfolio_risk = (exposure + position_size) / portfolio_value * 100.0;
                if portfolio_risk > max {
                    assessment.flag(Violation::for_rule(
                        MAX_PORTFOLIO_RISK,
                        RiskLevel::High,
                        format!(
                            "Portfolio risk {:.2}% exceeds maximum {:.2}%",
                            portfolio_risk, max
                        ),
                    ));
                }
            }
        }

        // Hard gate, not a threshold: no rule can switch it off.
        if !trade.dry_run {
            assessment.flag(Violation::new(
                RiskLevel::Critical,
                "Live trading attempted without authorization (dry_run=false)",
            ));
        }

        Ok(assessment)
    }

    fn check_real_money(&self, op: &RealMoneyOperation) -> Result<Assessment> {
        if !op.amount.is_finite() || op.amount < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "real-money amount must be a non-negative number, got {}",
                op.amount
            )));
        }

        let mut assessment = Assessment::at(RiskLevel::High);
        if !self.config.real_trading_enabled {
            assessment.flag(Violation::new(
                RiskLevel::Critical,
                format!(
                    "Real-money operation of ${:.2} rejected: real trading is disabled",
                    op.amount
                ),
            ));
        } else if !op.user_confirmation {
            assessment.flag(Violation::new(
                RiskLevel::Critical,
                format!(
                    "Real-money operation of ${:.2} rejected: no user confirmation",
                    op.amount
                ),
            ));
        }
        Ok(assessment)
    }

    fn check_position_close(&self, op: &PositionCloseOperation) -> Result<Assessment> {
        if let Some(qty) = op.quantity {
            if !qty.is_finite() || qty <= 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "close quantity for {} must be positive, got {}",
                    op.symbol, qty
                )));
            }
        }
        Ok(Assessment::at(RiskLevel::Low))
    }

    fn check_system_config(&self, op: &SystemConfigOperation) -> Assessment {
        let mut assessment = Assessment::at(RiskLevel::Medium);
        for key in &op.changed_keys {
            if PROTECTED_CONFIG_KEYS.contains(&key.as_str()) {
                assessment.flag(Violation::new(
                    RiskLevel::Critical,
                    format!("Change to protected setting {} is not allowed", key),
                ));
            }
        }
        assessment
    }

    fn general_checks(&self, assessment: &mut Assessment) {
        let session_hours = self.stats.session_age(self.now).num_seconds() as f64 / 3600.0;
        if session_hours > self.config.max_session_hours {
            assessment.flag(Violation::new(
                RiskLevel::Low,
                format!(
                    "Session has run {:.1}h, longer than the {:.1}h limit",
                    session_hours, self.config.max_session_hours
                ),
            ));
        }

        if self.stats.risk_violations > self.config.max_session_violations {
            assessment.flag(Violation::new(
                RiskLevel::Low,
                format!(
                    "Too many risk violations this session: {} (limit {})",
                    self.stats.risk_violations, self.config.max_session_violations
                ),
            ));
        }
    }
}

pub(crate) fn validate_trade(trade: &TradeOperation) -> Result<()> {
    if !trade.quantity.is_finite() || trade.quantity <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "quantity for {} must be positive, got {}",
            trade.symbol, trade.quantity
        )));
    }
    if !trade.price.is_finite() || trade.price <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "price for {} must be positive, got {}",
            trade.symbol, trade.price
        )));
    }
    if !trade.confidence.is_finite() || !(0.0..=1.0).contains(&trade.confidence) {
        return Err(Error::InvalidArgument(format!(
            "confidence must be within [0, 1], got {}",
            trade.confidence
        )));
    }
    if let Some(pv) = trade.portfolio_value {
        if !pv.is_finite() || pv <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "portfolio value must be positive, got {}",
                pv
            )));
        }
    }
    if let Some(exposure) = trade.open_exposure {
        if !exposure.is_finite() || exposure < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "open exposure must be non-negative, got {}",
                exposure
            )));
        }
    }
    Ok(())
}
