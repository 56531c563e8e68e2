//! Operations submitted for a safety check
//!
//! Each variant carries only the fields its check reads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse operation category, used for logging and the decision record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    MarketAnalysis,
    PortfolioCheck,
    SmallTrade,
    LargeTrade,
    RealMoney,
    PositionClose,
    SystemConfig,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::MarketAnalysis => "market_analysis",
            OperationType::PortfolioCheck => "portfolio_check",
            OperationType::SmallTrade => "small_trade",
            OperationType::LargeTrade => "large_trade",
            OperationType::RealMoney => "real_money",
            OperationType::PositionClose => "position_close",
            OperationType::SystemConfig => "system_config",
        }
    }

    /// Read-only operations skip every check
    pub fn is_analytical(&self) -> bool {
        matches!(
            self,
            OperationType::MarketAnalysis | OperationType::PortfolioCheck
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

fn default_dry_run() -> bool {
    true
}

/// A proposed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOperation {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    /// Unit price (USD)
    pub price: f64,
    /// Signal confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Simulated trade; anything else needs explicit authorization
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Total portfolio value (USD), enables the position/portfolio risk checks
    #[serde(default)]
    pub portfolio_value: Option<f64>,
    /// Notional already held across open positions (USD)
    #[serde(default)]
    pub open_exposure: Option<f64>,
}

impl TradeOperation {
    pub fn new(symbol: impl Into<String>, side: TradeSide, quantity: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            confidence: 1.0,
            dry_run: true,
            portfolio_value: None,
            open_exposure: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn live(mut self) -> Self {
        self.dry_run = false;
        self
    }

    pub fn with_portfolio(mut self, portfolio_value: f64, open_exposure: Option<f64>) -> Self {
        self.portfolio_value = Some(portfolio_value);
        self.open_exposure = open_exposure;
        self
    }

    /// Notional value of the trade (USD)
    pub fn position_size(&self) -> f64 {
        self.quantity * self.price
    }
}

/// A request to move real funds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealMoneyOperation {
    #[serde(default)]
    pub amount: f64,
    /// The operator explicitly confirmed this operation
    #[serde(default)]
    pub user_confirmation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCloseOperation {
    pub symbol: String,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// A proposed change to the running configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfigOperation {
    pub changed_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation_type", rename_all = "snake_case")]
pub enum Operation {
    MarketAnalysis,
    PortfolioCheck,
    SmallTrade(TradeOperation),
    LargeTrade(TradeOperation),
    RealMoney(RealMoneyOperation),
    PositionClose(PositionCloseOperation),
    SystemConfig(SystemConfigOperation),
}

impl Operation {
    pub fn kind(&self) -> OperationType {
        match self {
            Operation::MarketAnalysis => OperationType::MarketAnalysis,
            Operation::PortfolioCheck => OperationType::PortfolioCheck,
            Operation::SmallTrade(_) => OperationType::SmallTrade,
            Operation::LargeTrade(_) => OperationType::LargeTrade,
            Operation::RealMoney(_) => OperationType::RealMoney,
            Operation::PositionClose(_) => OperationType::PositionClose,
            Operation::SystemConfig(_) => OperationType::SystemConfig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_payload_parses_with_defaults() {
        let op: Operation = serde_json::from_value(json!({
            "operation_type": "small_trade",
            "symbol": "BTCUSDT",
            "side": "buy",
            "quantity": 0.01,
            "price": 60000.0,
            "confidence": 0.8
        }))
        .expect("parse trade");

        assert_eq!(op.kind(), OperationType::SmallTrade);
        match op {
            Operation::SmallTrade(trade) => {
                assert!(trade.dry_run);
                assert!(trade.portfolio_value.is_none());
                assert!((trade.position_size() - 600.0).abs() < 1e-9);
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn unit_variants_parse_from_tag_only() {
        let op: Operation =
            serde_json::from_value(json!({ "operation_type": "market_analysis" })).unwrap();
        assert_eq!(op, Operation::MarketAnalysis);
        assert!(op.kind().is_analytical());
    }

    #[test]
    fn unknown_operation_type_is_rejected() {
        let parsed: Result<Operation, _> =
            serde_json::from_value(json!({ "operation_type": "withdraw_everything" }));
        assert!(parsed.is_err());
    }
}
