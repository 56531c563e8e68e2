//! Safety and risk validation
//!
//! Every operation the agent wants to perform passes through
//! [`SafetySystem::check_operation_safety`] first. Executed trades are fed
//! back through [`SafetySystem::update_daily_limits`]; high-risk operations
//! can be parked behind a confirmation ticket until a human approves them.

pub mod clock;
pub mod confirmation;
pub mod daily;
pub mod decision;
mod evaluator;
pub mod notify;
pub mod operation;
pub mod rules;
pub mod sandbox;
pub mod stats;
pub mod status;
mod system;

pub use clock::{Clock, ManualClock, SystemClock};
pub use confirmation::PendingConfirmation;
pub use daily::DailyTally;
pub use decision::{RiskLevel, SafetyDecision, Violation};
pub use evaluator::PROTECTED_CONFIG_KEYS;
pub use notify::{LogNotifier, Notifier};
pub use operation::{
    Operation, OperationType, PositionCloseOperation, RealMoneyOperation, SystemConfigOperation,
    TradeOperation, TradeSide,
};
pub use rules::SafetyRule;
pub use sandbox::{SandboxResponse, SandboxStatus, ALLOWED_OPERATIONS, BLOCKED_OPERATIONS};
pub use stats::SessionStats;
pub use status::{EmergencyStop, SafetyStatus};
pub use system::{SafetySystem, SafetySystemBuilder};
