//! Agent Safety System
//!
//! The risk gate between an autonomous trading agent's decisions and the
//! broker that would execute them:
//! - Evaluate proposed operations against a declarative rule table
//! - Track executed trades per UTC day
//! - Park high-risk operations behind short-lived confirmation tickets
//! - Restrict the agent to a fixed set of read-only operations in sandbox mode
//!
//! # Safety Model
//!
//! - Live (non dry-run) trades are always rejected by the evaluator
//! - Evaluation never errors: internal failures reject the operation
//! - Leaving sandbox mode or resuming after an emergency stop needs the admin key
//! - Every decision can be appended to a JSONL audit trail

pub mod audit_log;
pub mod config;
pub mod safety;

mod error;

// Re-export commonly used types
pub use audit_log::AuditLog;
pub use config::{Config, SafetyConfig, SafetySecrets};
pub use error::{Error, Result};
pub use safety::{
    Operation, OperationType, RiskLevel, SafetyDecision, SafetyStatus, SafetySystem,
    TradeOperation,
};
