//! Confirmation tickets for high-risk operations
//!
//! A ticket is single-use: approval removes it. Expiry is checked when an
//! approval is attempted; `purge_expired` exists for callers that want to
//! sweep on a schedule.

use super::decision::RiskLevel;
use crate::config::secrets::matches_secret;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

const TICKET_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingConfirmation {
    pub id: String,
    pub operation: String,
    pub details: Value,
    pub risk_level: RiskLevel,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Approved(PendingConfirmation),
    Unknown,
    Expired(PendingConfirmation),
    /// Wrong or missing approval code; the ticket stays pending
    CodeRejected,
}

#[derive(Debug)]
pub struct ConfirmationBroker {
    pending: HashMap<String, PendingConfirmation>,
    ttl: Duration,
    approval_code: Option<SecretString>,
    nonce: u64,
}

impl ConfirmationBroker {
    pub fn new(ttl: Duration, approval_code: Option<SecretString>) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
            approval_code,
            nonce: 0,
        }
    }

    pub fn requires_code(&self) -> bool {
        self.approval_code.is_some()
    }

    pub fn request(
        &mut self,
        operation: &str,
        details: Value,
        risk_level: RiskLevel,
        now: DateTime<Utc>,
    ) -> PendingConfirmation {
        let id = self.next_id(operation, now);
        let ticket = PendingConfirmation {
            id: id.clone(),
            operation: operation.to_string(),
            details,
            risk_level,
            requested_at: now,
            expires_at: now + self.ttl,
        };
        self.pending.insert(id, ticket.clone());
        ticket
    }

    pub fn approve(
        &mut self,
        id: &str,
        user_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> ApprovalOutcome {
        let Some(ticket) = self.pending.get(id) else {
            return ApprovalOutcome::Unknown;
        };

        if now > ticket.expires_at {
            return match self.pending.remove(id) {
                Some(ticket) => ApprovalOutcome::Expired(ticket),
                None => ApprovalOutcome::Unknown,
            };
        }

        if self.approval_code.is_some()
            && !matches_secret(self.approval_code.as_ref(), user_code.unwrap_or_default())
        {
            return ApprovalOutcome::CodeRejected;
        }

        match self.pending.remove(id) {
            Some(ticket) => ApprovalOutcome::Approved(ticket),
            None => ApprovalOutcome::Unknown,
        }
    }

    /// Remove every expired ticket, returning how many were dropped
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, t| now <= t.expires_at);
        before - self.pending.len()
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Outstanding tickets, oldest first
    pub fn list(&self) -> Vec<PendingConfirmation> {
        let mut tickets: Vec<_> = self.pending.values().cloned().collect();
        tickets.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
        tickets
    }

    fn next_id(&mut self, operation: &str, now: DateTime<Utc>) -> String {
        loop {
            self.nonce = self.nonce.wrapping_add(1);
            let seed = format!(
                "{}{}{}",
                operation,
                now.timestamp_nanos_opt().unwrap_or_default(),
                self.nonce
            );
            let hash = blake3::hash(seed.as_bytes());
            let id = hash.to_hex().as_str()[..TICKET_ID_LEN].to_string();
            if !self.pending.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn broker() -> ConfirmationBroker {
        ConfirmationBroker::new(Duration::minutes(5), None)
    }

    #[test]
    fn ticket_ids_are_short_hex_and_unique() {
        let mut broker = broker();
        let a = broker.request("real_trade", json!({}), RiskLevel::High, t0());
        let b = broker.request("real_trade", json!({}), RiskLevel::High, t0());

        assert_eq!(a.id.len(), TICKET_ID_LEN);
        assert!(a.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.id, b.id);
        assert_eq!(a.expires_at, t0() + Duration::minutes(5));
        assert_eq!(broker.len(), 2);
    }

    #[test]
    fn approval_consumes_ticket() {
        let mut broker = broker();
        let ticket = broker.request(
            "withdraw_funds",
            json!({"amount": 10}),
            RiskLevel::Critical,
            t0(),
        );

        let first = broker.approve(&ticket.id, None, t0() + Duration::seconds(30));
        assert!(matches!(first, ApprovalOutcome::Approved(_)));
        assert_eq!(broker.approve(&ticket.id, None, t0()), ApprovalOutcome::Unknown);
        assert!(broker.is_empty());
    }

    #[test]
    fn expired_ticket_is_removed_on_approval() {
        let mut broker = broker();
        let ticket = broker.request("real_trade", json!({}), RiskLevel::High, t0());

        let late = t0() + Duration::minutes(5) + Duration::seconds(1);
        let outcome = broker.approve(&ticket.id, None, late);
        assert!(matches!(outcome, ApprovalOutcome::Expired(_)));
        assert!(broker.is_empty());
    }

    #[test]
    fn approval_at_exact_expiry_still_succeeds() {
        let mut broker = broker();
        let ticket = broker.request("real_trade", json!({}), RiskLevel::High, t0());
        let outcome = broker.approve(&ticket.id, None, ticket.expires_at);
        assert!(matches!(outcome, ApprovalOutcome::Approved(_)));
    }

    #[test]
    fn approval_code_is_verified_when_configured() {
        let code = SecretString::from("2468".to_string());
        let mut broker = ConfirmationBroker::new(Duration::minutes(5), Some(code));
        assert!(broker.requires_code());
        let ticket = broker.request("real_trade", json!({}), RiskLevel::High, t0());

        assert_eq!(
            broker.approve(&ticket.id, None, t0()),
            ApprovalOutcome::CodeRejected
        );
        assert_eq!(
            broker.approve(&ticket.id, Some("1357"), t0()),
            ApprovalOutcome::CodeRejected
        );
        assert_eq!(broker.len(), 1);

        let outcome = broker.approve(&ticket.id, Some("2468"), t0());
        assert!(matches!(outcome, ApprovalOutcome::Approved(_)));
    }

    #[test]
    fn purge_drops_only_expired() {
        let mut broker = broker();
        broker.request("old", json!({}), RiskLevel::High, t0());
        let fresh = broker.request("new", json!({}), RiskLevel::High, t0() + Duration::minutes(4));

        assert_eq!(broker.purge_expired(t0() + Duration::minutes(6)), 1);
        let remaining = broker.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }
}
