use crate::error::ValidationError;
use crate::ids::{ExternalId, TenantId, TransactionId};
use crate::payload::{TransactionPayload, TransactionType};
use crate::status::{StatusHistoryEntry, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queued request to submit one blockchain transaction, plus everything
/// accumulated while the core drives it to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub external_id: ExternalId,
    pub tenant_id: TenantId,
    pub payload: TransactionPayload,
    pub status: TransactionStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub attempts_count: u32,
    pub xdr_sent: Option<String>,
    pub xdr_received: Option<String>,
    pub tx_hash: Option<String>,
    pub locked_until_ledger_number: Option<u32>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
    pub distribution_account: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a new, `PENDING` transaction with its initial history entry.
    /// Mirrors the store's `insert`: payload validation happens here so a
    /// caller cannot construct an already-invalid row.
    pub fn new(
        external_id: ExternalId,
        tenant_id: TenantId,
        payload: TransactionPayload,
    ) -> Result<Self, ValidationError> {
        payload.validate()?;
        Ok(Self {
            id: TransactionId::new(),
            external_id,
            tenant_id,
            payload,
            status: TransactionStatus::Pending,
            status_history: vec![StatusHistoryEntry::new(
                TransactionStatus::Pending,
                "queued",
            )],
            attempts_count: 0,
            xdr_sent: None,
            xdr_received: None,
            tx_hash: None,
            locked_until_ledger_number: None,
            sent_at: None,
            completed_at: None,
            synced_at: None,
            distribution_account: None,
            created_at: Utc::now(),
        })
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.payload.transaction_type()
    }

    /// True when the row holds neither an active lease nor a terminal
    /// status — eligible to be picked up by the bundle loader.
    pub fn is_free(&self, current_ledger: u32) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.locked_until_ledger_number {
            Some(locked_until) => locked_until < current_ledger,
            None => true,
        }
    }

    /// Appends a history entry and moves `status`, validating the
    /// transition against the allowed-transition table.
    pub fn push_status(
        &mut self,
        next: TransactionStatus,
        message: impl Into<String>,
    ) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", next),
            });
        }
        self.status = next;
        let mut entry = StatusHistoryEntry::new(next, message);
        entry.tx_hash = self.tx_hash.clone();
        entry.xdr_sent = self.xdr_sent.clone();
        entry.xdr_received = self.xdr_received.clone();
        self.status_history.push(entry);
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Ledger-bound safety check for an already-granted lease, used as the
    /// worker's pre-submission gate: the lease stays usable while
    /// `current_ledger < locked_until_ledger_number`, and must be abandoned
    /// the moment the ledger reaches or passes the bound — a one-ledger
    /// margin short of the acquire predicate in `is_free`, which only
    /// treats the row as re-acquirable once `current_ledger` has strictly
    /// passed it.
    pub fn lease_still_valid(&self, current_ledger: u32) -> bool {
        match self.locked_until_ledger_number {
            Some(locked_until) => current_ledger < locked_until,
            None => false,
        }
    }

    /// Invariant check used by tests and, defensively, before a status
    /// write is sent to storage: `status_history.last().status == status`.
    pub fn history_matches_status(&self) -> bool {
        self.status_history
            .last()
            .map(|entry| entry.status == self.status)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PaymentPayload;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn sample_payload() -> TransactionPayload {
        TransactionPayload::Payment(PaymentPayload {
            asset_code: "xlm".into(),
            asset_issuer: None,
            amount: Decimal::from_str("1").unwrap(),
            destination: crate::strkey::encode_ed25519_public_key(&[1u8; 32]),
            memo: None,
        })
    }

    fn sample() -> Transaction {
        Transaction::new(
            ExternalId::new("ext-1").unwrap(),
            TenantId::new("t1").unwrap(),
            sample_payload(),
        )
        .unwrap()
    }

    #[test]
    fn new_transaction_starts_pending_with_history() {
        let tx = sample();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.status_history.len(), 1);
        assert!(tx.history_matches_status());
        assert_eq!(tx.attempts_count, 0);
        assert!(tx.completed_at.is_none());
    }

    #[test]
    fn valid_transitions_update_history_and_status() {
        let mut tx = sample();
        tx.push_status(TransactionStatus::Processing, "leased").unwrap();
        assert_eq!(tx.status, TransactionStatus::Processing);
        tx.push_status(TransactionStatus::Success, "landed").unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert!(tx.completed_at.is_some());
        assert!(tx.history_matches_status());
        assert_eq!(tx.status_history.len(), 3);
    }

    #[test]
    fn terminal_status_rejects_further_transitions() {
        let mut tx = sample();
        tx.push_status(TransactionStatus::Processing, "leased").unwrap();
        tx.push_status(TransactionStatus::Error, "bad_seq").unwrap();
        let err = tx.push_status(TransactionStatus::Processing, "retry");
        assert!(err.is_err());
    }

    #[test]
    fn lease_validity_boundary_matches_spec() {
        let mut tx = sample();
        tx.locked_until_ledger_number = Some(100);
        assert!(tx.lease_still_valid(99));
        assert!(!tx.lease_still_valid(100));
        assert!(!tx.lease_still_valid(101));
    }

    #[test]
    fn is_free_respects_lock_and_terminal_status() {
        let mut tx = sample();
        assert!(tx.is_free(100));
        tx.locked_until_ledger_number = Some(200);
        assert!(!tx.is_free(100));
        assert!(tx.is_free(201));
        tx.status = TransactionStatus::Success;
        assert!(!tx.is_free(500));
    }
}
