use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl TransactionStatus {
    /// `SUCCESS` and `ERROR` are terminal: once reached, the row is never
    /// transitioned again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Error)
    }

    /// The allowed transitions: `PENDING->PROCESSING`,
    /// `PROCESSING->{SUCCESS,ERROR}`, and `{PENDING,PROCESSING}->PENDING`
    /// (reprocess).
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Success)
                | (Processing, Error)
                | (Pending, Pending)
                | (Processing, Pending)
        )
    }
}

/// One append-only entry in a transaction's `status_history`. Constructing
/// the JSON object stored in the `status_history` array column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    #[serde(rename = "status_message")]
    pub message: String,
    #[serde(rename = "stellar_transaction_hash")]
    pub tx_hash: Option<String>,
    pub xdr_sent: Option<String>,
    pub xdr_received: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(status: TransactionStatus, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            message: message.into(),
            tx_hash: None,
            xdr_sent: None,
            xdr_received: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionStatus::*;

    #[test]
    fn allowed_transitions_are_exactly_the_documented_set() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Success));
        assert!(Processing.can_transition_to(Error));
        assert!(Pending.can_transition_to(Pending));
        assert!(Processing.can_transition_to(Pending));
    }

    #[test]
    fn terminal_statuses_accept_no_further_transitions() {
        for terminal in [Success, Error] {
            for next in [Pending, Processing, Success, Error] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn success_and_error_are_terminal() {
        assert!(Success.is_terminal());
        assert!(Error.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Processing.is_terminal());
    }
}
