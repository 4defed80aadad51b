use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] tss_store::StoreError),
    #[error(transparent)]
    Event(#[from] tss_events::EventProducerError),
    #[error(transparent)]
    Payment(#[from] crate::payment_repository::PaymentRepositoryError),
    #[error("transaction {transaction_id} and payment {payment_id} are not paired: {reason}")]
    PairingMismatch {
        transaction_id: String,
        payment_id: String,
        reason: String,
    },
}
