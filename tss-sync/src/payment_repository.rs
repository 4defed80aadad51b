use async_trait::async_trait;
use thiserror::Error;
use tss_types::{ExternalId, TenantId};

/// Terminal status the synchronizer writes to the business-layer payment,
/// mirroring the transaction's own terminal `TransactionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// The business-layer payment record the synchronizer pairs against a
/// terminal transaction. Only the fields needed to validate the pairing
/// and record the transition are modeled here; everything else about a
/// payment belongs to the business layer.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub external_id: ExternalId,
    pub tenant_id: TenantId,
}

#[derive(Debug, Error)]
pub enum PaymentRepositoryError {
    #[error("no payment found for external_id {0}")]
    NotFound(String),
    #[error("payment repository error: {0}")]
    Other(String),
}

/// The business-level `payments` table, reached through a narrow capability:
/// this core only knows how to ask for and update one record by
/// `external_id`, never how the table itself is structured.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_external_id(
        &self,
        tenant_id: &TenantId,
        external_id: &ExternalId,
    ) -> Result<PaymentRecord, PaymentRepositoryError>;

    /// Transitions the payment to a terminal status and appends its own
    /// status history; implemented against whatever the business layer's
    /// payments store actually is.
    async fn mark_terminal(
        &self,
        payment: &PaymentRecord,
        status: PaymentStatus,
        message: &str,
    ) -> Result<(), PaymentRepositoryError>;
}

/// Reports every lookup as not found and logs every would-be write — the
/// only implementation this crate ships, standing in until the binary is
/// wired to a real payments store.
pub struct LoggingPaymentRepository;

#[async_trait]
impl PaymentRepository for LoggingPaymentRepository {
    async fn find_by_external_id(
        &self,
        tenant_id: &TenantId,
        external_id: &ExternalId,
    ) -> Result<PaymentRecord, PaymentRepositoryError> {
        tracing::warn!(
            tenant_id = %tenant_id,
            external_id = %external_id,
            "no payment repository configured, treating lookup as not found"
        );
        Err(PaymentRepositoryError::NotFound(external_id.to_string()))
    }

    async fn mark_terminal(
        &self,
        payment: &PaymentRecord,
        status: PaymentStatus,
        message: &str,
    ) -> Result<(), PaymentRepositoryError> {
        tracing::info!(
            payment_id = %payment.payment_id,
            status = ?status,
            message,
            "no payment repository configured, dropping terminal status write"
        );
        Ok(())
    }
}
