use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::payment_repository::{PaymentRepository, PaymentStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tss_events::{Event, EventProducer};
use tss_store::TransactionStore;
use tss_types::{TenantId, TransactionId, TransactionStatus, TransactionType};

/// The synchronizer never polls faster than this regardless of
/// configuration.
pub const DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS: u64 = 6;

pub struct PaymentStatusSynchronizer {
    transaction_store: Arc<TransactionStore>,
    payments: Arc<dyn PaymentRepository>,
    events: Arc<dyn EventProducer>,
    metrics: Arc<dyn SyncMetrics>,
    batch_size: i64,
}

impl PaymentStatusSynchronizer {
    pub fn new(
        transaction_store: Arc<TransactionStore>,
        payments: Arc<dyn PaymentRepository>,
        events: Arc<dyn EventProducer>,
        metrics: Arc<dyn SyncMetrics>,
        batch_size: i64,
    ) -> Self {
        Self {
            transaction_store,
            payments,
            events,
            metrics,
            batch_size,
        }
    }

    /// Runs the full per-tenant tick: select the batch, pair
    /// and transition each payment, emit its event, then mark the batch
    /// synced, all inside one database transaction. Any failure in steps
    /// 2-4 rolls back the whole batch so the next tick retries the same
    /// rows; step 1 itself (nothing to process) is not a failure.
    pub async fn sync_tenant(&self, tenant_id: &TenantId) -> Result<usize, SyncError> {
        let mut db_tx = self.transaction_store.begin().await?;
        let batch = self
            .transaction_store
            .get_transaction_batch_for_update(&mut db_tx, self.batch_size, tenant_id, TransactionType::Payment)
            .await?;

        if batch.is_empty() {
            db_tx.commit().await?;
            return Ok(0);
        }

        let mut synced_ids: Vec<TransactionId> = Vec::with_capacity(batch.len());
        for transaction in &batch {
            match self.sync_one(transaction).await {
                Ok(()) => synced_ids.push(transaction.id),
                Err(err) => {
                    // Abort the whole batch; dropping db_tx rolls back.
                    warn!(
                        transaction_id = %transaction.id,
                        error = %err,
                        "aborting synchronizer batch, will retry next tick"
                    );
                    return Err(err);
                }
            }
        }

        self.transaction_store
            .update_synced_transactions(&mut db_tx, &synced_ids)
            .await?;
        db_tx.commit().await?;
        Ok(synced_ids.len())
    }

    /// Pairs one terminal transaction against its business-layer payment,
    /// transitions the payment, and emits the outbound event. Does not
    /// touch the transaction store itself (the batch update happens once,
    /// after every row in the batch succeeds).
    async fn sync_one(&self, transaction: &tss_types::Transaction) -> Result<(), SyncError> {
        let payment = self
            .payments
            .find_by_external_id(&transaction.tenant_id, &transaction.external_id)
            .await?;

        if payment.external_id != transaction.external_id || payment.tenant_id != transaction.tenant_id {
            return Err(SyncError::PairingMismatch {
                transaction_id: transaction.id.to_string(),
                payment_id: payment.payment_id,
                reason: "payment external_id/tenant_id do not match the transaction".into(),
            });
        }

        let (status, message, event) = match transaction.status {
            TransactionStatus::Success => (
                PaymentStatus::Success,
                String::new(),
                Event::payment_success(
                    transaction.tenant_id.clone(),
                    transaction.id.to_string(),
                    transaction.external_id.to_string(),
                    transaction.completed_at.unwrap_or_else(chrono::Utc::now),
                    transaction.tx_hash.clone(),
                ),
            ),
            TransactionStatus::Error => {
                let message = transaction
                    .status_history
                    .last()
                    .map(|entry| entry.message.clone())
                    .unwrap_or_default();
                (
                    PaymentStatus::Failed,
                    message.clone(),
                    Event::payment_error(
                        transaction.tenant_id.clone(),
                        transaction.id.to_string(),
                        transaction.external_id.to_string(),
                        transaction.completed_at.unwrap_or_else(chrono::Utc::now),
                        message,
                    ),
                )
            }
            other => {
                return Err(SyncError::PairingMismatch {
                    transaction_id: transaction.id.to_string(),
                    payment_id: payment.payment_id,
                    reason: format!("transaction status {other:?} is not terminal"),
                })
            }
        };

        self.payments.mark_terminal(&payment, status, &message).await?;
        self.events.publish(event).await?;
        Ok(())
    }

    /// Drives `sync_tenant` for every configured tenant on a fixed tick,
    /// until `cancellation` fires. A per-tenant failure is logged and does
    /// not stop the other tenants or the next tick.
    pub async fn run_periodically(
        &self,
        tenants: &[TenantId],
        interval: Duration,
        cancellation: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("payment-status synchronizer stopping");
                    return;
                }
                _ = ticker.tick() => {
                    for tenant_id in tenants {
                        match self.sync_tenant(tenant_id).await {
                            Ok(count) => {
                                self.metrics.record_synchronizer_tick(tenant_id.as_str(), count);
                                if count > 0 {
                                    info!(tenant_id = %tenant_id, synced = count, "synchronized terminal transactions");
                                }
                            }
                            Err(err) => {
                                error!(tenant_id = %tenant_id, error = %err, "synchronizer tick failed for tenant");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_interval_is_six_seconds() {
        assert_eq!(DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS, 6);
    }
}
