use crate::channel_account_store::acquire_and_lock_one_in_tx;
use crate::error::StoreError;
use crate::transaction_store::raw_load_lockable_in_tx;
use sqlx::PgPool;
use tracing::warn;
use tss_types::TransactionBundle;

/// Pairs free transactions with free channel accounts under one database
/// transaction.
pub struct BundleLoader {
    pool: PgPool,
}

impl BundleLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads up to `limit` bundles. Returns fewer than `limit` (possibly
    /// zero) when the channel-account pool can't cover the demand, rather
    /// than failing the caller — starvation is expected steady state, not
    /// an error.
    pub async fn load_and_lock_tuples(
        &self,
        current_ledger: u32,
        next_ledger_lock: u32,
        limit: i64,
    ) -> Result<Vec<TransactionBundle>, StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let mut bundles = Vec::new();

        let candidates = raw_load_lockable_in_tx(&mut db_tx, current_ledger, limit).await?;
        for mut transaction in candidates {
            let Some(channel_account) =
                acquire_and_lock_one_in_tx(&mut db_tx, current_ledger, next_ledger_lock).await?
            else {
                warn!(
                    loaded = bundles.len(),
                    requested = limit,
                    "channel account pool exhausted, returning a partial batch"
                );
                break;
            };

            transaction.status = tss_types::TransactionStatus::Processing;
            transaction.locked_until_ledger_number = Some(next_ledger_lock);
            crate::transaction_store::raw_lock_transaction_in_tx(
                &mut db_tx,
                transaction.id,
                next_ledger_lock,
            )
            .await?;

            bundles.push(TransactionBundle {
                transaction,
                channel_account,
                locked_until_ledger_number: next_ledger_lock,
            });
        }

        db_tx.commit().await?;
        Ok(bundles)
    }
}

#[cfg(test)]
mod tests {
    // See `tss-store/tests/bundle_loader.rs` for integration coverage
    // against a live Postgres instance; the locking semantics this module
    // relies on (`FOR UPDATE SKIP LOCKED` pairing across two tables) are
    // not meaningfully testable without one.
}
