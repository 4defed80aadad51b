use crate::error::StoreError;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tss_types::{
    ExternalId, StatusHistoryEntry, TenantId, TransactionId, TransactionPayload, TransactionStatus,
    TransactionType,
};
use uuid::Uuid;

pub struct TransactionStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    external_id: String,
    tenant_id: String,
    #[sqlx(rename = "type")]
    type_: String,
    payload: Json<TransactionPayload>,
    status: String,
    status_history: Json<Vec<StatusHistoryEntry>>,
    attempts_count: i32,
    xdr_sent: Option<String>,
    xdr_received: Option<String>,
    tx_hash: Option<String>,
    locked_until_ledger_number: Option<i64>,
    sent_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
    distribution_account: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for tss_types::Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, StoreError> {
        Ok(tss_types::Transaction {
            id: TransactionId(row.id),
            external_id: ExternalId::new(row.external_id)
                .map_err(|e| StoreError::InvalidState(e.to_string()))?,
            tenant_id: TenantId::new(row.tenant_id)
                .map_err(|e| StoreError::InvalidState(e.to_string()))?,
            payload: row.payload.0,
            status: status_from_str(&row.status)?,
            status_history: row.status_history.0,
            attempts_count: row.attempts_count as u32,
            xdr_sent: row.xdr_sent,
            xdr_received: row.xdr_received,
            tx_hash: row.tx_hash,
            locked_until_ledger_number: row.locked_until_ledger_number.map(|v| v as u32),
            sent_at: row.sent_at,
            completed_at: row.completed_at,
            synced_at: row.synced_at,
            distribution_account: row.distribution_account,
            created_at: row.created_at,
        })
    }
}

fn type_to_str(t: TransactionType) -> &'static str {
    match t {
        TransactionType::Payment => "PAYMENT",
        TransactionType::WalletCreation => "WALLET_CREATION",
        TransactionType::Sponsored => "SPONSORED",
    }
}

fn status_to_str(s: TransactionStatus) -> &'static str {
    match s {
        TransactionStatus::Pending => "PENDING",
        TransactionStatus::Processing => "PROCESSING",
        TransactionStatus::Success => "SUCCESS",
        TransactionStatus::Error => "ERROR",
    }
}

fn status_from_str(s: &str) -> Result<TransactionStatus, StoreError> {
    match s {
        "PENDING" => Ok(TransactionStatus::Pending),
        "PROCESSING" => Ok(TransactionStatus::Processing),
        "SUCCESS" => Ok(TransactionStatus::Success),
        "ERROR" => Ok(TransactionStatus::Error),
        other => Err(StoreError::InvalidState(format!("unknown status {other}"))),
    }
}

impl TransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a transaction for callers that need to interleave store calls
    /// with external work inside the same database transaction (the
    /// synchronizer: batch-select, external payment update, then mark
    /// synced, all-or-nothing).
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Every tenant id that currently has at least one row, for callers
    /// (the synchronizer's startup wiring) that aren't given an explicit
    /// tenant list to iterate.
    pub async fn list_distinct_tenant_ids(&self) -> Result<Vec<TenantId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT tenant_id FROM submitter_transactions")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(raw,)| TenantId::new(raw).ok())
            .collect())
    }

    pub async fn insert(&self, tx: &tss_types::Transaction) -> Result<(), StoreError> {
        let mut db_tx = self.pool.begin().await?;
        self.insert_in_tx(&mut db_tx, tx).await?;
        db_tx.commit().await?;
        Ok(())
    }

    pub async fn bulk_insert(&self, txs: &[tss_types::Transaction]) -> Result<(), StoreError> {
        let mut db_tx = self.pool.begin().await?;
        for tx in txs {
            self.insert_in_tx(&mut db_tx, tx).await?;
        }
        db_tx.commit().await?;
        Ok(())
    }

    async fn insert_in_tx(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        tx: &tss_types::Transaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO submitter_transactions
                (id, external_id, tenant_id, type, payload, status, status_history,
                 attempts_count, xdr_sent, xdr_received, tx_hash, locked_until_ledger_number,
                 sent_at, completed_at, synced_at, distribution_account, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(tx.id.0)
        .bind(tx.external_id.as_str())
        .bind(tx.tenant_id.as_str())
        .bind(type_to_str(tx.transaction_type()))
        .bind(Json(&tx.payload))
        .bind(status_to_str(tx.status))
        .bind(Json(&tx.status_history))
        .bind(tx.attempts_count as i32)
        .bind(&tx.xdr_sent)
        .bind(&tx.xdr_received)
        .bind(&tx.tx_hash)
        .bind(tx.locked_until_ledger_number.map(|v| v as i64))
        .bind(tx.sent_at)
        .bind(tx.completed_at)
        .bind(tx.synced_at)
        .bind(&tx.distribution_account)
        .bind(tx.created_at)
        .execute(&mut **db_tx)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: TransactionId) -> Result<tss_types::Transaction, StoreError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT * FROM submitter_transactions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    pub async fn get_all_by_external_ids(
        &self,
        tenant_id: &TenantId,
        external_ids: &[ExternalId],
    ) -> Result<Vec<tss_types::Transaction>, StoreError> {
        let ids: Vec<&str> = external_ids.iter().map(ExternalId::as_str).collect();
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT * FROM submitter_transactions
            WHERE tenant_id = $1 AND external_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(&ids as &[&str])
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Batch select for the synchronizer: terminal,
    /// unsynced rows, oldest first, locked against a concurrent scan.
    pub async fn get_transaction_batch_for_update(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        size: i64,
        tenant_id: &TenantId,
        transaction_type: TransactionType,
    ) -> Result<Vec<tss_types::Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT * FROM submitter_transactions
            WHERE tenant_id = $1 AND type = $2
              AND status IN ('SUCCESS', 'ERROR') AND synced_at IS NULL
            ORDER BY completed_at ASC
            LIMIT $3
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(type_to_str(transaction_type))
        .bind(size)
        .fetch_all(&mut **db_tx)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn get_transaction_pending_update_by_id(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        id: TransactionId,
        transaction_type: TransactionType,
    ) -> Result<tss_types::Transaction, StoreError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT * FROM submitter_transactions
            WHERE id = $1 AND type = $2
              AND status IN ('SUCCESS', 'ERROR') AND synced_at IS NULL
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(id.0)
        .bind(type_to_str(transaction_type))
        .fetch_optional(&mut **db_tx)
        .await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    pub async fn update_status_to_success(
        &self,
        id: TransactionId,
        message: &str,
    ) -> Result<(), StoreError> {
        self.update_terminal_status(id, TransactionStatus::Success, message)
            .await
    }

    pub async fn update_status_to_error(
        &self,
        id: TransactionId,
        message: &str,
    ) -> Result<(), StoreError> {
        self.update_terminal_status(id, TransactionStatus::Error, message)
            .await
    }

    async fn update_terminal_status(
        &self,
        id: TransactionId,
        next: TransactionStatus,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT * FROM submitter_transactions WHERE id = $1 AND status = 'PROCESSING' FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *db_tx)
        .await?;
        let mut transaction: tss_types::Transaction = row.ok_or(StoreError::NotFound)?.try_into()?;
        transaction.push_status(next, message)?;
        self.write_status_and_history(&mut db_tx, &transaction).await?;
        db_tx.commit().await?;
        Ok(())
    }

    /// Records a submitted envelope: validates the hash
    /// length, that the envelope decodes as base64, and that the
    /// distribution key is well formed, before persisting.
    pub async fn update_stellar_transaction_hash_xdr_sent_and_distribution_account(
        &self,
        id: TransactionId,
        tx_hash: &str,
        xdr_sent: &str,
        distribution_account: &str,
    ) -> Result<(), StoreError> {
        if tx_hash.len() != 64 || !tx_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(tss_types::ValidationError::InvalidTransactionHash.into());
        }
        if base64::decode(xdr_sent).is_err() {
            return Err(tss_types::ValidationError::InvalidEnvelope.into());
        }
        if !tss_types::strkey::is_valid_ed25519_public_key(distribution_account) {
            return Err(tss_types::ValidationError::InvalidDestination.into());
        }

        let mut db_tx = self.pool.begin().await?;
        let row: Option<TransactionRow> =
            sqlx::query_as("SELECT * FROM submitter_transactions WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *db_tx)
                .await?;
        let mut transaction: tss_types::Transaction = row.ok_or(StoreError::NotFound)?.try_into()?;
        transaction.tx_hash = Some(tx_hash.to_string());
        transaction.xdr_sent = Some(xdr_sent.to_string());
        transaction.distribution_account = Some(distribution_account.to_string());
        transaction.attempts_count += 1;
        transaction.sent_at = Some(Utc::now());
        let mut entry = StatusHistoryEntry::new(transaction.status, "submitted");
        entry.tx_hash = transaction.tx_hash.clone();
        entry.xdr_sent = transaction.xdr_sent.clone();
        transaction.status_history.push(entry);

        sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET tx_hash = $2, xdr_sent = $3, distribution_account = $4,
                attempts_count = $5, sent_at = $6, status_history = $7
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(&transaction.tx_hash)
        .bind(&transaction.xdr_sent)
        .bind(&transaction.distribution_account)
        .bind(transaction.attempts_count as i32)
        .bind(transaction.sent_at)
        .bind(Json(&transaction.status_history))
        .execute(&mut *db_tx)
        .await?;
        db_tx.commit().await?;
        Ok(())
    }

    pub async fn update_stellar_transaction_xdr_received(
        &self,
        id: TransactionId,
        xdr_received: &str,
    ) -> Result<(), StoreError> {
        if base64::decode(xdr_received).is_err() {
            return Err(tss_types::ValidationError::InvalidEnvelope.into());
        }

        let mut db_tx = self.pool.begin().await?;
        let row: Option<TransactionRow> =
            sqlx::query_as("SELECT * FROM submitter_transactions WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *db_tx)
                .await?;
        let mut transaction: tss_types::Transaction = row.ok_or(StoreError::NotFound)?.try_into()?;
        transaction.xdr_received = Some(xdr_received.to_string());
        let mut entry = StatusHistoryEntry::new(transaction.status, "result received");
        entry.xdr_received = transaction.xdr_received.clone();
        transaction.status_history.push(entry);

        sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET xdr_received = $2, status_history = $3
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(&transaction.xdr_received)
        .bind(Json(&transaction.status_history))
        .execute(&mut *db_tx)
        .await?;
        db_tx.commit().await?;
        Ok(())
    }

    /// Re-leases a row: updates only if the existing lock is expired,
    /// the row is unsynced and still in an open status. Moves status to
    /// `PROCESSING` as part of the same statement.
    pub async fn lock(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        id: TransactionId,
        current_ledger: u32,
        next_ledger_lock: u32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET status = 'PROCESSING', locked_until_ledger_number = $2
            WHERE id = $1
              AND synced_at IS NULL
              AND status IN ('PENDING', 'PROCESSING')
              AND (locked_until_ledger_number IS NULL OR locked_until_ledger_number < $3)
            "#,
        )
        .bind(id.0)
        .bind(next_ledger_lock as i64)
        .bind(current_ledger as i64)
        .execute(&mut **db_tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn unlock(&self, id: TransactionId) -> Result<(), StoreError> {
        sqlx::query("UPDATE submitter_transactions SET locked_until_ledger_number = NULL WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recycles a transaction for another attempt: only while
    /// it is still open and unsynced, clearing the lock and any
    /// previous-attempt envelope data.
    pub async fn prepare_for_reprocessing(&self, id: TransactionId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET locked_until_ledger_number = NULL, tx_hash = NULL,
                xdr_sent = NULL, xdr_received = NULL
            WHERE id = $1 AND synced_at IS NULL AND status IN ('PENDING', 'PROCESSING')
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() != 1 {
            return Err(StoreError::InvalidState(
                "transaction is not open for reprocessing".into(),
            ));
        }
        Ok(())
    }

    pub async fn update_synced_transactions(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        ids: &[TransactionId],
    ) -> Result<(), StoreError> {
        let raw_ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let result = sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET synced_at = now()
            WHERE id = ANY($1) AND status IN ('SUCCESS', 'ERROR')
            "#,
        )
        .bind(&raw_ids)
        .execute(&mut **db_tx)
        .await?;
        if result.rows_affected() as usize != ids.len() {
            return Err(StoreError::UnexpectedRowCount {
                expected: ids.len(),
                actual: result.rows_affected() as usize,
            });
        }
        Ok(())
    }

    async fn write_status_and_history(
        &self,
        db_tx: &mut Transaction<'_, Postgres>,
        transaction: &tss_types::Transaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE submitter_transactions
            SET status = $2, status_history = $3, completed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(transaction.id.0)
        .bind(status_to_str(transaction.status))
        .bind(Json(&transaction.status_history))
        .bind(transaction.completed_at)
        .execute(&mut **db_tx)
        .await?;
        Ok(())
    }
}

/// Selects unleased, open transactions in priority order, row-locking each
/// so a concurrent loader run skips them instead of blocking. Shared with
/// the bundle loader, which pairs each row with a channel account inside
/// the same database transaction.
pub(crate) async fn raw_load_lockable_in_tx(
    db_tx: &mut Transaction<'_, Postgres>,
    current_ledger: u32,
    limit: i64,
) -> Result<Vec<tss_types::Transaction>, StoreError> {
    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT * FROM submitter_transactions
        WHERE status IN ('PENDING', 'PROCESSING')
          AND synced_at IS NULL
          AND (locked_until_ledger_number IS NULL OR locked_until_ledger_number < $1)
        ORDER BY created_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(current_ledger as i64)
    .bind(limit)
    .fetch_all(&mut **db_tx)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Stamps the lock acquired by the bundle loader onto a row already held
/// under `FOR UPDATE` in the caller's transaction.
pub(crate) async fn raw_lock_transaction_in_tx(
    db_tx: &mut Transaction<'_, Postgres>,
    id: TransactionId,
    next_ledger_lock: u32,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE submitter_transactions
        SET status = 'PROCESSING', locked_until_ledger_number = $2
        WHERE id = $1
        "#,
    )
    .bind(id.0)
    .bind(next_ledger_lock as i64)
    .execute(&mut **db_tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // See `tss-store/tests/transaction_store.rs` for integration coverage
    // against a live Postgres instance.
}
