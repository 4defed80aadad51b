use crate::error::StoreError;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tss_types::ChannelAccount;

/// Persistent pool of channel accounts. Every mutating
/// operation here either takes a row-level lock itself or is documented as
/// requiring one from its caller (`acquire_and_lock_one` via
/// `FOR UPDATE SKIP LOCKED`, matching the bundle loader's own locking).
pub struct ChannelAccountStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ChannelAccountRow {
    public_key: String,
    encrypted_private_key: String,
    locked_at: Option<chrono::DateTime<Utc>>,
    locked_until_ledger_number: Option<i64>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<ChannelAccountRow> for ChannelAccount {
    fn from(row: ChannelAccountRow) -> Self {
        ChannelAccount {
            public_key: row.public_key,
            encrypted_private_key: row.encrypted_private_key,
            locked_at: row.locked_at,
            locked_until_ledger_number: row.locked_until_ledger_number.map(|v| v as u32),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ChannelAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM channel_accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Seeding operation used by the `channel-accounts` provisioning CLI,
    /// out of the core's runtime path but consumed by it.
    pub async fn batch_insert_and_lock(
        &self,
        rows: &[(String, String)],
        next_ledger_lock: u32,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (public_key, encrypted_private_key) in rows {
            sqlx::query(
                r#"
                INSERT INTO channel_accounts
                    (public_key, encrypted_private_key, locked_at, locked_until_ledger_number)
                VALUES ($1, $2, now(), $3)
                ON CONFLICT (public_key) DO NOTHING
                "#,
            )
            .bind(public_key)
            .bind(encrypted_private_key)
            .bind(next_ledger_lock as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Atomically selects one free row — `locked_until_ledger_number IS
    /// NULL OR locked_until_ledger_number < current_ledger` — and locks it
    /// to `next_ledger_lock`. `FOR UPDATE SKIP LOCKED` makes this safe
    /// across concurrent callers without serializing them on each other.
    pub async fn acquire_and_lock_one(
        &self,
        current_ledger: u32,
        next_ledger_lock: u32,
    ) -> Result<ChannelAccount, StoreError> {
        let mut tx = self.pool.begin().await?;
        let account = acquire_and_lock_one_in_tx(&mut tx, current_ledger, next_ledger_lock).await?;
        tx.commit().await?;
        account.ok_or(StoreError::InsufficientChannelAccounts)
    }

    pub async fn release(&self, public_key: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE channel_accounts
            SET locked_at = NULL, locked_until_ledger_number = NULL, updated_at = now()
            WHERE public_key = $1
            "#,
        )
        .bind(public_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes a row if its lock still matches `ledger` — used when the
    /// account is being deprovisioned and must not be torn out from under
    /// an in-flight lease.
    pub async fn delete_if_locked_until(
        &self,
        public_key: &str,
        ledger: u32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM channel_accounts
            WHERE public_key = $1 AND locked_until_ledger_number = $2
            "#,
        )
        .bind(public_key)
        .bind(ledger as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Removes a row only if it is still free as of `current_ledger` — used
    /// by the provisioning CLI's `delete` action, which must never tear an
    /// account out from under a lease it can't see from outside the worker.
    pub async fn delete_if_free(&self, public_key: &str, current_ledger: u32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM channel_accounts
            WHERE public_key = $1
              AND (locked_until_ledger_number IS NULL OR locked_until_ledger_number < $2)
            "#,
        )
        .bind(public_key)
        .bind(current_ledger as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Up to `limit` currently free accounts, ordered deterministically —
    /// read-only, takes no lock. Used by the provisioning CLI, which isn't
    /// racing a worker pool for these rows.
    pub async fn list_free(&self, current_ledger: u32, limit: i64) -> Result<Vec<ChannelAccount>, StoreError> {
        let rows: Vec<ChannelAccountRow> = sqlx::query_as(
            r#"
            SELECT public_key, encrypted_private_key, locked_at, locked_until_ledger_number,
                   created_at, updated_at
            FROM channel_accounts
            WHERE locked_until_ledger_number IS NULL OR locked_until_ledger_number < $1
            ORDER BY public_key
            LIMIT $2
            "#,
        )
        .bind(current_ledger as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All stored accounts, for `verify` — a full scan is fine here, this
    /// is an operator-invoked CLI action, not a hot path.
    pub async fn list_all(&self) -> Result<Vec<ChannelAccount>, StoreError> {
        let rows: Vec<ChannelAccountRow> = sqlx::query_as(
            r#"
            SELECT public_key, encrypted_private_key, locked_at, locked_until_ledger_number,
                   created_at, updated_at
            FROM channel_accounts
            ORDER BY public_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn stats(&self, current_ledger: u32) -> Result<PoolStats, StoreError> {
        let total = self.count().await?;
        let (free,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM channel_accounts
            WHERE locked_until_ledger_number IS NULL OR locked_until_ledger_number < $1
            "#,
        )
        .bind(current_ledger as i64)
        .fetch_one(&self.pool)
        .await?;
        let (oldest_lock_expiry,): (Option<i64>,) = sqlx::query_as(
            r#"
            SELECT MIN(locked_until_ledger_number) FROM channel_accounts
            WHERE locked_until_ledger_number >= $1
            "#,
        )
        .bind(current_ledger as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(PoolStats {
            total,
            free,
            leased: total - free,
            oldest_lock_expiry: oldest_lock_expiry.map(|v| v as u32),
        })
    }
}

/// Snapshot of pool occupancy, read by the provisioning CLI's `view` action.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub total: i64,
    pub free: i64,
    pub leased: i64,
    pub oldest_lock_expiry: Option<u32>,
}

/// Shared with the bundle loader, which needs to acquire a channel account
/// inside the same database transaction as its transaction-row lock.
pub(crate) async fn acquire_and_lock_one_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    current_ledger: u32,
    next_ledger_lock: u32,
) -> Result<Option<ChannelAccount>, StoreError> {
    let row: Option<ChannelAccountRow> = sqlx::query_as(
        r#"
        SELECT public_key, encrypted_private_key, locked_at, locked_until_ledger_number,
               created_at, updated_at
        FROM channel_accounts
        WHERE locked_until_ledger_number IS NULL OR locked_until_ledger_number < $1
        ORDER BY public_key
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        "#,
    )
    .bind(current_ledger as i64)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE channel_accounts
        SET locked_at = now(), locked_until_ledger_number = $2, updated_at = now()
        WHERE public_key = $1
        "#,
    )
    .bind(&row.public_key)
    .bind(next_ledger_lock as i64)
    .execute(&mut **tx)
    .await?;

    let mut account: ChannelAccount = row.into();
    account.locked_until_ledger_number = Some(next_ledger_lock);
    Ok(Some(account))
}

#[cfg(test)]
mod tests {
    // Row-locking behaviour needs a live Postgres instance; see
    // `tss-store/tests/channel_account_store.rs` for the integration
    // coverage (skipped when `TEST_DATABASE_URL` is unset).
}
