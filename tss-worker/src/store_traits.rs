//! Narrow seams over the two stores `drive` touches, so the state machine
//! can be exercised against fakes instead of a live Postgres instance.
//! Each trait covers exactly the handful of operations the worker calls;
//! everything else `TransactionStore`/`ChannelAccountStore` expose (batch
//! loading, provisioning, the synchronizer's own queries) stays on the
//! concrete types.

use async_trait::async_trait;
use tss_store::{ChannelAccountStore, StoreError, TransactionStore};
use tss_types::{Transaction, TransactionId};

#[async_trait]
pub trait WorkerTransactionStore: Send + Sync {
    async fn get(&self, id: TransactionId) -> Result<Transaction, StoreError>;
    async fn unlock(&self, id: TransactionId) -> Result<(), StoreError>;
    async fn prepare_for_reprocessing(&self, id: TransactionId) -> Result<(), StoreError>;
    async fn update_stellar_transaction_hash_xdr_sent_and_distribution_account(
        &self,
        id: TransactionId,
        tx_hash: &str,
        xdr_sent: &str,
        distribution_account: &str,
    ) -> Result<(), StoreError>;
    async fn update_stellar_transaction_xdr_received(
        &self,
        id: TransactionId,
        xdr_received: &str,
    ) -> Result<(), StoreError>;
    async fn update_status_to_success(&self, id: TransactionId, message: &str) -> Result<(), StoreError>;
    async fn update_status_to_error(&self, id: TransactionId, message: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl WorkerTransactionStore for TransactionStore {
    async fn get(&self, id: TransactionId) -> Result<Transaction, StoreError> {
        TransactionStore::get(self, id).await
    }

    async fn unlock(&self, id: TransactionId) -> Result<(), StoreError> {
        TransactionStore::unlock(self, id).await
    }

    async fn prepare_for_reprocessing(&self, id: TransactionId) -> Result<(), StoreError> {
        TransactionStore::prepare_for_reprocessing(self, id).await
    }

    async fn update_stellar_transaction_hash_xdr_sent_and_distribution_account(
        &self,
        id: TransactionId,
        tx_hash: &str,
        xdr_sent: &str,
        distribution_account: &str,
    ) -> Result<(), StoreError> {
        TransactionStore::update_stellar_transaction_hash_xdr_sent_and_distribution_account(
            self,
            id,
            tx_hash,
            xdr_sent,
            distribution_account,
        )
        .await
    }

    async fn update_stellar_transaction_xdr_received(
        &self,
        id: TransactionId,
        xdr_received: &str,
    ) -> Result<(), StoreError> {
        TransactionStore::update_stellar_transaction_xdr_received(self, id, xdr_received).await
    }

    async fn update_status_to_success(&self, id: TransactionId, message: &str) -> Result<(), StoreError> {
        TransactionStore::update_status_to_success(self, id, message).await
    }

    async fn update_status_to_error(&self, id: TransactionId, message: &str) -> Result<(), StoreError> {
        TransactionStore::update_status_to_error(self, id, message).await
    }
}

#[async_trait]
pub trait WorkerChannelAccountStore: Send + Sync {
    async fn release(&self, public_key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl WorkerChannelAccountStore for ChannelAccountStore {
    async fn release(&self, public_key: &str) -> Result<(), StoreError> {
        ChannelAccountStore::release(self, public_key).await
    }
}
