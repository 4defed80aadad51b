use crate::client::BlockchainClient;
use crate::error::ChainError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Object-safe view onto "what is the current ledger", so callers that
/// hold a boxed/dyn chain client don't need to carry `LedgerTracker`'s own
/// client type parameter.
#[async_trait]
pub trait CurrentLedger: Send + Sync {
    async fn current_ledger(&self) -> Result<u32, ChainError>;
}

/// Caches the current ledger sequence number from the blockchain so every
/// caller isn't making its own network round trip. The reading is
/// monotonically non-decreasing even across refresh failures or a network
/// call that returns a stale (smaller) value.
pub struct LedgerTracker<C> {
    client: Arc<C>,
    ttl: Duration,
    high_water_mark: AtomicU32,
    refresh: Mutex<Option<Instant>>,
}

impl<C: BlockchainClient> LedgerTracker<C> {
    pub fn new(client: Arc<C>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            high_water_mark: AtomicU32::new(0),
            refresh: Mutex::new(None),
        }
    }

    /// Returns the cached ledger if still within TTL, otherwise refreshes.
    /// A failed refresh propagates as a retriable `ChainError`; it never
    /// resets the cached value.
    pub async fn current_ledger(&self) -> Result<u32, ChainError> {
        let mut last_refresh = self.refresh.lock().await;
        let needs_refresh = match *last_refresh {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        };

        if needs_refresh {
            let fetched = self.client.latest_ledger().await?;
            self.observe(fetched);
            *last_refresh = Some(Instant::now());
        }

        Ok(self.high_water_mark.load(Ordering::SeqCst))
    }

    /// Folds a freshly observed ledger number into the monotonic reading.
    fn observe(&self, observed: u32) {
        self.high_water_mark.fetch_max(observed, Ordering::SeqCst);
    }
}

#[async_trait]
impl<C: BlockchainClient> CurrentLedger for LedgerTracker<C> {
    async fn current_ledger(&self) -> Result<u32, ChainError> {
        LedgerTracker::current_ledger(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AccountDetail, SimulationResult, SubmitResult, TransactionDetail};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32 as TestCounter;

    struct FakeClient {
        ledgers: TestCounter,
        sequence: Vec<u32>,
    }

    #[async_trait]
    impl BlockchainClient for FakeClient {
        async fn account_detail(&self, _public_key: &str) -> Result<AccountDetail, ChainError> {
            unimplemented!()
        }

        async fn simulate_contract_invocation(
            &self,
            _envelope_b64: &str,
        ) -> Result<SimulationResult, ChainError> {
            unimplemented!()
        }

        async fn submit_transaction(&self, _envelope_b64: &str) -> Result<SubmitResult, ChainError> {
            unimplemented!()
        }

        async fn transaction_detail(&self, _hash: &str) -> Result<TransactionDetail, ChainError> {
            unimplemented!()
        }

        async fn latest_ledger(&self) -> Result<u32, ChainError> {
            let idx = self.ledgers.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.sequence[idx.min(self.sequence.len() - 1)])
        }
    }

    #[tokio::test]
    async fn reading_is_monotonic_even_if_network_returns_a_smaller_value() {
        let client = Arc::new(FakeClient {
            ledgers: TestCounter::new(0),
            sequence: vec![100, 50, 200],
        });
        let tracker = LedgerTracker::new(client, Duration::from_millis(0));

        assert_eq!(tracker.current_ledger().await.unwrap(), 100);
        assert_eq!(tracker.current_ledger().await.unwrap(), 100);
        assert_eq!(tracker.current_ledger().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn caches_within_ttl() {
        let client = Arc::new(FakeClient {
            ledgers: TestCounter::new(0),
            sequence: vec![10, 999],
        });
        let tracker = LedgerTracker::new(client, Duration::from_secs(60));

        assert_eq!(tracker.current_ledger().await.unwrap(), 10);
        // Second call within TTL must not advance the fake client's cursor.
        assert_eq!(tracker.current_ledger().await.unwrap(), 10);
    }
}
