use crate::limiter::{ProcessingLimiter, SubmissionOutcome};
use crate::store_traits::{WorkerChannelAccountStore, WorkerTransactionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tss_chain::client::BlockchainClient;
use tss_chain::{ChainError, CurrentLedger, DynSigner};
use tss_events::EventProducer;
use tss_handlers::{FeeParameters, HandlerFactory};
use tss_types::TransactionBundle;

/// Bounded backoff between `NeedsReconciliation` polls of `transaction_detail`.
const RECONCILIATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Reached a terminal status (SUCCESS/ERROR) and wrote it.
    Done,
    /// Cancelled, reprocessed, or gave up within budget without writing a
    /// terminal status; the lease was cleanly released.
    Released,
    /// The task panicked; crash-reported and released.
    Escalated,
}

/// Everything one worker needs, shared across every bundle it is asked to
/// drive. Cheap to clone: every field is an `Arc`.
pub struct WorkerDeps {
    pub chain: Arc<dyn BlockchainClient>,
    pub ledger: Arc<dyn CurrentLedger>,
    pub signer: Arc<DynSigner>,
    pub transaction_store: Arc<dyn WorkerTransactionStore>,
    pub channel_account_store: Arc<dyn WorkerChannelAccountStore>,
    pub handlers: Arc<HandlerFactory>,
    pub events: Arc<dyn EventProducer>,
    pub limiter: Arc<ProcessingLimiter>,
    pub fees: FeeParameters,
    pub max_reconciliation_attempts: u32,
}

/// Spawns a fresh task for one bundle and handles the panic case at the boundary: a panicked task never
/// reaches `drive`'s own cleanup, so this is the only place that can
/// release its leases afterward.
pub async fn spawn_and_run_bundle(
    bundle: TransactionBundle,
    deps: Arc<WorkerDeps>,
    cancellation: CancellationToken,
) -> WorkerOutcome {
    let transaction_id = bundle.transaction.id;
    let channel_public_key = bundle.channel_account.public_key.clone();
    let release_deps = deps.clone();

    let handle = tokio::spawn(drive(bundle, deps, cancellation));
    match handle.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!(
                transaction_id = %transaction_id,
                error = %join_error,
                "worker task panicked, releasing lease and escalating"
            );
            let _ = release_deps.transaction_store.unlock(transaction_id).await;
            let _ = release_deps
                .channel_account_store
                .release(&channel_public_key)
                .await;
            WorkerOutcome::Escalated
        }
    }
}

/// The state machine proper, run to completion for one bundle. Never
/// panics intentionally; `spawn_and_run_bundle` is the backstop if it does
/// anyway.
async fn drive(
    bundle: TransactionBundle,
    deps: Arc<WorkerDeps>,
    cancellation: CancellationToken,
) -> WorkerOutcome {
    let transaction_id = bundle.transaction.id;
    let tenant_id = bundle.transaction.tenant_id.clone();
    let channel_public_key = bundle.channel_account.public_key.clone();
    let channel_encrypted_key = bundle.channel_account.encrypted_private_key.clone();
    let handler = deps.handlers.handler_for(bundle.transaction.transaction_type());

    let release = || async {
        let _ = deps.transaction_store.unlock(transaction_id).await;
        let _ = deps.channel_account_store.release(&channel_public_key).await;
    };

    if cancellation.is_cancelled() {
        release().await;
        return WorkerOutcome::Released;
    }

    // Ledger-bound safety gate before doing any work at all:
    // a lease whose ledger bound has already passed must not be used.
    match deps.ledger.current_ledger().await {
        Ok(current) if current > bundle.locked_until_ledger_number => {
            warn!(transaction_id = %transaction_id, "lease expired before build, releasing");
            release().await;
            return WorkerOutcome::Released;
        }
        Err(err) => {
            warn!(transaction_id = %transaction_id, error = %err, "could not confirm ledger before build");
        }
        _ => {}
    }

    // Built: resolve the channel account's sequence number and build the
    // envelope via the type-specific handler.
    let account_detail = tokio::select! {
        _ = cancellation.cancelled() => { release().await; return WorkerOutcome::Released; }
        result = deps.chain.account_detail(&channel_public_key) => result,
    };
    let sequence_number = match account_detail {
        Ok(detail) => detail.sequence_number + 1,
        Err(err) => {
            warn!(transaction_id = %transaction_id, error = %err, "failed to fetch channel account sequence");
            release().await;
            return WorkerOutcome::Released;
        }
    };

    let distribution = tokio::select! {
        _ = cancellation.cancelled() => { release().await; return WorkerOutcome::Released; }
        result = deps.signer.distribution_public_key(&tenant_id) => result,
    };
    let distribution_account = match distribution {
        Ok(public_key) => public_key,
        Err(err) => {
            error!(transaction_id = %transaction_id, error = %err, "failed to resolve distribution account");
            release().await;
            return WorkerOutcome::Released;
        }
    };

    let built = tokio::select! {
        _ = cancellation.cancelled() => { release().await; return WorkerOutcome::Released; }
        result = handler.build_inner_transaction(
            deps.chain.as_ref(),
            &bundle.transaction,
            &channel_public_key,
            sequence_number,
            &distribution_account,
            bundle.locked_until_ledger_number,
            deps.fees,
        ) => result,
    };

    let mut envelope = match built {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(transaction_id = %transaction_id, error = %err, "handler failed to build envelope");
            if err.is_retriable() {
                release().await;
            } else {
                write_terminal_error(&deps, &handler, &bundle.transaction, &err.to_string()).await;
                let _ = deps.channel_account_store.release(&channel_public_key).await;
            }
            return finish(&deps, err.is_retriable()).await;
        }
    };

    // Built -> Submitted: sign with both the channel account and the
    // distribution account, then hand off to the chain.
    let signing_bytes = match envelope.body.signing_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(transaction_id = %transaction_id, error = %err, "envelope body did not serialize for signing");
            release().await;
            return WorkerOutcome::Released;
        }
    };

    let channel_signature = deps
        .signer
        .sign_with_channel_account(&channel_encrypted_key, &channel_public_key, &signing_bytes)
        .await;
    let channel_signature = match channel_signature {
        Ok(sig) => sig,
        Err(err) => {
            error!(transaction_id = %transaction_id, error = %err, "channel account signing failed");
            release().await;
            return WorkerOutcome::Released;
        }
    };
    envelope.push_signature(&channel_public_key, &channel_signature);

    let (distribution_signature, _) = match deps
        .signer
        .sign_with_distribution_account(&tenant_id, &signing_bytes)
        .await
    {
        Ok(pair) => pair,
        Err(err) => {
            error!(transaction_id = %transaction_id, error = %err, "distribution account signing failed");
            release().await;
            return WorkerOutcome::Released;
        }
    };
    envelope.push_signature(&distribution_account, &distribution_signature);

    let envelope_b64 = match envelope.to_base64() {
        Ok(b64) => b64,
        Err(err) => {
            error!(transaction_id = %transaction_id, error = %err, "signed envelope did not encode");
            release().await;
            return WorkerOutcome::Released;
        }
    };

    if deps
        .transaction_store
        .update_stellar_transaction_hash_xdr_sent_and_distribution_account(
            transaction_id,
            &placeholder_hash(&envelope_b64),
            &envelope_b64,
            &distribution_account,
        )
        .await
        .is_err()
    {
        error!(transaction_id = %transaction_id, "failed to record submitted envelope");
        release().await;
        return WorkerOutcome::Released;
    }

    // Submitted: the actual network call.
    let submit_result = tokio::select! {
        _ = cancellation.cancelled() => { release().await; return WorkerOutcome::Released; }
        result = deps.chain.submit_transaction(&envelope_b64) => result,
    };

    match submit_result {
        Ok(result) => {
            deps.limiter.report_submission_result(SubmissionOutcome::Success);
            finish_success(
                &deps,
                &handler,
                &bundle.transaction,
                &result.result_xdr,
                &result.hash,
                &channel_public_key,
            )
            .await
        }
        Err(err) if err.is_terminal_protocol_rejection() => {
            deps.limiter.report_submission_result(SubmissionOutcome::Success);
            handle_protocol_rejection(&deps, &handler, &bundle, &err).await
        }
        Err(err) if err.is_retriable() => {
            deps.limiter.report_submission_result(SubmissionOutcome::Saturated);
            reconcile(&deps, &handler, &bundle, &cancellation).await
        }
        Err(err) => {
            write_terminal_error(&deps, &handler, &bundle.transaction, &err.to_string()).await;
            let _ = deps.channel_account_store.release(&channel_public_key).await;
            finish(&deps, false).await
        }
    }
}

/// Placeholder hash derivation until a real XDR hashing routine is wired
/// in: the network's transaction hash is `sha256(signature-payload)`, and
/// the envelope already carries exactly that payload.
fn placeholder_hash(envelope_b64: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(envelope_b64.as_bytes()))
}

/// Submission landed on-chain but the result was a protocol failure:
/// terminal on the transaction; the channel account is released
/// unless the rejection means its cached sequence is stale, in which case
/// it is only unlocked so the next lease re-reads it.
async fn handle_protocol_rejection(
    deps: &Arc<WorkerDeps>,
    handler: &Arc<dyn tss_handlers::TransactionHandler>,
    bundle: &TransactionBundle,
    err: &ChainError,
) -> WorkerOutcome {
    let _ = deps
        .transaction_store
        .update_stellar_transaction_xdr_received(bundle.transaction.id, "")
        .await;
    write_terminal_error(deps, handler, &bundle.transaction, &err.to_string()).await;

    if err.is_stale_sequence() {
        let _ = deps.transaction_store.unlock(bundle.transaction.id).await;
    } else {
        let _ = deps
            .channel_account_store
            .release(&bundle.channel_account.public_key)
            .await;
    }
    WorkerOutcome::Done
}

/// `Submitted -> NeedsReconciliation`: the network call itself failed, so
/// the worker polls `transaction_detail` to discover whether the
/// transaction actually landed before giving up.
async fn reconcile(
    deps: &Arc<WorkerDeps>,
    handler: &Arc<dyn tss_handlers::TransactionHandler>,
    bundle: &TransactionBundle,
    cancellation: &CancellationToken,
) -> WorkerOutcome {
    // Compute a synthetic hash consistent with the one already persisted
    // by update_stellar_transaction_hash_xdr_sent_and_distribution_account.
    let transaction = match deps.transaction_store.get(bundle.transaction.id).await {
        Ok(t) => t,
        Err(_) => return WorkerOutcome::Released,
    };
    let Some(hash) = transaction.tx_hash.clone() else {
        return WorkerOutcome::Released;
    };

    for attempt in 0..deps.max_reconciliation_attempts {
        if cancellation.is_cancelled() {
            let _ = deps.transaction_store.unlock(bundle.transaction.id).await;
            let _ = deps
                .channel_account_store
                .release(&bundle.channel_account.public_key)
                .await;
            return WorkerOutcome::Released;
        }

        match deps.chain.transaction_detail(&hash).await {
            Ok(detail) if detail.successful => {
                return finish_success(
                    deps,
                    handler,
                    &transaction,
                    &detail.result_xdr,
                    &hash,
                    &bundle.channel_account.public_key,
                )
                .await;
            }
            Ok(detail) => {
                let _ = deps
                    .transaction_store
                    .update_stellar_transaction_xdr_received(bundle.transaction.id, &detail.result_xdr)
                    .await;
                write_terminal_error(deps, handler, &transaction, "submitted transaction failed on-chain").await;
                return WorkerOutcome::Done;
            }
            Err(ChainError::NotFound) => {
                let ledger = deps.ledger.current_ledger().await.unwrap_or(0);
                if ledger > bundle.locked_until_ledger_number {
                    info!(transaction_id = %bundle.transaction.id, "lease window closed with no landed transaction, reprocessing");
                    let _ = deps
                        .transaction_store
                        .prepare_for_reprocessing(bundle.transaction.id)
                        .await;
                    let _ = deps
                        .channel_account_store
                        .release(&bundle.channel_account.public_key)
                        .await;
                    return WorkerOutcome::Released;
                }
            }
            Err(_) => {}
        }

        let backoff = RECONCILIATION_POLL_INTERVAL * (attempt + 1).min(5);
        tokio::select! {
            _ = cancellation.cancelled() => {
                let _ = deps.transaction_store.unlock(bundle.transaction.id).await;
                let _ = deps.channel_account_store.release(&bundle.channel_account.public_key).await;
                return WorkerOutcome::Released;
            }
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    warn!(transaction_id = %bundle.transaction.id, "exhausted reconciliation attempts, releasing for retry");
    let _ = deps.transaction_store.unlock(bundle.transaction.id).await;
    let _ = deps
        .channel_account_store
        .release(&bundle.channel_account.public_key)
        .await;
    WorkerOutcome::Released
}

async fn finish_success(
    deps: &Arc<WorkerDeps>,
    handler: &Arc<dyn tss_handlers::TransactionHandler>,
    transaction: &tss_types::Transaction,
    result_xdr: &str,
    hash: &str,
    channel_account_public_key: &str,
) -> WorkerOutcome {
    let _ = deps
        .transaction_store
        .update_stellar_transaction_xdr_received(transaction.id, result_xdr)
        .await;
    if deps
        .transaction_store
        .update_status_to_success(transaction.id, "landed on-chain")
        .await
        .is_err()
    {
        return WorkerOutcome::Released;
    }
    let _ = deps.channel_account_store.release(channel_account_public_key).await;
    let mut completed = transaction.clone();
    completed.tx_hash = Some(hash.to_string());
    let event = handler.build_success_event(&completed);
    if let Err(err) = deps.events.publish(event).await {
        error!(transaction_id = %transaction.id, error = %err, "failed to publish success event");
    }
    WorkerOutcome::Done
}

async fn write_terminal_error(
    deps: &Arc<WorkerDeps>,
    handler: &Arc<dyn tss_handlers::TransactionHandler>,
    transaction: &tss_types::Transaction,
    message: &str,
) {
    if deps
        .transaction_store
        .update_status_to_error(transaction.id, message)
        .await
        .is_err()
    {
        return;
    }
    let event = handler.build_failure_event(transaction, message);
    if let Err(err) = deps.events.publish(event).await {
        error!(transaction_id = %transaction.id, error = %err, "failed to publish failure event");
    }
}

async fn finish(deps: &Arc<WorkerDeps>, retriable: bool) -> WorkerOutcome {
    if retriable {
        WorkerOutcome::Released
    } else {
        let _ = deps; // terminal status already written by the caller
        WorkerOutcome::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tss_chain::client::{AccountDetail, SimulationResult, SubmitResult, TransactionDetail};
    use tss_chain::{KeySource, PassphraseKeySource, Signer};
    use tss_events::{Event, EventProducerError};
    use tss_store::StoreError;
    use tss_types::{ChannelAccount, ExternalId, PaymentPayload, TenantId, TransactionId, TransactionPayload};

    #[test]
    fn placeholder_hash_is_stable_for_the_same_input() {
        assert_eq!(placeholder_hash("abc"), placeholder_hash("abc"));
        assert_eq!(placeholder_hash("abc").len(), 64);
    }

    struct FakeBlockchainClient {
        account_detail: Mutex<Option<Result<AccountDetail, ChainError>>>,
        submit_results: Mutex<VecDeque<Result<SubmitResult, ChainError>>>,
        transaction_detail_results: Mutex<VecDeque<Result<TransactionDetail, ChainError>>>,
    }

    impl FakeBlockchainClient {
        fn new() -> Self {
            Self {
                account_detail: Mutex::new(Some(Ok(AccountDetail { sequence_number: 100 }))),
                submit_results: Mutex::new(VecDeque::new()),
                transaction_detail_results: Mutex::new(VecDeque::new()),
            }
        }

        fn with_submit_results(results: Vec<Result<SubmitResult, ChainError>>) -> Self {
            let client = Self::new();
            *client.submit_results.lock().unwrap() = results.into_iter().collect();
            client
        }
    }

    #[async_trait]
    impl BlockchainClient for FakeBlockchainClient {
        async fn account_detail(&self, _public_key: &str) -> Result<AccountDetail, ChainError> {
            self.account_detail
                .lock()
                .unwrap()
                .take()
                .expect("account_detail called more times than configured")
        }

        async fn simulate_contract_invocation(
            &self,
            _envelope_b64: &str,
        ) -> Result<SimulationResult, ChainError> {
            unreachable!("payment handler tests never hit a contract destination")
        }

        async fn submit_transaction(&self, _envelope_b64: &str) -> Result<SubmitResult, ChainError> {
            self.submit_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("submit_transaction called more times than configured")
        }

        async fn transaction_detail(&self, _hash: &str) -> Result<TransactionDetail, ChainError> {
            self.transaction_detail_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("transaction_detail called more times than configured")
        }

        async fn latest_ledger(&self) -> Result<u32, ChainError> {
            Ok(0)
        }
    }

    /// Returns `initial` on the first call (the pre-build lease gate) and
    /// `after_first` on every call after, so a test can let the build phase
    /// through and then simulate the lease window closing partway into
    /// reconciliation.
    struct FakeLedger {
        calls: AtomicU32,
        initial: u32,
        after_first: u32,
    }

    impl FakeLedger {
        fn fixed(ledger: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                initial: ledger,
                after_first: ledger,
            }
        }

        fn expiring_after_first_call(initial: u32, after_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                initial,
                after_first,
            }
        }
    }

    #[async_trait]
    impl CurrentLedger for FakeLedger {
        async fn current_ledger(&self) -> Result<u32, ChainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if call == 0 { self.initial } else { self.after_first })
        }
    }

    #[derive(Default)]
    struct FakeTransactionStore {
        calls: Mutex<Vec<String>>,
        get_result: Mutex<Option<tss_types::Transaction>>,
    }

    impl FakeTransactionStore {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn was_called(&self, name: &str) -> bool {
            self.calls().iter().any(|c| c == name)
        }
    }

    #[async_trait]
    impl WorkerTransactionStore for FakeTransactionStore {
        async fn get(&self, id: TransactionId) -> Result<tss_types::Transaction, StoreError> {
            self.calls.lock().unwrap().push("get".into());
            self.get_result
                .lock()
                .unwrap()
                .clone()
                .ok_or(StoreError::NotFound)
                .map(|mut t| {
                    t.id = id;
                    t
                })
        }

        async fn unlock(&self, _id: TransactionId) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("unlock".into());
            Ok(())
        }

        async fn prepare_for_reprocessing(&self, _id: TransactionId) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("prepare_for_reprocessing".into());
            Ok(())
        }

        async fn update_stellar_transaction_hash_xdr_sent_and_distribution_account(
            &self,
            _id: TransactionId,
            _tx_hash: &str,
            _xdr_sent: &str,
            _distribution_account: &str,
        ) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("update_hash_xdr_sent".into());
            Ok(())
        }

        async fn update_stellar_transaction_xdr_received(
            &self,
            _id: TransactionId,
            _xdr_received: &str,
        ) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("update_xdr_received".into());
            Ok(())
        }

        async fn update_status_to_success(&self, _id: TransactionId, _message: &str) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("update_status_to_success".into());
            Ok(())
        }

        async fn update_status_to_error(&self, _id: TransactionId, _message: &str) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("update_status_to_error".into());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeChannelAccountStore {
        calls: Mutex<Vec<String>>,
    }

    impl FakeChannelAccountStore {
        fn was_released(&self) -> bool {
            self.calls.lock().unwrap().iter().any(|c| c == "release")
        }
    }

    #[async_trait]
    impl WorkerChannelAccountStore for FakeChannelAccountStore {
        async fn release(&self, _public_key: &str) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push("release".into());
            Ok(())
        }
    }

    struct RecordingEventProducer {
        published: Mutex<Vec<Event>>,
    }

    impl RecordingEventProducer {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EventProducer for RecordingEventProducer {
        async fn publish(&self, event: Event) -> Result<(), EventProducerError> {
            self.published.lock().unwrap().push(event);
            Ok(())
        }
    }

    const TEST_PASSPHRASE: &str = "correct horse battery staple";

    /// Builds a real `DynSigner` plus a channel account whose encrypted key
    /// and public key are consistent with each other, so `drive`'s real
    /// signing calls succeed without needing a mocked signer.
    async fn test_signer_and_channel_account() -> (Arc<DynSigner>, ChannelAccount) {
        let key_maker = PassphraseKeySource::new(TEST_PASSPHRASE, String::new());
        let distribution_seed_encrypted = key_maker.encrypt_seed(&[1u8; 32]).unwrap();
        let channel_seed_encrypted = key_maker.encrypt_seed(&[2u8; 32]).unwrap();
        let channel_public_key = key_maker
            .channel_key(&channel_seed_encrypted)
            .await
            .unwrap()
            .public_key;

        let key_source: Box<dyn KeySource> =
            Box::new(PassphraseKeySource::new(TEST_PASSPHRASE, distribution_seed_encrypted));
        let signer = Arc::new(Signer::new(key_source, "Test Network ; Example"));

        let now = chrono::Utc::now();
        let channel_account = ChannelAccount {
            public_key: channel_public_key,
            encrypted_private_key: channel_seed_encrypted,
            locked_at: Some(now),
            locked_until_ledger_number: Some(10),
            created_at: now,
            updated_at: now,
        };
        (signer, channel_account)
    }

    fn sample_bundle(channel_account: ChannelAccount) -> TransactionBundle {
        let payload = TransactionPayload::Payment(PaymentPayload {
            asset_code: "xlm".into(),
            asset_issuer: None,
            amount: Decimal::from_str("1.5").unwrap(),
            destination: tss_types::strkey::encode_ed25519_public_key(&[9u8; 32]),
            memo: None,
        });
        let transaction = tss_types::Transaction::new(
            ExternalId::new("ext-1").unwrap(),
            TenantId::new("t1").unwrap(),
            payload,
        )
        .unwrap();
        TransactionBundle {
            transaction,
            channel_account,
            locked_until_ledger_number: 10,
        }
    }

    fn test_deps(
        chain: FakeBlockchainClient,
        ledger: FakeLedger,
        signer: Arc<DynSigner>,
        transaction_store: Arc<FakeTransactionStore>,
        channel_account_store: Arc<FakeChannelAccountStore>,
        events: Arc<RecordingEventProducer>,
    ) -> Arc<WorkerDeps> {
        Arc::new(WorkerDeps {
            chain: Arc::new(chain),
            ledger: Arc::new(ledger),
            signer,
            transaction_store,
            channel_account_store,
            handlers: Arc::new(HandlerFactory::default()),
            events,
            limiter: Arc::new(ProcessingLimiter::new(16)),
            fees: FeeParameters {
                max_base_fee: 1000,
                protocol_min_base_fee: 100,
            },
            max_reconciliation_attempts: 3,
        })
    }

    #[tokio::test]
    async fn successful_submit_finishes_done_and_writes_success() {
        let (signer, channel_account) = test_signer_and_channel_account().await;
        let bundle = sample_bundle(channel_account);
        let chain = FakeBlockchainClient::with_submit_results(vec![Ok(SubmitResult {
            hash: "a".repeat(64),
            result_xdr: "result".into(),
        })]);
        let transaction_store = Arc::new(FakeTransactionStore::default());
        let channel_account_store = Arc::new(FakeChannelAccountStore::default());
        let events = Arc::new(RecordingEventProducer::new());
        let deps = test_deps(
            chain,
            FakeLedger::fixed(5),
            signer,
            transaction_store.clone(),
            channel_account_store.clone(),
            events.clone(),
        );

        let outcome = drive(bundle, deps, CancellationToken::new()).await;

        assert_eq!(outcome, WorkerOutcome::Done);
        assert!(transaction_store.was_called("update_status_to_success"));
        assert!(channel_account_store.was_released());
        assert_eq!(events.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_sequence_protocol_rejection_unlocks_but_does_not_release_channel_account() {
        let (signer, channel_account) = test_signer_and_channel_account().await;
        let bundle = sample_bundle(channel_account);
        let chain = FakeBlockchainClient::with_submit_results(vec![Err(ChainError::Protocol {
            code: "tx_bad_seq".into(),
        })]);
        let transaction_store = Arc::new(FakeTransactionStore::default());
        let channel_account_store = Arc::new(FakeChannelAccountStore::default());
        let events = Arc::new(RecordingEventProducer::new());
        let deps = test_deps(
            chain,
            FakeLedger::fixed(5),
            signer,
            transaction_store.clone(),
            channel_account_store.clone(),
            events.clone(),
        );

        let outcome = drive(bundle, deps, CancellationToken::new()).await;

        assert_eq!(outcome, WorkerOutcome::Done);
        assert!(transaction_store.was_called("unlock"));
        assert!(transaction_store.was_called("update_status_to_error"));
        assert!(!channel_account_store.was_released());
    }

    #[tokio::test]
    async fn non_stale_protocol_rejection_releases_both_leases() {
        let (signer, channel_account) = test_signer_and_channel_account().await;
        let bundle = sample_bundle(channel_account);
        let chain = FakeBlockchainClient::with_submit_results(vec![Err(ChainError::Protocol {
            code: "tx_failed".into(),
        })]);
        let transaction_store = Arc::new(FakeTransactionStore::default());
        let channel_account_store = Arc::new(FakeChannelAccountStore::default());
        let events = Arc::new(RecordingEventProducer::new());
        let deps = test_deps(
            chain,
            FakeLedger::fixed(5),
            signer,
            transaction_store.clone(),
            channel_account_store.clone(),
            events.clone(),
        );

        let outcome = drive(bundle, deps, CancellationToken::new()).await;

        assert_eq!(outcome, WorkerOutcome::Done);
        assert!(!transaction_store.was_called("unlock"));
        assert!(channel_account_store.was_released());
    }

    #[tokio::test]
    async fn retriable_network_error_reconciles_and_reprocesses_once_lease_expires() {
        let (signer, channel_account) = test_signer_and_channel_account().await;
        let bundle = sample_bundle(channel_account);
        let chain = FakeBlockchainClient::with_submit_results(vec![Err(ChainError::Network(
            "connection reset".into(),
        ))]);
        *chain.transaction_detail_results.lock().unwrap() = VecDeque::from(vec![Err(ChainError::NotFound)]);

        let transaction_store = Arc::new(FakeTransactionStore::default());
        {
            let mut pending = transaction_store.get_result.lock().unwrap();
            let mut pending_tx = bundle.transaction.clone();
            pending_tx.tx_hash = Some("b".repeat(64));
            *pending = Some(pending_tx);
        }
        let channel_account_store = Arc::new(FakeChannelAccountStore::default());
        let events = Arc::new(RecordingEventProducer::new());
        // The lease window has already closed by the time reconciliation
        // checks the ledger, so the first `NotFound` reprocesses immediately.
        let deps = test_deps(
            chain,
            FakeLedger::expiring_after_first_call(5, 1000),
            signer,
            transaction_store.clone(),
            channel_account_store.clone(),
            events.clone(),
        );

        let outcome = drive(bundle, deps, CancellationToken::new()).await;

        assert_eq!(outcome, WorkerOutcome::Released);
        assert!(transaction_store.was_called("prepare_for_reprocessing"));
        assert!(channel_account_store.was_released());
    }

    #[tokio::test]
    async fn panicking_task_is_escalated_and_releases_both_leases() {
        let (signer, channel_account) = test_signer_and_channel_account().await;
        let bundle = sample_bundle(channel_account);
        // No results configured: `submit_transaction` panics on the first
        // (unexpected) call, standing in for a handler/driver bug.
        let chain = FakeBlockchainClient::new();
        let transaction_store = Arc::new(FakeTransactionStore::default());
        let channel_account_store = Arc::new(FakeChannelAccountStore::default());
        let events = Arc::new(RecordingEventProducer::new());
        let deps = test_deps(
            chain,
            FakeLedger::fixed(5),
            signer,
            transaction_store.clone(),
            channel_account_store.clone(),
            events.clone(),
        );

        let outcome = spawn_and_run_bundle(bundle, deps, CancellationToken::new()).await;

        assert_eq!(outcome, WorkerOutcome::Escalated);
        assert!(transaction_store.was_called("unlock"));
        assert!(channel_account_store.was_released());
    }
}
