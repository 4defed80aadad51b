use crate::envelope::Envelope;
use crate::error::HandlerError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tss_chain::client::BlockchainClient;
use tss_events::Event;
use tss_types::Transaction;

/// Fee parameters a handler needs to build an envelope; threaded through
/// rather than read from ambient config so handlers stay pure functions of
/// their inputs. `max_base_fee` and the protocol minimum are manager-level
/// settings, not something a handler should reach for on its own.
#[derive(Debug, Clone, Copy)]
pub struct FeeParameters {
    pub max_base_fee: i64,
    pub protocol_min_base_fee: i64,
}

/// Polymorphic strategy over the transaction-type variant set.
/// One implementation per `TransactionType`; the worker dispatches through
/// `HandlerFactory` rather than matching on the type itself.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    /// Builds the unsigned envelope for one submission attempt. May call
    /// out to the blockchain client (simulation) when the variant requires
    /// it; the channel account's sequence number and the distribution
    /// account identity are supplied by the caller, not resolved here.
    async fn build_inner_transaction(
        &self,
        chain: &dyn BlockchainClient,
        transaction: &Transaction,
        channel_account_public_key: &str,
        channel_sequence_number: i64,
        distribution_account: &str,
        locked_until_ledger_number: u32,
        fees: FeeParameters,
    ) -> Result<Envelope, HandlerError>;

    fn build_success_event(&self, transaction: &Transaction) -> Event;

    fn build_failure_event(&self, transaction: &Transaction, message: &str) -> Event;

    /// `true` when a retried attempt must go through `build_inner_transaction`
    /// again rather than resubmit the previously built envelope: some
    /// variants depend on simulation against current on-chain state.
    fn requires_rebuild_on_retry(&self) -> bool;

    /// Structured fields merged into the worker's tracing spans for this
    /// transaction.
    fn context_logger_fields(&self, transaction: &Transaction) -> BTreeMap<String, String>;
}
