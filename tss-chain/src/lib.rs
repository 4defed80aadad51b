//! The core's boundary with the outside blockchain: a typed client
//! contract, a monotonic ledger-sequence cache, and the signing capability.

pub mod client;
pub mod error;
pub mod ledger_tracker;
pub mod signer;

pub use client::{
    AccountDetail, BlockchainClient, HttpBlockchainClient, SimulationResult, SubmitResult,
    TransactionDetail,
};
pub use error::ChainError;
pub use ledger_tracker::{CurrentLedger, LedgerTracker};
pub use signer::{KeySource, PassphraseKeySource, ResolvedKey, Signer};

/// A `Signer` over a boxed key source, the shape most callers outside this
/// crate want so they don't have to carry the `K: KeySource` parameter.
pub type DynSigner = Signer<Box<dyn KeySource>>;
