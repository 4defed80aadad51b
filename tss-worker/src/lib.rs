//! Drives one leased transaction bundle to a terminal status or a clean
//! release, and governs how many bundles run concurrently.

pub mod error;
pub mod limiter;
pub mod store_traits;
pub mod worker;

pub use error::WorkerError;
pub use limiter::{ProcessingLimiter, SubmissionOutcome};
pub use store_traits::{WorkerChannelAccountStore, WorkerTransactionStore};
pub use worker::{spawn_and_run_bundle, WorkerDeps, WorkerOutcome};
