//! Postgres-backed persistence for the transaction submission core: the
//! channel-account lease pool, the transaction queue itself, and the
//! bundle loader that pairs the two under row-level locks.

pub mod bundle_loader;
pub mod channel_account_store;
pub mod error;
pub mod pool;
pub mod transaction_store;

pub use bundle_loader::BundleLoader;
pub use channel_account_store::{ChannelAccountStore, PoolStats};
pub use error::StoreError;
pub use pool::connect;
pub use transaction_store::TransactionStore;
