//! Domain types shared by every crate in the transaction submission core:
//! the transaction queue row, its variant payloads, the channel-account
//! lease, and the ephemeral bundle the loader hands to a worker.

pub mod bundle;
pub mod channel_account;
pub mod error;
pub mod ids;
pub mod memo;
pub mod payload;
pub mod status;
pub mod strkey;
pub mod transaction;

pub use bundle::TransactionBundle;
pub use channel_account::ChannelAccount;
pub use error::ValidationError;
pub use ids::{ExternalId, TenantId, TransactionId};
pub use memo::Memo;
pub use payload::{
    PaymentPayload, SponsoredPayload, TransactionPayload, TransactionType, WalletCreationPayload,
};
pub use status::{StatusHistoryEntry, TransactionStatus};
pub use transaction::Transaction;
