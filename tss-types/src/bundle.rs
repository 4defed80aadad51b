use crate::channel_account::ChannelAccount;
use crate::transaction::Transaction;

/// Ephemeral in-memory result of the bundle loader: a transaction paired
/// with the channel account leased to process it, both locked to the same
/// ledger window.
#[derive(Debug, Clone)]
pub struct TransactionBundle {
    pub transaction: Transaction,
    pub channel_account: ChannelAccount,
    pub locked_until_ledger_number: u32,
}

impl TransactionBundle {
    pub fn lease_still_valid(&self, current_ledger: u32) -> bool {
        current_ledger < self.locked_until_ledger_number
    }
}
