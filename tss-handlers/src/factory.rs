use crate::handler::TransactionHandler;
use crate::payment::PaymentHandler;
use crate::sponsored::SponsoredHandler;
use crate::wallet_creation::WalletCreationHandler;
use std::sync::Arc;
use tss_types::TransactionType;

/// Resolves the handler for a transaction's type. A thin dispatch layer so
/// the worker never matches on `TransactionType` itself.
pub struct HandlerFactory {
    payment: Arc<dyn TransactionHandler>,
    wallet_creation: Arc<dyn TransactionHandler>,
    sponsored: Arc<dyn TransactionHandler>,
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self {
            payment: Arc::new(PaymentHandler),
            wallet_creation: Arc::new(WalletCreationHandler),
            sponsored: Arc::new(SponsoredHandler),
        }
    }
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_for(&self, transaction_type: TransactionType) -> Arc<dyn TransactionHandler> {
        match transaction_type {
            TransactionType::Payment => self.payment.clone(),
            TransactionType::WalletCreation => self.wallet_creation.clone(),
            TransactionType::Sponsored => self.sponsored.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_matching_handler_requires_rebuild_flag() {
        let factory = HandlerFactory::new();
        assert!(!factory
            .handler_for(TransactionType::Payment)
            .requires_rebuild_on_retry());
        assert!(factory
            .handler_for(TransactionType::WalletCreation)
            .requires_rebuild_on_retry());
        assert!(!factory
            .handler_for(TransactionType::Sponsored)
            .requires_rebuild_on_retry());
    }
}
