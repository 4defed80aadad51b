use crate::envelope::{Envelope, EnvelopeBody, Operation};
use crate::error::HandlerError;
use crate::handler::{FeeParameters, TransactionHandler};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::str::FromStr;
use rust_decimal::Decimal;
use tss_chain::client::BlockchainClient;
use tss_events::Event;
use tss_types::TransactionPayload;

/// Preconditions window a built payment envelope is valid for:
/// `[now, now+300s]`.
const TIME_BOUNDS_WIDTH_SECONDS: i64 = 300;

pub struct PaymentHandler;

fn amount_to_stroops(amount: Decimal) -> i64 {
    let normalized = amount.normalize();
    let scale = normalized.scale();
    let stroops = normalized.mantissa() * 10i128.pow(7 - scale);
    stroops as i64
}

#[async_trait]
impl TransactionHandler for PaymentHandler {
    async fn build_inner_transaction(
        &self,
        _chain: &dyn BlockchainClient,
        transaction: &tss_types::Transaction,
        channel_account_public_key: &str,
        channel_sequence_number: i64,
        distribution_account: &str,
        locked_until_ledger_number: u32,
        _fees: FeeParameters,
    ) -> Result<Envelope, HandlerError> {
        let TransactionPayload::Payment(payload) = &transaction.payload else {
            return Err(HandlerError::EnvelopeNotParseable(
                "handler/payload type mismatch".into(),
            ));
        };

        let amount_stroops = amount_to_stroops(payload.amount);
        let now = Utc::now().timestamp();

        let operation = if payload.destination_is_contract() {
            if payload.memo.is_some() {
                return Err(HandlerError::Validation(
                    tss_types::ValidationError::MemoNotSupportedForContract,
                ));
            }
            Operation::PaymentToContract {
                source_account: distribution_account.to_string(),
                destination_contract: payload.destination.clone(),
                asset_code: payload.asset_code.clone(),
                asset_issuer: payload.asset_issuer.clone(),
                amount_stroops,
            }
        } else {
            Operation::Payment {
                source_account: distribution_account.to_string(),
                destination: payload.destination.clone(),
                asset_code: payload.asset_code.clone(),
                asset_issuer: payload.asset_issuer.clone(),
                amount_stroops,
                memo: payload.memo.clone(),
            }
        };

        let body = EnvelopeBody {
            source_account: channel_account_public_key.to_string(),
            sequence_number: channel_sequence_number,
            increment_sequence_num: true,
            time_bounds: Some((now, now + TIME_BOUNDS_WIDTH_SECONDS)),
            max_ledger: locked_until_ledger_number,
            base_fee: _fees.protocol_min_base_fee,
            operations: vec![operation],
        };

        Ok(Envelope::new(body))
    }

    fn build_success_event(&self, transaction: &tss_types::Transaction) -> Event {
        Event::payment_success(
            transaction.tenant_id.clone(),
            transaction.id.to_string(),
            transaction.external_id.as_str(),
            transaction.completed_at.unwrap_or_else(Utc::now),
            transaction.tx_hash.clone(),
        )
    }

    fn build_failure_event(&self, transaction: &tss_types::Transaction, message: &str) -> Event {
        Event::payment_error(
            transaction.tenant_id.clone(),
            transaction.id.to_string(),
            transaction.external_id.as_str(),
            transaction.completed_at.unwrap_or_else(Utc::now),
            message,
        )
    }

    fn requires_rebuild_on_retry(&self) -> bool {
        false
    }

    fn context_logger_fields(&self, transaction: &tss_types::Transaction) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("transaction_id".into(), transaction.id.to_string());
        fields.insert("tenant_id".into(), transaction.tenant_id.as_str().into());
        fields.insert("transaction_type".into(), "PAYMENT".into());
        fields.insert("status".into(), format!("{:?}", transaction.status));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_types::{ExternalId, PaymentPayload, TenantId};

    fn sample_transaction(destination: &str) -> tss_types::Transaction {
        tss_types::Transaction::new(
            ExternalId::new("ext-1").unwrap(),
            TenantId::new("t1").unwrap(),
            TransactionPayload::Payment(PaymentPayload {
                asset_code: "xlm".into(),
                asset_issuer: None,
                amount: Decimal::from_str("5.5").unwrap(),
                destination: destination.into(),
                memo: None,
            }),
        )
        .unwrap()
    }

    struct NoopClient;

    #[async_trait]
    impl BlockchainClient for NoopClient {
        async fn account_detail(
            &self,
            _public_key: &str,
        ) -> Result<tss_chain::AccountDetail, tss_chain::ChainError> {
            unimplemented!()
        }
        async fn simulate_contract_invocation(
            &self,
            _envelope_b64: &str,
        ) -> Result<tss_chain::SimulationResult, tss_chain::ChainError> {
            unimplemented!()
        }
        async fn submit_transaction(
            &self,
            _envelope_b64: &str,
        ) -> Result<tss_chain::SubmitResult, tss_chain::ChainError> {
            unimplemented!()
        }
        async fn transaction_detail(
            &self,
            _hash: &str,
        ) -> Result<tss_chain::TransactionDetail, tss_chain::ChainError> {
            unimplemented!()
        }
        async fn latest_ledger(&self) -> Result<u32, tss_chain::ChainError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn builds_native_payment_operation() {
        let destination = tss_types::strkey::encode_ed25519_public_key(&[4u8; 32]);
        let transaction = sample_transaction(&destination);
        let handler = PaymentHandler;
        let envelope = handler
            .build_inner_transaction(
                &NoopClient,
                &transaction,
                "GCHANNEL",
                7,
                "GDIST",
                500,
                FeeParameters {
                    max_base_fee: 1000,
                    protocol_min_base_fee: 100,
                },
            )
            .await
            .unwrap();
        assert_eq!(envelope.body.sequence_number, 7);
        assert_eq!(envelope.body.max_ledger, 500);
        assert_eq!(envelope.body.operations.len(), 1);
    }

    #[tokio::test]
    async fn contract_destination_produces_payment_to_contract_operation() {
        let destination = tss_types::strkey::encode_contract_address(&[9u8; 32]);
        let transaction = sample_transaction(&destination);
        let handler = PaymentHandler;
        let envelope = handler
            .build_inner_transaction(
                &NoopClient,
                &transaction,
                "GCHANNEL",
                1,
                "GDIST",
                500,
                FeeParameters {
                    max_base_fee: 1000,
                    protocol_min_base_fee: 100,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            envelope.body.operations[0],
            Operation::PaymentToContract { .. }
        ));
    }

    #[tokio::test]
    async fn contract_destination_with_memo_is_rejected() {
        let destination = tss_types::strkey::encode_contract_address(&[9u8; 32]);
        let mut transaction = sample_transaction(&destination);
        let TransactionPayload::Payment(payload) = &mut transaction.payload else {
            unreachable!()
        };
        payload.memo = Some(tss_types::Memo::Text("order-42".into()));
        let handler = PaymentHandler;
        let result = handler
            .build_inner_transaction(
                &NoopClient,
                &transaction,
                "GCHANNEL",
                1,
                "GDIST",
                500,
                FeeParameters {
                    max_base_fee: 1000,
                    protocol_min_base_fee: 100,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(HandlerError::Validation(
                tss_types::ValidationError::MemoNotSupportedForContract
            ))
        ));
    }

    #[test]
    fn requires_rebuild_on_retry_is_false() {
        assert!(!PaymentHandler.requires_rebuild_on_retry());
    }
}
