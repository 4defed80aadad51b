use crate::envelope::{Envelope, EnvelopeBody, Operation};
use crate::error::HandlerError;
use crate::handler::{FeeParameters, TransactionHandler};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tss_chain::client::BlockchainClient;
use tss_events::Event;
use tss_types::TransactionPayload;

pub struct SponsoredHandler;

#[async_trait]
impl TransactionHandler for SponsoredHandler {
    async fn build_inner_transaction(
        &self,
        _chain: &dyn BlockchainClient,
        transaction: &tss_types::Transaction,
        _channel_account_public_key: &str,
        _channel_sequence_number: i64,
        distribution_account: &str,
        _locked_until_ledger_number: u32,
        fees: FeeParameters,
    ) -> Result<Envelope, HandlerError> {
        let TransactionPayload::Sponsored(payload) = &transaction.payload else {
            return Err(HandlerError::EnvelopeNotParseable(
                "handler/payload type mismatch".into(),
            ));
        };

        if !Envelope::is_parseable(&payload.sponsored_transaction_envelope) {
            return Err(HandlerError::EnvelopeNotParseable(
                "sponsored envelope is not a recognizable envelope".into(),
            ));
        }

        let body = EnvelopeBody {
            source_account: distribution_account.to_string(),
            sequence_number: 0,
            increment_sequence_num: false,
            time_bounds: None,
            max_ledger: _locked_until_ledger_number,
            base_fee: fees.max_base_fee,
            operations: vec![Operation::FeeBumpWrapper {
                fee_source: distribution_account.to_string(),
                inner_envelope_base64: payload.sponsored_transaction_envelope.clone(),
            }],
        };

        Ok(Envelope::new(body))
    }

    fn build_success_event(&self, transaction: &tss_types::Transaction) -> Event {
        // Sponsored transactions ride on the payment topic: from the
        // business layer's perspective a sponsored submission is still a
        // payment outcome keyed by the same external_id.
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
        fields.insert("transaction_type".into(), "SPONSORED".into());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_types::{ExternalId, SponsoredPayload, TenantId};

    fn sample_envelope_b64() -> String {
        use crate::envelope::EnvelopeBody;
        let body = EnvelopeBody {
            source_account: "GSPONSOR".into(),
            sequence_number: 1,
            increment_sequence_num: false,
            time_bounds: None,
            max_ledger: 10,
            base_fee: 100,
            operations: vec![],
        };
        Envelope::new(body).to_base64().unwrap()
    }

    fn sample_transaction(envelope_b64: String) -> tss_types::Transaction {
        tss_types::Transaction::new(
            ExternalId::new("ext-sponsored").unwrap(),
            TenantId::new("t1").unwrap(),
            TransactionPayload::Sponsored(SponsoredPayload {
                sponsored_account: tss_types::strkey::encode_contract_address(&[2u8; 32]),
                sponsored_transaction_envelope: envelope_b64,
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
    async fn wraps_parseable_envelope_in_fee_bump() {
        let transaction = sample_transaction(sample_envelope_b64());
        let handler = SponsoredHandler;
        let envelope = handler
            .build_inner_transaction(
                &NoopClient,
                &transaction,
                "GCHANNEL",
                0,
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
            Operation::FeeBumpWrapper { .. }
        ));
    }

    #[tokio::test]
    async fn rejects_unparseable_envelope() {
        let transaction = sample_transaction("not an envelope".into());
        let handler = SponsoredHandler;
        let result = handler
            .build_inner_transaction(
                &NoopClient,
                &transaction,
                "GCHANNEL",
                0,
                "GDIST",
                500,
                FeeParameters {
                    max_base_fee: 1000,
                    protocol_min_base_fee: 100,
                },
            )
            .await;
        assert!(result.is_err());
    }
}
