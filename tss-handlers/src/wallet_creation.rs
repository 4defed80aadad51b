use crate::envelope::{Envelope, EnvelopeBody, Operation};
use crate::error::HandlerError;
use crate::handler::{FeeParameters, TransactionHandler};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tss_chain::client::BlockchainClient;
use tss_events::Event;
use tss_types::TransactionPayload;

pub struct WalletCreationHandler;

/// Base-fee adjustment from simulated resource usage:
/// `max(max_base_fee - min_resource_fee, protocol_min_base_fee)`, falling
/// back to `max_base_fee` outright when the simulation reported no
/// meaningful resource fee.
fn adjusted_base_fee(fees: FeeParameters, min_resource_fee: i64) -> i64 {
    if min_resource_fee <= 0 {
        return fees.max_base_fee;
    }
    std::cmp::max(fees.max_base_fee - min_resource_fee, fees.protocol_min_base_fee)
}

#[async_trait]
impl TransactionHandler for WalletCreationHandler {
    async fn build_inner_transaction(
        &self,
        chain: &dyn BlockchainClient,
        transaction: &tss_types::Transaction,
        channel_account_public_key: &str,
        channel_sequence_number: i64,
        distribution_account: &str,
        locked_until_ledger_number: u32,
        fees: FeeParameters,
    ) -> Result<Envelope, HandlerError> {
        let TransactionPayload::WalletCreation(payload) = &transaction.payload else {
            return Err(HandlerError::EnvelopeNotParseable(
                "handler/payload type mismatch".into(),
            ));
        };

        let public_key_bytes = payload.public_key_bytes()?;
        let wasm_hash_bytes = payload.wasm_hash_bytes()?;
        let salt: [u8; 32] = Sha256::digest(&public_key_bytes).into();

        let create_op = Operation::CreateContract {
            from_address: distribution_account.to_string(),
            salt_hex: hex::encode(salt),
            wasm_hash_hex: hex::encode(wasm_hash_bytes),
            admin: distribution_account.to_string(),
            constructor_public_key_hex: hex::encode(&public_key_bytes),
            auth_entries_base64: Vec::new(),
            transaction_data_base64: String::new(),
        };

        let time_bounds = Some((Utc::now().timestamp(), Utc::now().timestamp() + 300));
        let draft_body = EnvelopeBody {
            source_account: channel_account_public_key.to_string(),
            sequence_number: channel_sequence_number,
            increment_sequence_num: true,
            time_bounds,
            max_ledger: locked_until_ledger_number,
            base_fee: fees.max_base_fee,
            operations: vec![create_op],
        };
        let draft_b64 = Envelope::new(draft_body.clone()).to_base64()?;

        let simulation = chain.simulate_contract_invocation(&draft_b64).await?;
        if !simulation.succeeded() {
            return Err(HandlerError::SimulationFailed(simulation.error));
        }

        let base_fee = adjusted_base_fee(fees, simulation.min_resource_fee);

        let Operation::CreateContract {
            from_address,
            salt_hex,
            wasm_hash_hex,
            admin,
            constructor_public_key_hex,
            ..
        } = draft_body.operations.into_iter().next().expect("exactly one operation")
        else {
            unreachable!("draft envelope always has exactly one CreateContract operation");
        };

        let final_op = Operation::CreateContract {
            from_address,
            salt_hex,
            wasm_hash_hex,
            admin,
            constructor_public_key_hex,
            auth_entries_base64: simulation.auth_entries_base64,
            transaction_data_base64: simulation.transaction_data_base64,
        };

        let body = EnvelopeBody {
            source_account: draft_body.source_account,
            sequence_number: draft_body.sequence_number,
            increment_sequence_num: draft_body.increment_sequence_num,
            time_bounds: draft_body.time_bounds,
            max_ledger: draft_body.max_ledger,
            base_fee,
            operations: vec![final_op],
        };

        Ok(Envelope::new(body))
    }

    fn build_success_event(&self, transaction: &tss_types::Transaction) -> Event {
        let wallet_public_key = match &transaction.payload {
            TransactionPayload::WalletCreation(p) => p.public_key.clone(),
            _ => String::new(),
        };
        Event::wallet_creation_success(
            transaction.tenant_id.clone(),
            transaction.id.to_string(),
            wallet_public_key,
            transaction.completed_at.unwrap_or_else(Utc::now),
            transaction.tx_hash.clone(),
        )
    }

    fn build_failure_event(&self, transaction: &tss_types::Transaction, message: &str) -> Event {
        let wallet_public_key = match &transaction.payload {
            TransactionPayload::WalletCreation(p) => p.public_key.clone(),
            _ => String::new(),
        };
        Event::wallet_creation_error(
            transaction.tenant_id.clone(),
            transaction.id.to_string(),
            wallet_public_key,
            transaction.completed_at.unwrap_or_else(Utc::now),
            message,
        )
    }

    fn requires_rebuild_on_retry(&self) -> bool {
        true
    }

    fn context_logger_fields(&self, transaction: &tss_types::Transaction) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("transaction_id".into(), transaction.id.to_string());
        fields.insert("tenant_id".into(), transaction.tenant_id.as_str().into());
        fields.insert("transaction_type".into(), "WALLET_CREATION".into());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_fee_subtracts_resource_fee_but_respects_floor() {
        let fees = FeeParameters {
            max_base_fee: 1000,
            protocol_min_base_fee: 100,
        };
        assert_eq!(adjusted_base_fee(fees, 400), 600);
        assert_eq!(adjusted_base_fee(fees, 950), 100);
        assert_eq!(adjusted_base_fee(fees, 0), 1000);
        assert_eq!(adjusted_base_fee(fees, -5), 1000);
    }
}
