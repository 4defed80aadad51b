use crate::error::HandlerError;
use serde::{Deserialize, Serialize};

/// One operation inside an envelope's body. Narrow on purpose: only the
/// shapes the three handler variants actually emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Operation {
    Payment {
        source_account: String,
        destination: String,
        asset_code: String,
        asset_issuer: Option<String>,
        amount_stroops: i64,
        memo: Option<tss_types::Memo>,
    },
    PaymentToContract {
        source_account: String,
        destination_contract: String,
        asset_code: String,
        asset_issuer: Option<String>,
        amount_stroops: i64,
    },
    CreateContract {
        from_address: String,
        salt_hex: String,
        wasm_hash_hex: String,
        admin: String,
        constructor_public_key_hex: String,
        auth_entries_base64: Vec<String>,
        transaction_data_base64: String,
    },
    FeeBumpWrapper {
        fee_source: String,
        inner_envelope_base64: String,
    },
}

/// Everything that is hashed and signed. Kept separate from `Envelope` so
/// the signature payload is unambiguous: it is exactly the serialized form
/// of this struct, never the struct plus signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub source_account: String,
    pub sequence_number: i64,
    pub increment_sequence_num: bool,
    pub time_bounds: Option<(i64, i64)>,
    pub max_ledger: u32,
    pub base_fee: i64,
    pub operations: Vec<Operation>,
}

impl EnvelopeBody {
    /// Canonical byte form used both as the signature payload and as the
    /// thing persisted in `xdr_sent` once wrapped with signatures. Real
    /// network XDR is not in scope here; this is a stand-in wire format
    /// with the same role.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, HandlerError> {
        serde_json::to_vec(self).map_err(|e| HandlerError::EnvelopeNotParseable(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSignature {
    pub public_key: String,
    pub signature_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub body: EnvelopeBody,
    pub signatures: Vec<EnvelopeSignature>,
}

impl Envelope {
    pub fn new(body: EnvelopeBody) -> Self {
        Self {
            body,
            signatures: Vec::new(),
        }
    }

    pub fn push_signature(&mut self, public_key: impl Into<String>, signature: &[u8]) {
        self.signatures.push(EnvelopeSignature {
            public_key: public_key.into(),
            signature_base64: base64::encode(signature),
        });
    }

    pub fn to_base64(&self) -> Result<String, HandlerError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| HandlerError::EnvelopeNotParseable(e.to_string()))?;
        Ok(base64::encode(bytes))
    }

    /// Validates that a base64 blob is a well-formed envelope without
    /// requiring any semantic knowledge of its contents, used by the
    /// SPONSORED handler to check the pre-supplied envelope.
    pub fn is_parseable(envelope_b64: &str) -> bool {
        Self::from_base64(envelope_b64).is_ok()
    }

    pub fn from_base64(envelope_b64: &str) -> Result<Self, HandlerError> {
        let bytes = base64::decode(envelope_b64)
            .map_err(|e| HandlerError::EnvelopeNotParseable(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HandlerError::EnvelopeNotParseable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> EnvelopeBody {
        EnvelopeBody {
            source_account: "GCHANNEL".into(),
            sequence_number: 42,
            increment_sequence_num: true,
            time_bounds: Some((1000, 1300)),
            max_ledger: 500,
            base_fee: 100,
            operations: vec![Operation::Payment {
                source_account: "GDIST".into(),
                destination: "GDEST".into(),
                asset_code: "xlm".into(),
                asset_issuer: None,
                amount_stroops: 10_000_000,
                memo: None,
            }],
        }
    }

    #[test]
    fn round_trips_through_base64() {
        let mut envelope = Envelope::new(sample_body());
        envelope.push_signature("GCHANNEL", &[1u8; 64]);
        let encoded = envelope.to_base64().unwrap();
        assert!(Envelope::is_parseable(&encoded));
        let decoded = Envelope::from_base64(&encoded).unwrap();
        assert_eq!(decoded.body.sequence_number, 42);
        assert_eq!(decoded.signatures.len(), 1);
    }

    #[test]
    fn garbage_is_not_parseable() {
        assert!(!Envelope::is_parseable("not valid base64 json"));
    }
}
