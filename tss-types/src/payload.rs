use crate::error::ValidationError;
use crate::memo::Memo;
use crate::strkey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Payment,
    WalletCreation,
    Sponsored,
}

/// Maximum representable amount: `922337203685.4775807`, i.e. `i64::MAX`
/// stroops at 7 fractional digits.
const MAX_AMOUNT_STROOPS: i64 = i64::MAX;

fn is_native_asset_code(code: &str) -> bool {
    code.eq_ignore_ascii_case("xlm")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub amount: Decimal,
    pub destination: String,
    pub memo: Option<Memo>,
}

impl PaymentPayload {
    pub fn is_native(&self) -> bool {
        is_native_asset_code(&self.asset_code)
    }

    pub fn destination_is_contract(&self) -> bool {
        strkey::is_valid_contract_address(&self.destination)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let code_len = self.asset_code.len();
        if code_len == 0 || code_len > 12 {
            return Err(ValidationError::InvalidAssetCodeLength(code_len));
        }

        if !self.is_native() {
            match &self.asset_issuer {
                None => return Err(ValidationError::MissingAssetIssuer),
                Some(issuer) => {
                    if !strkey::is_valid_ed25519_public_key(issuer) {
                        return Err(ValidationError::InvalidAssetIssuer);
                    }
                }
            }
        }

        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        validate_amount_precision(&self.amount)?;

        let dest_is_key = strkey::is_valid_ed25519_public_key(&self.destination);
        let dest_is_contract = strkey::is_valid_contract_address(&self.destination);
        if !dest_is_key && !dest_is_contract {
            return Err(ValidationError::InvalidDestination);
        }

        if dest_is_contract {
            if self.memo.is_some() {
                return Err(ValidationError::MemoNotSupportedForContract);
            }
        } else if let Some(memo) = &self.memo {
            memo.validate()?;
        }

        Ok(())
    }
}

fn validate_amount_precision(amount: &Decimal) -> Result<(), ValidationError> {
    // Normalize first: "1.00000000" (scale 8) has no significant digit past
    // the 7th, and must not be rejected on scale alone.
    let normalized = amount.normalize();
    if normalized.scale() > 7 {
        return Err(ValidationError::TooManyFractionalDigits);
    }
    let stroops = normalized.mantissa() * 10i128.pow(7 - normalized.scale());
    if stroops > MAX_AMOUNT_STROOPS as i128 {
        return Err(ValidationError::TooManyFractionalDigits);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCreationPayload {
    /// 65 raw bytes expressed as hex.
    pub public_key: String,
    /// 32 raw bytes expressed as hex.
    pub wasm_hash: String,
}

impl WalletCreationPayload {
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        let bytes =
            hex::decode(&self.public_key).map_err(|e| ValidationError::HexDecode(e.to_string()))?;
        if bytes.len() != 65 {
            return Err(ValidationError::InvalidWalletCreationPublicKeyLength(
                bytes.len(),
            ));
        }
        Ok(bytes)
    }

    pub fn wasm_hash_bytes(&self) -> Result<[u8; 32], ValidationError> {
        let bytes =
            hex::decode(&self.wasm_hash).map_err(|e| ValidationError::HexDecode(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ValidationError::InvalidWasmHashLength)?;
        Ok(arr)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.public_key_bytes()?;
        self.wasm_hash_bytes()?;
        Ok(())
    }
}

const MAX_SPONSORED_ENVELOPE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsoredPayload {
    pub sponsored_account: String,
    pub sponsored_transaction_envelope: String,
}

impl SponsoredPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !strkey::is_valid_contract_address(&self.sponsored_account) {
            return Err(ValidationError::InvalidSponsoredAccount);
        }
        if self.sponsored_transaction_envelope.trim().is_empty() {
            return Err(ValidationError::EmptySponsoredEnvelope);
        }
        if self.sponsored_transaction_envelope.len() > MAX_SPONSORED_ENVELOPE_LEN {
            return Err(ValidationError::SponsoredEnvelopeTooLong);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionPayload {
    #[serde(rename = "PAYMENT")]
    Payment(PaymentPayload),
    #[serde(rename = "WALLET_CREATION")]
    WalletCreation(WalletCreationPayload),
    #[serde(rename = "SPONSORED")]
    Sponsored(SponsoredPayload),
}

impl TransactionPayload {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionPayload::Payment(_) => TransactionType::Payment,
            TransactionPayload::WalletCreation(_) => TransactionType::WalletCreation,
            TransactionPayload::Sponsored(_) => TransactionType::Sponsored,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TransactionPayload::Payment(p) => p.validate(),
            TransactionPayload::WalletCreation(p) => p.validate(),
            TransactionPayload::Sponsored(p) => p.validate(),
        }
    }
}
