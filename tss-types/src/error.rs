use thiserror::Error;

/// Errors that can arise while constructing or transitioning a `Transaction`.
/// Validation errors are never retried: the caller made a bad request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("external_id must not be empty")]
    EmptyExternalId,
    #[error("tenant_id must not be empty")]
    EmptyTenantId,
    #[error("asset code must be 1..=12 characters, got {0}")]
    InvalidAssetCodeLength(usize),
    #[error("asset issuer is required for non-native assets")]
    MissingAssetIssuer,
    #[error("asset issuer is not a valid ed25519 public key")]
    InvalidAssetIssuer,
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("amount exceeds 7 fractional digits of precision")]
    TooManyFractionalDigits,
    #[error("destination is neither a valid ed25519 public key nor a valid contract address")]
    InvalidDestination,
    #[error("memo is not supported for contract destinations")]
    MemoNotSupportedForContract,
    #[error("memo TEXT must be at most 28 bytes, got {0}")]
    MemoTextTooLong(usize),
    #[error("memo HASH/RETURN must be exactly 32 bytes expressed as 64 hex chars")]
    InvalidMemoHash,
    #[error("memo ID must be a valid u64")]
    InvalidMemoId,
    #[error("public_key must be exactly 65 bytes expressed as hex, got {0}")]
    InvalidWalletCreationPublicKeyLength(usize),
    #[error("wasm hash must be 32 bytes")]
    InvalidWasmHashLength,
    #[error("sponsored_account must be a valid contract address")]
    InvalidSponsoredAccount,
    #[error("sponsored_transaction_envelope must not be empty")]
    EmptySponsoredEnvelope,
    #[error("sponsored_transaction_envelope exceeds the maximum allowed length")]
    SponsoredEnvelopeTooLong,
    #[error("hex decoding failed: {0}")]
    HexDecode(String),
    #[error("transaction hash must be 64 hex characters")]
    InvalidTransactionHash,
    #[error("envelope does not parse as valid base64")]
    InvalidEnvelope,
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition { from: String, to: String },
}
