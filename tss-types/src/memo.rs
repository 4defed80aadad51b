use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// PAYMENT-only memo, attached to ed25519 destinations.
///
/// Encoding rules:
/// - `Text` must be at most 28 bytes (UTF-8).
/// - `Id` is a bare uint64.
/// - `Hash` and `Return` are exactly 32 bytes, carried as 64 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "memo_type", content = "memo_value")]
pub enum Memo {
    Text(String),
    Id(u64),
    Hash(String),
    Return(String),
}

impl Memo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Memo::Text(s) => {
                let len = s.as_bytes().len();
                if len > 28 {
                    return Err(ValidationError::MemoTextTooLong(len));
                }
                Ok(())
            }
            Memo::Id(_) => Ok(()),
            Memo::Hash(s) | Memo::Return(s) => {
                if s.len() != 64 || hex::decode(s).is_err() {
                    return Err(ValidationError::InvalidMemoHash);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_memo_boundary_28_bytes_ok() {
        let memo = Memo::Text("a".repeat(28));
        assert!(memo.validate().is_ok());
    }

    #[test]
    fn text_memo_29_bytes_rejected() {
        let memo = Memo::Text("a".repeat(29));
        assert_eq!(
            memo.validate(),
            Err(ValidationError::MemoTextTooLong(29))
        );
    }

    #[test]
    fn id_memo_any_u64_ok() {
        assert!(Memo::Id(0).validate().is_ok());
        assert!(Memo::Id(u64::MAX).validate().is_ok());
    }

    #[test]
    fn hash_memo_requires_32_bytes_hex() {
        let good = Memo::Hash("ab".repeat(32));
        assert!(good.validate().is_ok());
        let bad = Memo::Hash("ab".repeat(31));
        assert!(bad.validate().is_err());
        let not_hex = Memo::Return("zz".repeat(32));
        assert!(not_hex.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        for memo in [
            Memo::Text("hello".into()),
            Memo::Id(42),
            Memo::Hash("00".repeat(32)),
            Memo::Return("ff".repeat(32)),
        ] {
            let json = serde_json::to_string(&memo).unwrap();
            let back: Memo = serde_json::from_str(&json).unwrap();
            assert_eq!(memo, back);
        }
    }
}
