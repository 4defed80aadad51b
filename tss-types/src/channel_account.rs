use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An auxiliary signing account whose sole role is to provide an isolated
/// sequence-number stream for one in-flight submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub public_key: String,
    pub encrypted_private_key: String,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_until_ledger_number: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelAccount {
    pub fn is_free(&self, current_ledger: u32) -> bool {
        match self.locked_until_ledger_number {
            Some(locked_until) => locked_until < current_ledger,
            None => true,
        }
    }
}

/// Lower/upper bound the pool size `M` is configured within.
pub const MIN_POOL_SIZE: u32 = 1;
pub const MAX_POOL_SIZE: u32 = 1000;

pub fn validate_pool_size(size: u32) -> Result<(), String> {
    if size < MIN_POOL_SIZE || size > MAX_POOL_SIZE {
        return Err(format!(
            "channel account pool size must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}, got {size}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(locked_until: Option<u32>) -> ChannelAccount {
        ChannelAccount {
            public_key: "GTEST".into(),
            encrypted_private_key: "enc".into(),
            locked_at: None,
            locked_until_ledger_number: locked_until,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unlocked_account_is_free() {
        assert!(account(None).is_free(100));
    }

    #[test]
    fn locked_account_free_only_once_ledger_passes_bound() {
        let a = account(Some(100));
        assert!(!a.is_free(99));
        assert!(!a.is_free(100));
        assert!(a.is_free(101));
    }

    #[test]
    fn pool_size_bounds() {
        assert!(validate_pool_size(1).is_ok());
        assert!(validate_pool_size(1000).is_ok());
        assert!(validate_pool_size(0).is_err());
        assert!(validate_pool_size(1001).is_err());
    }
}
