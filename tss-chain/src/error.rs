use thiserror::Error;

/// A typed view onto what the blockchain client's error actually means for
/// retry policy: network/timeout is retriable, protocol
/// rejections are terminal, rate limiting feeds the processing limiter.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("network error talking to the blockchain: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by the blockchain endpoint")]
    RateLimited,
    #[error("protocol rejection: {code}")]
    Protocol { code: String },
    #[error("not found")]
    NotFound,
    #[error("simulation failed: {0}")]
    SimulationFailed(String),
    #[error("malformed response from blockchain endpoint: {0}")]
    MalformedResponse(String),
}

impl ChainError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ChainError::Network(_) | ChainError::Timeout | ChainError::RateLimited
        )
    }

    /// Result codes the worker treats as a terminal protocol rejection
    /// rather than something to reconcile and retry.
    pub fn is_terminal_protocol_rejection(&self) -> bool {
        matches!(self, ChainError::Protocol { .. })
    }

    /// `bad_seq` specifically self-heals: the channel account's cached
    /// sequence number was stale. The worker unlocks (not releases-with-
    /// error) the channel account so the next fetch re-reads it.
    pub fn is_stale_sequence(&self) -> bool {
        matches!(self, ChainError::Protocol { code } if code == "tx_bad_seq")
    }
}
