use thiserror::Error;
use tss_chain::ChainError;
use tss_types::ValidationError;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("simulation rejected the transaction: {0}")]
    SimulationFailed(String),
    #[error("envelope is not parseable: {0}")]
    EnvelopeNotParseable(String),
}

impl HandlerError {
    /// Mirrors `ChainError::is_retriable` for handler-originated failures:
    /// a simulation or parse failure is a property of the payload, not a
    /// transient condition, so it is never retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, HandlerError::Chain(e) if e.is_retriable())
    }
}
