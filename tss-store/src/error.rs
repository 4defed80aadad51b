use thiserror::Error;
use tss_types::ValidationError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("not found")]
    NotFound,
    #[error("no channel account is currently free")]
    InsufficientChannelAccounts,
    #[error("row is not in an updatable state: {0}")]
    InvalidState(String),
    #[error("expected to update {expected} rows but updated {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },
}
