use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Chain(#[from] tss_chain::ChainError),
    #[error(transparent)]
    Handler(#[from] tss_handlers::HandlerError),
    #[error(transparent)]
    Store(#[from] tss_store::StoreError),
}
