//! Promotes terminal transaction-store rows into the business-level
//! `payments` table and emits the corresponding outbound event.

pub mod error;
pub mod metrics;
pub mod payment_repository;
pub mod synchronizer;

pub use error::SyncError;
pub use metrics::{LoggingSyncMetrics, SyncMetrics};
pub use payment_repository::{
    LoggingPaymentRepository, PaymentRecord, PaymentRepository, PaymentRepositoryError, PaymentStatus,
};
pub use synchronizer::{PaymentStatusSynchronizer, DEFAULT_MINIMUM_JOB_INTERVAL_SECONDS};
