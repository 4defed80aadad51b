//! Per-variant transaction handlers: each `TransactionType`
//! gets one `TransactionHandler` implementation that knows how to build its
//! envelope, its success/failure events, and its retry semantics. The
//! worker dispatches through `HandlerFactory` rather than matching on the
//! type itself.

pub mod envelope;
pub mod error;
pub mod factory;
pub mod handler;
pub mod payment;
pub mod sponsored;
pub mod wallet_creation;

pub use envelope::{Envelope, EnvelopeBody, EnvelopeSignature, Operation};
pub use error::HandlerError;
pub use factory::HandlerFactory;
pub use handler::{FeeParameters, TransactionHandler};
pub use payment::PaymentHandler;
pub use sponsored::SponsoredHandler;
pub use wallet_creation::WalletCreationHandler;
