//! Domain model for the payment service
//!
//! The types in this module carry the settlement state machine and are free of
//! any I/O concern. Persistence, caching and transport layers depend on this
//! module, never the other way around.

pub mod error;
pub mod payment;
pub mod settlement;

pub use error::DomainError;
pub use payment::{Payment, PaymentMethod, PaymentSnapshot, PaymentStatus};
pub use settlement::{CardDetails, ChainTransfer, ChainTxStatus, SettlementOutcome};
