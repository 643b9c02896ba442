//! Services module for settlement business logic

pub mod card_settlement;
pub mod chain_settlement;
pub mod lifecycle;
pub mod notification;

pub use card_settlement::CardSettlementService;
pub use chain_settlement::ChainSettlementService;
pub use lifecycle::{LifecycleConfig, NewPaymentRequest, PaymentLifecycle};
pub use notification::{LogNotifier, NotificationError, PaymentNotifier};
