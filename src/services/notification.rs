//! Payment email notifications

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::Payment;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {message}")]
    Delivery { message: String },
}

/// Notification port. The coordinator fires these after COMPLETED, FAILED and
/// REFUNDED transitions; delivery failure is logged and never fails the
/// settlement call.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn payment_confirmation(&self, payment: &Payment) -> Result<(), NotificationError>;

    async fn payment_failure(&self, payment: &Payment) -> Result<(), NotificationError>;

    async fn refund_confirmation(&self, payment: &Payment) -> Result<(), NotificationError>;
}

/// Structured-log notifier. Stands in for a real mail transport, which is a
/// drop-in replacement behind the trait.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentNotifier for LogNotifier {
    async fn payment_confirmation(&self, payment: &Payment) -> Result<(), NotificationError> {
        info!(
            payment_id = %payment.id(),
            order_id = %payment.order_id(),
            user_id = %payment.user_id(),
            amount = %payment.amount(),
            currency = %payment.currency(),
            "🔔 NOTIFICATION: Payment Confirmed"
        );
        Ok(())
    }

    async fn payment_failure(&self, payment: &Payment) -> Result<(), NotificationError> {
        error!(
            payment_id = %payment.id(),
            order_id = %payment.order_id(),
            user_id = %payment.user_id(),
            reason = payment.error_message().unwrap_or("unknown"),
            "🔔 NOTIFICATION: Payment Failed"
        );
        Ok(())
    }

    async fn refund_confirmation(&self, payment: &Payment) -> Result<(), NotificationError> {
        info!(
            payment_id = %payment.id(),
            order_id = %payment.order_id(),
            user_id = %payment.user_id(),
            amount = %payment.amount(),
            "🔔 NOTIFICATION: Refund Processed"
        );
        Ok(())
    }
}
