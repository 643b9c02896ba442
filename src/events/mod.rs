//! Lifecycle event publishing
//!
//! One event per entity transition, published by the lifecycle coordinator
//! after the state change has been persisted. Delivery is at-most-once from
//! the coordinator's perspective: a publish failure is logged and never rolls
//! back a durable state change.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::RedisPool;
use crate::domain::Payment;

/// The lifecycle transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    Created,
    StatusUpdated,
    Completed,
    Failed,
    Refunded,
}

impl PaymentEventKind {
    /// Subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            PaymentEventKind::Created => "payment.created",
            PaymentEventKind::StatusUpdated => "payment.status.updated",
            PaymentEventKind::Completed => "payment.completed",
            PaymentEventKind::Failed => "payment.failed",
            PaymentEventKind::Refunded => "payment.refunded",
        }
    }

    /// Event-type tag carried inside the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentEventKind::Created => "PaymentCreated",
            PaymentEventKind::StatusUpdated => "PaymentStatusUpdated",
            PaymentEventKind::Completed => "PaymentCompleted",
            PaymentEventKind::Failed => "PaymentFailed",
            PaymentEventKind::Refunded => "PaymentRefunded",
        }
    }
}

/// Wire payload for a lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub event_type: String,
    pub timestamp: i64,
}

impl PaymentEvent {
    pub fn from_payment(kind: PaymentEventKind, payment: &Payment) -> Self {
        let timestamp = match kind {
            PaymentEventKind::Created => payment.created_at().timestamp(),
            _ => payment.updated_at().timestamp(),
        };

        Self {
            id: payment.id().to_string(),
            order_id: payment.order_id().to_string(),
            user_id: payment.user_id().to_string(),
            amount: payment.amount().to_string(),
            currency: payment.currency().to_string(),
            status: payment.status().to_string(),
            payment_method: payment.method().to_string(),
            transaction_reference: payment.transaction_reference().map(str::to_string),
            error_message: payment.error_message().map(str::to_string),
            event_type: kind.event_type().to_string(),
            timestamp,
        }
    }
}

/// Event publishing errors
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event connection error: {message}")]
    Connection { message: String },

    #[error("event serialization error: {message}")]
    Serialization { message: String },
}

impl From<redis::RedisError> for EventError {
    fn from(err: redis::RedisError) -> Self {
        EventError::Connection {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<bb8::RunError<redis::RedisError>> for EventError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        EventError::Connection {
            message: format!("Pool error: {}", err),
        }
    }
}

/// Publishing port used by the lifecycle coordinator.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, kind: PaymentEventKind, payment: &Payment) -> Result<(), EventError>;
}

/// Redis pub/sub backed publisher.
#[derive(Clone)]
pub struct RedisEventPublisher {
    pool: RedisPool,
}

impl RedisEventPublisher {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, kind: PaymentEventKind, payment: &Payment) -> Result<(), EventError> {
        let event = PaymentEvent::from_payment(kind, payment);
        let payload = serde_json::to_string(&event)?;

        let mut conn = self.pool.get().await?;
        let _: i64 = conn.publish(kind.subject(), payload).await?;

        debug!(
            payment_id = %event.id,
            subject = kind.subject(),
            event_type = kind.event_type(),
            "published payment event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PaymentMethod, Payment};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn payment() -> Payment {
        Payment::new(
            "order-1",
            "user-1",
            BigDecimal::from_str("49.99").unwrap(),
            "USD",
            PaymentMethod::Card,
        )
        .unwrap()
        .with_id("pay_1")
    }

    #[test]
    fn subjects_are_stable() {
        assert_eq!(PaymentEventKind::Created.subject(), "payment.created");
        assert_eq!(
            PaymentEventKind::StatusUpdated.subject(),
            "payment.status.updated"
        );
        assert_eq!(PaymentEventKind::Completed.subject(), "payment.completed");
        assert_eq!(PaymentEventKind::Failed.subject(), "payment.failed");
        assert_eq!(PaymentEventKind::Refunded.subject(), "payment.refunded");
    }

    #[test]
    fn event_payload_carries_payment_fields() {
        let mut p = payment();
        p.mark_completed("ch_99");

        let event = PaymentEvent::from_payment(PaymentEventKind::Completed, &p);
        assert_eq!(event.id, "pay_1");
        assert_eq!(event.amount, "49.99");
        assert_eq!(event.status, "COMPLETED");
        assert_eq!(event.payment_method, "CARD");
        assert_eq!(event.transaction_reference.as_deref(), Some("ch_99"));
        assert_eq!(event.event_type, "PaymentCompleted");

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("error_message").is_none());
    }
}
