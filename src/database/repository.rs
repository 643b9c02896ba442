//! Storage port for payments
//!
//! The lifecycle coordinator depends on this trait, not on Postgres; tests
//! substitute an in-memory store.

use async_trait::async_trait;

use crate::database::error::DatabaseResult;
use crate::domain::{Payment, PaymentStatus};

/// A page of payments together with the total row count for the filter.
#[derive(Debug, Clone)]
pub struct PaymentPage {
    pub payments: Vec<Payment>,
    pub total: i64,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new payment and return it with the store-assigned id.
    async fn create(&self, payment: &Payment) -> DatabaseResult<Payment>;

    /// Fetch by id. A malformed or unknown id yields `None`, never an error.
    async fn get_by_id(&self, id: &str) -> DatabaseResult<Option<Payment>>;

    async fn get_by_order(&self, order_id: &str) -> DatabaseResult<Vec<Payment>>;

    /// Paged history for a user, newest first. `page` is 1-based.
    async fn get_by_user(&self, user_id: &str, page: i64, limit: i64)
        -> DatabaseResult<PaymentPage>;

    /// Replace the stored state of an existing payment.
    async fn update(&self, payment: &Payment) -> DatabaseResult<()>;

    async fn update_status(&self, id: &str, status: PaymentStatus) -> DatabaseResult<()>;

    /// Open (PENDING or PROCESSING) payments created inside the given time
    /// window, oldest first. Used for pending-payment reads and by the
    /// confirmation monitor.
    async fn find_open(&self, hours_back: i32) -> DatabaseResult<Vec<Payment>>;
}
