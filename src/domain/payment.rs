//! Payment entity and its lifecycle state machine
//!
//! A payment moves PENDING -> PROCESSING -> {COMPLETED, FAILED, CANCELLED},
//! and COMPLETED -> REFUNDED. All mutation goes through the transition
//! methods; there are no public field setters, which is what keeps the status
//! on legal edges only.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// A payment is open while a settlement attempt may still change it.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// FAILED and CANCELLED payments may be retried by creating a fresh
    /// settlement attempt; the entity itself never leaves these states.
    pub fn allows_retry(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled)
    }

    /// Storage representation. Total together with [`PaymentStatus::from_db_str`].
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(PaymentStatus::Pending),
            "PROCESSING" => Some(PaymentStatus::Processing),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Settlement rail for a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Chain,
}

impl PaymentMethod {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Chain => "CHAIN",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "CARD" => Some(PaymentMethod::Card),
            "CHAIN" => Some(PaymentMethod::Chain),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "CARD" => Ok(PaymentMethod::Card),
            "CHAIN" => Ok(PaymentMethod::Chain),
            _ => Err(DomainError::InvalidPaymentMethod {
                value: value.to_string(),
            }),
        }
    }
}

/// Flat, serializable view of a payment.
///
/// This is the hydration and export point for boundary layers: the repository
/// reads rows into snapshots, the cache stores snapshots as JSON, and events
/// are built from them. The entity's invariants are not re-checked on restore;
/// storage is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub transaction_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The payment entity.
///
/// Owned exclusively by the lifecycle coordinator while a settlement operation
/// runs; two operations never mutate the same payment concurrently.
#[derive(Debug, Clone)]
pub struct Payment {
    id: String,
    order_id: String,
    user_id: String,
    amount: BigDecimal,
    currency: String,
    status: PaymentStatus,
    method: PaymentMethod,
    transaction_reference: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new PENDING payment.
    ///
    /// Invariants (non-empty order/user/currency, amount > 0) are enforced
    /// here once and never re-validated later.
    pub fn new(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> DomainResult<Self> {
        let order_id = order_id.into();
        let user_id = user_id.into();
        let currency = currency.into();

        if order_id.trim().is_empty() {
            return Err(DomainError::EmptyOrderId);
        }
        if user_id.trim().is_empty() {
            return Err(DomainError::EmptyUserId);
        }
        if amount <= BigDecimal::from(0) {
            return Err(DomainError::invalid_amount(
                amount.to_string(),
                "amount must be greater than zero",
            ));
        }
        if currency.trim().is_empty() {
            return Err(DomainError::EmptyCurrency);
        }

        let now = Utc::now();
        Ok(Self {
            id: String::new(),
            order_id,
            user_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            method,
            transaction_reference: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a payment from stored state. For persistence adapters.
    pub fn from_snapshot(snapshot: PaymentSnapshot) -> Self {
        Self {
            id: snapshot.id,
            order_id: snapshot.order_id,
            user_id: snapshot.user_id,
            amount: snapshot.amount,
            currency: snapshot.currency,
            status: snapshot.status,
            method: snapshot.method,
            transaction_reference: snapshot.transaction_reference,
            error_message: snapshot.error_message,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }

    pub fn snapshot(&self) -> PaymentSnapshot {
        PaymentSnapshot {
            id: self.id.clone(),
            order_id: self.order_id.clone(),
            user_id: self.user_id.clone(),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            status: self.status,
            method: self.method,
            transaction_reference: self.transaction_reference.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Attach the identifier assigned by the backing store on creation.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn transaction_reference(&self) -> Option<&str> {
        self.transaction_reference.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// PENDING -> PROCESSING. A no-op from any other state; the guard is
    /// idempotent, not an error.
    pub fn mark_processing(&mut self) {
        if self.status == PaymentStatus::Pending {
            self.status = PaymentStatus::Processing;
            self.touch();
        }
    }

    /// Complete an open payment, recording the external settlement reference.
    /// A no-op on a payment that is no longer open.
    pub fn mark_completed(&mut self, transaction_reference: impl Into<String>) {
        if self.is_open() {
            self.status = PaymentStatus::Completed;
            self.transaction_reference = Some(transaction_reference.into());
            self.touch();
        }
    }

    /// Record a settlement failure. Legal from any state so that a failure is
    /// never silently dropped.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.error_message = Some(reason.into());
        self.touch();
    }

    /// Cancel an open payment. A no-op otherwise.
    pub fn cancel(&mut self) {
        if self.is_open() {
            self.status = PaymentStatus::Cancelled;
            self.touch();
        }
    }

    /// COMPLETED -> REFUNDED. Refunding anything else is a logic error, not a
    /// transient fault, and is rejected.
    pub fn refund(&mut self) -> DomainResult<()> {
        if self.status != PaymentStatus::Completed {
            return Err(DomainError::invalid_state(
                self.id.clone(),
                self.status,
                "refunded",
            ));
        }
        self.status = PaymentStatus::Refunded;
        self.touch();
        Ok(())
    }

    /// Record the external transaction reference without a status change, for
    /// a chain transaction that has been observed but is not yet confirmed.
    pub fn record_transaction_reference(&mut self, reference: impl Into<String>) {
        self.transaction_reference = Some(reference.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
