use thiserror::Error;

use crate::domain::payment::{PaymentMethod, PaymentStatus};

pub type DomainResult<T> = Result<T, DomainError>;

/// Closed set of domain and validation failures.
///
/// Callers match on the variant, never on the rendered message. Anything that
/// is not representable here is by definition an infrastructure or external
/// failure and lives in the module that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("order id is required")]
    EmptyOrderId,

    #[error("user id is required")]
    EmptyUserId,

    #[error("currency is required")]
    EmptyCurrency,

    #[error("invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("unsupported payment method: {value}")]
    InvalidPaymentMethod { value: String },

    #[error("payment not found: {payment_id}")]
    PaymentNotFound { payment_id: String },

    #[error("payment {payment_id} is {status} and cannot be {operation}")]
    InvalidState {
        payment_id: String,
        status: PaymentStatus,
        operation: &'static str,
    },

    #[error("payment {payment_id} settles on the {method} rail and cannot be {operation}")]
    MethodMismatch {
        payment_id: String,
        method: PaymentMethod,
        operation: &'static str,
    },

    #[error("payment {payment_id} has no transaction reference")]
    MissingTransactionReference { payment_id: String },

    #[error("invalid wallet address: {address}")]
    InvalidWalletAddress { address: String },

    #[error("invalid transaction hash: {hash}")]
    InvalidTransactionHash { hash: String },
}

impl DomainError {
    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        }
    }

    pub fn payment_not_found(payment_id: impl Into<String>) -> Self {
        Self::PaymentNotFound {
            payment_id: payment_id.into(),
        }
    }

    pub fn invalid_state(
        payment_id: impl Into<String>,
        status: PaymentStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            payment_id: payment_id.into(),
            status,
            operation,
        }
    }

    pub fn invalid_wallet_address(address: impl Into<String>) -> Self {
        Self::InvalidWalletAddress {
            address: address.into(),
        }
    }

    pub fn invalid_transaction_hash(hash: impl Into<String>) -> Self {
        Self::InvalidTransactionHash { hash: hash.into() }
    }
}
