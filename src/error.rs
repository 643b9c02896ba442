//! Unified error handling for the railpay backend
//!
//! Module-level errors (domain, database, cache, gateway, chain node, events)
//! convert into a single [`AppError`] at the service boundary. The kind
//! taxonomy drives HTTP status mapping, machine-readable error codes and the
//! retryable flag callers use to decide whether to back off and try again.

use serde::{Deserialize, Serialize};

use crate::cache::error::CacheError;
use crate::chains::evm::errors::EvmError;
use crate::config::ConfigError;
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::domain::DomainError;
use crate::events::EventError;
use crate::gateway::error::GatewayError;

/// Machine-readable error codes for client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Domain errors (4xx)
    PaymentNotFound,
    InvalidPaymentState,
    MissingTransactionReference,
    ValidationError,

    // Infrastructure errors (5xx)
    DatabaseError,
    CacheError,
    EventPublishError,
    ConfigurationError,

    // External errors (502, 503, 504)
    CardGatewayError,
    ChainNodeError,
    RateLimitError,
    ExternalServiceTimeout,

    InternalError,
}

/// Infrastructure-level failures (database, cache, event bus, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Cache { message: String },
    Events { message: String },
    Configuration { message: String },
}

/// External collaborator failures (card gateway, chain node)
#[derive(Debug, Clone)]
pub enum ExternalError {
    CardGateway { message: String, is_retryable: bool },
    ChainNode { message: String, is_retryable: bool },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    Timeout { service: String, timeout_secs: u64 },
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::InvalidState { .. } | DomainError::MethodMismatch { .. } => 409,
                DomainError::MissingTransactionReference { .. } => 422,
                DomainError::EmptyOrderId
                | DomainError::EmptyUserId
                | DomainError::EmptyCurrency
                | DomainError::InvalidAmount { .. }
                | DomainError::InvalidPaymentMethod { .. }
                | DomainError::InvalidWalletAddress { .. }
                | DomainError::InvalidTransactionHash { .. } => 400,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::CardGateway { .. } => 502,
                ExternalError::ChainNode { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
        }
    }

    /// Machine-readable code for the response envelope
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::InvalidState { .. } | DomainError::MethodMismatch { .. } => {
                    ErrorCode::InvalidPaymentState
                }
                DomainError::MissingTransactionReference { .. } => {
                    ErrorCode::MissingTransactionReference
                }
                _ => ErrorCode::ValidationError,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Events { .. } => ErrorCode::EventPublishError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::CardGateway { .. } => ErrorCode::CardGatewayError,
                ExternalError::ChainNode { .. } => ErrorCode::ChainNodeError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
        }
    }

    /// User-facing message. Infrastructure details are never leaked.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => err.to_string(),
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::CardGateway { is_retryable, .. } => {
                    if *is_retryable {
                        "Card gateway is temporarily unavailable. Please try again".to_string()
                    } else {
                        "Card payment could not be processed".to_string()
                    }
                }
                ExternalError::ChainNode { is_retryable, .. } => {
                    if *is_retryable {
                        "Chain node is temporarily unavailable. Please try again".to_string()
                    } else {
                        "Chain transaction could not be verified".to_string()
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => match retry_after {
                    Some(secs) => format!(
                        "Rate limit exceeded for {}. Please try again in {} seconds",
                        service, secs
                    ),
                    None => format!("Rate limit exceeded for {}. Please try again later", service),
                },
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds. Please try again",
                    service, timeout_secs
                ),
            },
        }
    }

    /// Whether the caller may retry the same request with backoff.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Events { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::CardGateway { is_retryable, .. } => *is_retryable,
                ExternalError::ChainNode { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::new(AppErrorKind::Domain(err))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let kind = match err.kind() {
            DatabaseErrorKind::NotFound { id, .. } => {
                AppErrorKind::Domain(DomainError::payment_not_found(id.clone()))
            }
            _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: err.to_string(),
        }))
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Events {
            message: err.to_string(),
        }))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: err.to_string(),
            },
        ))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let kind = match &err {
            GatewayError::RateLimited { retry_after } => {
                AppErrorKind::External(ExternalError::RateLimit {
                    service: "card gateway".to_string(),
                    retry_after: *retry_after,
                })
            }
            GatewayError::Timeout { seconds } => AppErrorKind::External(ExternalError::Timeout {
                service: "card gateway".to_string(),
                timeout_secs: *seconds,
            }),
            _ => AppErrorKind::External(ExternalError::CardGateway {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}

impl From<EvmError> for AppError {
    fn from(err: EvmError) -> Self {
        let kind = match &err {
            EvmError::RateLimitError => AppErrorKind::External(ExternalError::RateLimit {
                service: "chain node".to_string(),
                retry_after: None,
            }),
            EvmError::TimeoutError { seconds } => AppErrorKind::External(ExternalError::Timeout {
                service: "chain node".to_string(),
                timeout_secs: *seconds,
            }),
            _ => AppErrorKind::External(ExternalError::ChainNode {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_not_found_maps_to_404() {
        let error = AppError::from(DomainError::payment_not_found("pay_1"));
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::PaymentNotFound);
        assert!(!error.is_retryable());
    }

    #[test]
    fn invalid_state_maps_to_409() {
        let error = AppError::from(DomainError::invalid_state(
            "pay_1",
            crate::domain::PaymentStatus::Pending,
            "refunded",
        ));
        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::InvalidPaymentState);
    }

    #[test]
    fn validation_errors_map_to_400() {
        let error = AppError::from(DomainError::invalid_wallet_address("bogus"));
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn gateway_network_error_is_retryable_502() {
        let error = AppError::from(GatewayError::network("connection reset"));
        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::CardGatewayError);
        assert!(error.is_retryable());
    }

    #[test]
    fn chain_timeout_maps_to_504() {
        let error = AppError::from(EvmError::timeout_error(15));
        assert_eq!(error.status_code(), 504);
        assert_eq!(error.error_code(), ErrorCode::ExternalServiceTimeout);
        assert!(error.is_retryable());
    }

    #[test]
    fn infrastructure_message_is_not_leaked() {
        let error = AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Database {
                message: "password authentication failed for user".to_string(),
                is_retryable: false,
            },
        ));
        assert!(!error.user_message().contains("password"));
    }
}
