use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Card-network gateway errors.
///
/// Transport-level failures are retryable; a decline is a final answer from
/// the network and is not.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("charge declined: {message}")]
    Declined {
        message: String,
        decline_code: Option<String>,
    },

    #[error("gateway network error: {message}")]
    Network { message: String },

    #[error("gateway request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("gateway rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("unexpected gateway response: {message}")]
    InvalidResponse { message: String },

    #[error("gateway configuration error: {message}")]
    Config { message: String },
}

impl GatewayError {
    pub fn declined(message: impl Into<String>, decline_code: Option<String>) -> Self {
        Self::Declined {
            message: message.into(),
            decline_code,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::timeout(0)
        } else {
            GatewayError::network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(GatewayError::network("reset").is_retryable());
        assert!(GatewayError::timeout(30).is_retryable());
        assert!(GatewayError::RateLimited { retry_after: None }.is_retryable());
        assert!(!GatewayError::declined("insufficient funds", None).is_retryable());
        assert!(!GatewayError::invalid_response("truncated body").is_retryable());
    }
}
