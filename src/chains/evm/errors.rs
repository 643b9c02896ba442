use thiserror::Error;

pub type EvmResult<T> = Result<T, EvmError>;

#[derive(Debug, Error)]
pub enum EvmError {
    #[error("network error: {message}")]
    NetworkError { message: String },

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("rate limit exceeded. Please try again later")]
    RateLimitError,

    #[error("operation timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("unexpected node response: {message}")]
    InvalidResponse { message: String },

    #[error("configuration error: {message}")]
    ConfigError { message: String },
}

impl EvmError {
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn rpc_error(code: i64, message: impl Into<String>) -> Self {
        Self::RpcError {
            code,
            message: message.into(),
        }
    }

    pub fn timeout_error(seconds: u64) -> Self {
        Self::TimeoutError { seconds }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvmError::NetworkError { .. }
                | EvmError::TimeoutError { .. }
                | EvmError::RateLimitError
        )
    }
}

impl From<reqwest::Error> for EvmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EvmError::timeout_error(0)
        } else {
            EvmError::network_error(format!("request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for EvmError {
    fn from(err: serde_json::Error) -> Self {
        EvmError::invalid_response(format!("JSON error: {}", err))
    }
}
