//! Card-network gateway capability
//!
//! The card orchestrator drives a tokenize -> charge -> (refund) sequence
//! through the [`CardGateway`] trait. Credentials live in an explicitly
//! constructed [`GatewayConfig`] owned by the client instance; there is no
//! process-global gateway state.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::domain::CardDetails;
use crate::gateway::error::GatewayResult;
use crate::gateway::types::{CardToken, ChargeMetadata, ChargeReceipt, ChargeRequest, RefundReceipt};

pub use self::http::HttpCardGateway;

#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Exchange raw card data for a single-use payment token.
    async fn tokenize(&self, card: &CardDetails) -> GatewayResult<CardToken>;

    /// Submit a charge for a previously obtained token.
    async fn charge(&self, request: ChargeRequest) -> GatewayResult<ChargeReceipt>;

    /// Refund a settled charge by its gateway reference.
    async fn refund(&self, charge_reference: &str, metadata: ChargeMetadata)
        -> GatewayResult<RefundReceipt>;
}

/// Card gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cardnetwork.example".to_string(),
            secret_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let secret_key = std::env::var("CARD_GATEWAY_SECRET_KEY").map_err(|_| {
            error::GatewayError::config("CARD_GATEWAY_SECRET_KEY environment variable is required")
        })?;

        Ok(Self {
            base_url: std::env::var("CARD_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.cardnetwork.example".to_string()),
            timeout_secs: std::env::var("CARD_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            secret_key,
        })
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.secret_key.trim().is_empty() {
            return Err(error::GatewayError::config("secret key must not be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(error::GatewayError::config(
                "base url must be an http(s) URL",
            ));
        }
        Ok(())
    }
}
