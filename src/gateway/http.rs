//! HTTP client for the card-network gateway

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::CardDetails;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::types::{CardToken, ChargeMetadata, ChargeReceipt, ChargeRequest, RefundReceipt};
use crate::gateway::{CardGateway, GatewayConfig};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
    paid: bool,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
    decline_code: Option<String>,
}

pub struct HttpCardGateway {
    config: GatewayConfig,
    http: Client,
}

impl HttpCardGateway {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(20)
            .user_agent("railpay-backend/1.0")
            .build()
            .map_err(|e| GatewayError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> GatewayResult<T> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.config.secret_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::timeout(self.config.timeout_secs)
                } else {
                    GatewayError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::invalid_response(e.to_string()));
        }

        let body: GatewayErrorBody = response.json().await.unwrap_or(GatewayErrorBody {
            message: None,
            decline_code: None,
        });
        let message = body
            .message
            .unwrap_or_else(|| format!("gateway returned HTTP {}", status));

        match status {
            StatusCode::PAYMENT_REQUIRED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(GatewayError::declined(message, body.decline_code))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited { retry_after: None }),
            s if s.is_server_error() => Err(GatewayError::network(message)),
            _ => Err(GatewayError::invalid_response(message)),
        }
    }
}

#[async_trait]
impl CardGateway for HttpCardGateway {
    async fn tokenize(&self, card: &CardDetails) -> GatewayResult<CardToken> {
        let payload = json!({
            "card": {
                "number": card.card_number,
                "exp_month": card.expiry_month,
                "exp_year": card.expiry_year,
                "cvc": card.cvv,
                "name": card.holder_name,
            }
        });

        let raw: TokenResponse = self.post_json("/v1/tokens", &payload).await?;
        debug!("card tokenized");
        Ok(CardToken { token: raw.id })
    }

    async fn charge(&self, request: ChargeRequest) -> GatewayResult<ChargeReceipt> {
        let payload = json!({
            "amount": request.amount_minor,
            "currency": request.currency,
            "source": request.token,
            "description": request.description,
            "metadata": {
                "order_id": request.metadata.order_id,
                "payment_id": request.metadata.payment_id,
                "customer_id": request.metadata.user_id,
            }
        });

        let raw: ChargeResponse = self.post_json("/v1/charges", &payload).await?;
        info!(
            reference = %raw.id,
            paid = raw.paid,
            order_id = %request.metadata.order_id,
            "card charge submitted"
        );

        Ok(ChargeReceipt {
            paid: raw.paid,
            reference: raw.id,
        })
    }

    async fn refund(
        &self,
        charge_reference: &str,
        metadata: ChargeMetadata,
    ) -> GatewayResult<RefundReceipt> {
        let payload = json!({
            "charge": charge_reference,
            "metadata": {
                "order_id": metadata.order_id,
                "payment_id": metadata.payment_id,
                "customer_id": metadata.user_id,
            }
        });

        let raw: RefundResponse = self.post_json("/v1/refunds", &payload).await?;
        info!(reference = %raw.id, charge = %charge_reference, "refund submitted");

        Ok(RefundReceipt { reference: raw.id })
    }
}
