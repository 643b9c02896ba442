//! JSON-RPC client for an EVM node

use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::chains::evm::errors::{EvmError, EvmResult};
use crate::chains::evm::types::{parse_hex_u64, RawReceipt, RpcRequest, RpcResponse, TxReceipt};

/// Chain node capability used by the chain settlement orchestrator.
#[async_trait]
pub trait EvmNode: Send + Sync {
    /// Fetch the receipt for a transaction hash. `None` means the node has
    /// not observed the transaction in a block yet.
    async fn transaction_receipt(&self, tx_hash: &str) -> EvmResult<Option<TxReceipt>>;

    /// Current chain head height.
    async fn block_number(&self) -> EvmResult<u64>;
}

/// EVM node configuration
#[derive(Debug, Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    /// Address of the payment contract clients transfer into.
    pub contract_address: String,
    /// Confirmation depth required before a transaction counts as final.
    /// Deployment-configured reorg-risk tolerance.
    pub min_confirmations: u64,
    pub request_timeout: Duration,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: String::new(),
            min_confirmations: 6,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl EvmConfig {
    pub fn from_env() -> EvmResult<Self> {
        Ok(Self {
            rpc_url: std::env::var("EVM_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            contract_address: std::env::var("PAYMENT_CONTRACT_ADDRESS").map_err(|_| {
                EvmError::config_error("PAYMENT_CONTRACT_ADDRESS environment variable is required")
            })?,
            min_confirmations: std::env::var("MIN_CONFIRMATIONS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(6),
            request_timeout: Duration::from_secs(
                std::env::var("EVM_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(15),
            ),
        })
    }

    pub fn validate(&self) -> EvmResult<()> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(EvmError::config_error("rpc url must be an http(s) URL"));
        }
        if self.min_confirmations == 0 {
            return Err(EvmError::config_error(
                "min confirmations must be at least 1",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(EvmError::config_error("request timeout must be non-zero"));
        }
        Ok(())
    }
}

/// JSON-RPC 2.0 client over HTTP
pub struct EvmRpcClient {
    http: Client,
    config: EvmConfig,
    request_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(config: EvmConfig) -> EvmResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(20)
            .user_agent("railpay-backend/1.0")
            .build()
            .map_err(|e| EvmError::config_error(format!("failed to create HTTP client: {}", e)))?;

        info!(rpc_url = %config.rpc_url, min_confirmations = config.min_confirmations, "EVM node client initialized");

        Ok(Self {
            http,
            config,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EvmConfig {
        &self.config
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> EvmResult<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = timeout(
            self.config.request_timeout,
            self.http.post(&self.config.rpc_url).json(&request).send(),
        )
        .await
        .map_err(|_| EvmError::timeout_error(self.config.request_timeout.as_secs()))??;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EvmError::RateLimitError);
        }
        let response = response
            .error_for_status()
            .map_err(|e| EvmError::network_error(format!("node returned error: {}", e)))?;

        let body: RpcResponse<T> = response.json().await.map_err(|e| {
            EvmError::invalid_response(format!("failed to decode RPC response: {}", e))
        })?;

        if let Some(err) = body.error {
            return Err(EvmError::rpc_error(err.code, err.message));
        }

        Ok(body.result)
    }
}

#[async_trait]
impl EvmNode for EvmRpcClient {
    async fn transaction_receipt(&self, tx_hash: &str) -> EvmResult<Option<TxReceipt>> {
        debug!(tx_hash = %tx_hash, "fetching transaction receipt");

        let raw: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
            .await?;

        match raw {
            Some(receipt) => receipt.into_receipt(),
            None => Ok(None),
        }
    }

    async fn block_number(&self) -> EvmResult<u64> {
        let raw: Option<String> = self.call("eth_blockNumber", serde_json::json!([])).await?;
        let hex = raw.ok_or_else(|| EvmError::invalid_response("eth_blockNumber returned null"))?;
        parse_hex_u64(&hex)
    }
}
