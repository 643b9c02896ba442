//! EVM wire types and hex helpers

use serde::{Deserialize, Serialize};

use crate::chains::evm::errors::{EvmError, EvmResult};

/// Decoded transaction receipt, reduced to the fields the settlement logic
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Whether on-chain execution succeeded (`status == 0x1`).
    pub succeeded: bool,
}

/// Raw JSON-RPC receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: String,
    /// Null while the transaction is not yet included in a block.
    pub block_number: Option<String>,
    pub status: Option<String>,
}

impl RawReceipt {
    /// A receipt without a block number is treated as not yet observed.
    pub fn into_receipt(self) -> EvmResult<Option<TxReceipt>> {
        let Some(block_hex) = self.block_number else {
            return Ok(None);
        };
        Ok(Some(TxReceipt {
            block_number: parse_hex_u64(&block_hex)?,
            succeeded: self.status.as_deref() == Some("0x1"),
            transaction_hash: self.transaction_hash,
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> EvmResult<u64> {
    let trimmed = value
        .strip_prefix("0x")
        .ok_or_else(|| EvmError::invalid_response(format!("not a hex quantity: {}", value)))?;
    u64::from_str_radix(trimmed, 16)
        .map_err(|_| EvmError::invalid_response(format!("not a hex quantity: {}", value)))
}
