//! EVM chain integration
//!
//! The settlement core only needs two reads from the node: a transaction
//! receipt and the current block height. Everything else about the chain rail
//! (unit conversion, confirmation thresholding, status derivation) lives in
//! the chain settlement orchestrator.

pub mod client;
pub mod errors;
pub mod types;

pub use client::{EvmConfig, EvmNode, EvmRpcClient};
pub use errors::{EvmError, EvmResult};
pub use types::TxReceipt;
