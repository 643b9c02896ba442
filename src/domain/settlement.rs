//! Settlement inputs and the orchestrator outcome type

use serde::{Deserialize, Serialize};

/// Card data for a single settlement call. Never persisted.
#[derive(Clone, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub holder_name: String,
}

// PAN and CVV stay out of logs and error output.
impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &mask_pan(&self.card_number))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

fn mask_pan(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "****".to_string();
    }
    format!("****{}", &digits[digits.len() - 4..])
}

/// On-chain transfer details for the chain rail.
///
/// The transaction hash is filled progressively: empty after initiation, set
/// once the client submits the transaction and calls back to confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransfer {
    pub wallet_address: String,
    pub contract_address: String,
    pub transaction_hash: Option<String>,
    /// Amount in the chain's smallest integer unit, derived from the payment
    /// amount with arbitrary-precision arithmetic.
    pub amount_wei: String,
}

/// Derived read-only status of a chain transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainTxStatus {
    Pending,
    Confirming,
    Confirmed,
    Failed,
}

impl ChainTxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTxStatus::Pending => "PENDING",
            ChainTxStatus::Confirming => "CONFIRMING",
            ChainTxStatus::Confirmed => "CONFIRMED",
            ChainTxStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ChainTxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a settlement attempt, produced by a rail orchestrator and
/// consumed only by the lifecycle coordinator, which maps it onto an entity
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The rail settled the payment; `reference` is the external charge id or
    /// transaction hash.
    Succeeded { reference: String },
    /// The attempt failed. `retryable` distinguishes transient gateway and
    /// network faults from validation and on-chain execution failures.
    Failed { reason: String, retryable: bool },
    /// The rail has not reached finality yet; `poll_token` identifies what to
    /// re-check later.
    Pending { poll_token: String },
}

impl SettlementOutcome {
    pub fn succeeded(reference: impl Into<String>) -> Self {
        Self::Succeeded {
            reference: reference.into(),
        }
    }

    pub fn failed(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Failed {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn pending(poll_token: impl Into<String>) -> Self {
        Self::Pending {
            poll_token: poll_token.into(),
        }
    }
}
