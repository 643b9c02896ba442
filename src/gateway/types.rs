use serde::{Deserialize, Serialize};

/// Single-use token for a tokenized card. Charges reference the token, never
/// raw card data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardToken {
    pub token: String,
}

/// Reconciliation identifiers attached to every charge and refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeMetadata {
    pub order_id: String,
    pub payment_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub token: String,
    /// Amount in the currency's minor unit (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub metadata: ChargeMetadata,
}

/// The gateway's answer to a charge. `paid` is authoritative: a response with
/// `paid == false` is a failed settlement even when the HTTP call succeeded.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeReceipt {
    pub paid: bool,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    pub reference: String,
}
