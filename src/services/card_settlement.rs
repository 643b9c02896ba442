//! Card rail settlement orchestrator
//!
//! Validates card data and drives a tokenize -> charge -> (refund) sequence
//! against the card-network gateway. The orchestrator never mutates the
//! payment; it returns a [`SettlementOutcome`] for the lifecycle coordinator
//! to apply.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::domain::{CardDetails, DomainError, Payment, SettlementOutcome};
use crate::error::AppResult;
use crate::gateway::types::{ChargeMetadata, ChargeRequest};
use crate::gateway::CardGateway;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s-]").unwrap());
static DIGITS_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static CVV_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3,4}$").unwrap());

/// Result of fail-fast card validation; the first violation wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardValidationError {
    InvalidCardNumber,
    InvalidExpiryMonth,
    InvalidExpiryYear,
    CardExpired,
    InvalidCvv,
}

impl CardValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            CardValidationError::InvalidCardNumber => "invalid card number",
            CardValidationError::InvalidExpiryMonth => "invalid expiry month",
            CardValidationError::InvalidExpiryYear => "invalid expiry year",
            CardValidationError::CardExpired => "card has expired",
            CardValidationError::InvalidCvv => "invalid CVV",
        }
    }
}

/// Strip the separators people type into card numbers.
fn sanitize_card_number(number: &str) -> String {
    SEPARATORS.replace_all(number, "").into_owned()
}

/// Luhn checksum: from the rightmost digit, double every second digit moving
/// left, subtract 9 from doubled values above 9, sum; valid iff sum % 10 == 0.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;

    for ch in digits.chars().rev() {
        let mut digit = match ch.to_digit(10) {
            Some(d) => d,
            None => return false,
        };
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }

    sum % 10 == 0
}

fn is_valid_card_number(number: &str) -> bool {
    let number = sanitize_card_number(number);
    if !DIGITS_ONLY.is_match(&number) {
        return false;
    }
    if number.len() < 13 || number.len() > 19 {
        return false;
    }
    luhn_valid(&number)
}

fn is_valid_cvv(cvv: &str) -> bool {
    CVV_FORMAT.is_match(cvv)
}

/// Fail-fast validation in a fixed order: number, expiry month, expiry year,
/// expiration, CVV.
pub fn validate_card(card: &CardDetails) -> Result<(), CardValidationError> {
    if !is_valid_card_number(&card.card_number) {
        return Err(CardValidationError::InvalidCardNumber);
    }

    let month: u32 = card
        .expiry_month
        .parse()
        .map_err(|_| CardValidationError::InvalidExpiryMonth)?;
    if !(1..=12).contains(&month) {
        return Err(CardValidationError::InvalidExpiryMonth);
    }

    let now = Utc::now();
    let year: i32 = card
        .expiry_year
        .parse()
        .map_err(|_| CardValidationError::InvalidExpiryYear)?;
    if year < now.year() {
        return Err(CardValidationError::InvalidExpiryYear);
    }
    if year == now.year() && month < now.month() {
        return Err(CardValidationError::CardExpired);
    }

    if !is_valid_cvv(&card.cvv) {
        return Err(CardValidationError::InvalidCvv);
    }

    Ok(())
}

/// Convert a decimal amount to the currency's minor unit, rounding half-up.
/// Decimal arithmetic all the way; no floats.
fn minor_units(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

pub struct CardSettlementService {
    gateway: Arc<dyn CardGateway>,
}

impl CardSettlementService {
    pub fn new(gateway: Arc<dyn CardGateway>) -> Self {
        Self { gateway }
    }

    /// Validate the card and drive a tokenize -> charge sequence.
    ///
    /// Validation failures and gateway declines are settlement outcomes, not
    /// errors: the coordinator records them on the payment. Gateway transport
    /// failures come back retryable.
    pub async fn charge(&self, payment: &Payment, card: &CardDetails) -> SettlementOutcome {
        if let Err(violation) = validate_card(card) {
            warn!(
                payment_id = %payment.id(),
                reason = violation.reason(),
                "card validation failed"
            );
            return SettlementOutcome::failed(violation.reason(), false);
        }

        let Some(amount_minor) = minor_units(payment.amount()) else {
            return SettlementOutcome::failed("amount exceeds chargeable range", false);
        };

        let token = match self.gateway.tokenize(card).await {
            Ok(token) => token,
            Err(e) => {
                warn!(payment_id = %payment.id(), error = %e, "card tokenization failed");
                return SettlementOutcome::failed(
                    format!("failed to tokenize card: {}", e),
                    e.is_retryable(),
                );
            }
        };

        let request = ChargeRequest {
            token: token.token,
            amount_minor,
            currency: payment.currency().to_string(),
            description: format!("Payment for order {}", payment.order_id()),
            metadata: ChargeMetadata {
                order_id: payment.order_id().to_string(),
                payment_id: payment.id().to_string(),
                user_id: payment.user_id().to_string(),
            },
        };

        match self.gateway.charge(request).await {
            Ok(receipt) if receipt.paid => {
                info!(
                    payment_id = %payment.id(),
                    reference = %receipt.reference,
                    "card charge settled"
                );
                SettlementOutcome::succeeded(receipt.reference)
            }
            Ok(receipt) => {
                warn!(
                    payment_id = %payment.id(),
                    reference = %receipt.reference,
                    "gateway reported charge as unpaid"
                );
                SettlementOutcome::failed("charge was not paid", true)
            }
            Err(e) => {
                warn!(payment_id = %payment.id(), error = %e, "card charge failed");
                SettlementOutcome::failed(format!("failed to create charge: {}", e), e.is_retryable())
            }
        }
    }

    /// Refund a settled charge by the payment's transaction reference.
    ///
    /// A missing reference is a business-rule error; the payment is left
    /// untouched. Gateway failures come back as a retryable outcome so the
    /// coordinator can keep the payment COMPLETED.
    pub async fn refund(&self, payment: &Payment) -> AppResult<SettlementOutcome> {
        let reference = payment.transaction_reference().ok_or_else(|| {
            DomainError::MissingTransactionReference {
                payment_id: payment.id().to_string(),
            }
        })?;

        let metadata = ChargeMetadata {
            order_id: payment.order_id().to_string(),
            payment_id: payment.id().to_string(),
            user_id: payment.user_id().to_string(),
        };

        match self.gateway.refund(reference, metadata).await {
            Ok(receipt) => {
                info!(
                    payment_id = %payment.id(),
                    refund_reference = %receipt.reference,
                    "refund settled"
                );
                Ok(SettlementOutcome::succeeded(receipt.reference))
            }
            Err(e) => {
                warn!(payment_id = %payment.id(), error = %e, "refund failed");
                Ok(SettlementOutcome::failed(
                    format!("failed to create refund: {}", e),
                    e.is_retryable(),
                ))
            }
        }
    }
}
