//! Payment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use crate::api::{error_response, AppState};
use crate::domain::{CardDetails, DomainError, Payment, PaymentMethod};
use crate::services::NewPaymentRequest;

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PaymentResponse {
    fn from_payment(payment: &Payment) -> Self {
        Self {
            id: payment.id().to_string(),
            order_id: payment.order_id().to_string(),
            user_id: payment.user_id().to_string(),
            amount: payment.amount().to_string(),
            currency: payment.currency().to_string(),
            status: payment.status().to_string(),
            payment_method: payment.method().to_string(),
            transaction_reference: payment.transaction_reference().map(str::to_string),
            error_message: payment.error_message().map(str::to_string),
            created_at: payment.created_at().to_rfc3339(),
            updated_at: payment.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
    /// Decimal amount as a string, e.g. "100.00". Strings keep float noise
    /// out of money values.
    pub amount: String,
    pub currency: String,
    pub payment_method: String,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Response {
    let amount = match BigDecimal::from_str(request.amount.trim()) {
        Ok(amount) => amount,
        Err(_) => {
            return error_response(
                &DomainError::invalid_amount(request.amount, "not a decimal number").into(),
            )
        }
    };
    let method = match PaymentMethod::from_str(&request.payment_method) {
        Ok(method) => method,
        Err(e) => return error_response(&e.into()),
    };

    info!(order_id = %request.order_id, method = %method, "payment initiation requested");

    match state
        .lifecycle
        .initiate_payment(NewPaymentRequest {
            order_id: request.order_id,
            user_id: request.user_id,
            amount,
            currency: request.currency,
            method,
        })
        .await
    {
        Ok(payment) => (
            StatusCode::CREATED,
            Json(PaymentResponse::from_payment(&payment)),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CardPaymentRequest {
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub holder_name: String,
}

pub async fn charge_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CardPaymentRequest>,
) -> Response {
    let card = CardDetails {
        card_number: request.card_number,
        expiry_month: request.expiry_month,
        expiry_year: request.expiry_year,
        cvv: request.cvv,
        holder_name: request.holder_name,
    };

    match state.lifecycle.settle_card(&id, card).await {
        Ok(payment) => Json(PaymentResponse::from_payment(&payment)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainInitiateRequest {
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
pub struct ChainPaymentResponse {
    pub payment: PaymentResponse,
    pub wallet_address: String,
    pub contract_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub amount_wei: String,
}

pub async fn initiate_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChainInitiateRequest>,
) -> Response {
    match state
        .lifecycle
        .initiate_chain(&id, &request.wallet_address)
        .await
    {
        Ok((payment, transfer)) => Json(ChainPaymentResponse {
            payment: PaymentResponse::from_payment(&payment),
            wallet_address: transfer.wallet_address,
            contract_address: transfer.contract_address,
            transaction_hash: transfer.transaction_hash,
            amount_wei: transfer.amount_wei,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainConfirmRequest {
    pub transaction_hash: String,
}

pub async fn confirm_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChainConfirmRequest>,
) -> Response {
    match state
        .lifecycle
        .confirm_chain(&id, &request.transaction_hash)
        .await
    {
        Ok(payment) => Json(PaymentResponse::from_payment(&payment)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainStatusQuery {
    pub transaction_hash: String,
}

#[derive(Debug, Serialize)]
pub struct ChainStatusResponse {
    pub transaction_hash: String,
    pub status: String,
}

pub async fn chain_status(
    State(state): State<AppState>,
    Path(_id): Path<String>,
    Query(query): Query<ChainStatusQuery>,
) -> Response {
    match state.lifecycle.chain_status(&query.transaction_hash).await {
        Ok(status) => Json(ChainStatusResponse {
            transaction_hash: query.transaction_hash,
            status: status.to_string(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn refund_payment(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.lifecycle.refund(&id).await {
        Ok(payment) => Json(PaymentResponse::from_payment(&payment)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_payment(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.lifecycle.get_payment(&id).await {
        Ok(payment) => Json(PaymentResponse::from_payment(&payment)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
}

pub async fn get_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Response {
    match state.lifecycle.get_order_payments(&order_id).await {
        Ok(payments) => Json(PaymentListResponse {
            payments: payments.iter().map(PaymentResponse::from_payment).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct UserPaymentsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct PagedPaymentsResponse {
    pub payments: Vec<PaymentResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub async fn get_user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserPaymentsQuery>,
) -> Response {
    match state
        .lifecycle
        .get_user_payments(&user_id, query.page, query.limit)
        .await
    {
        Ok(page) => Json(PagedPaymentsResponse {
            payments: page
                .payments
                .iter()
                .map(PaymentResponse::from_payment)
                .collect(),
            total: page.total,
            page: query.page,
            limit: query.limit,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_pending_payments(State(state): State<AppState>) -> Response {
    match state.lifecycle.get_pending_payments().await {
        Ok(payments) => Json(PaymentListResponse {
            payments: payments.iter().map(PaymentResponse::from_payment).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}
