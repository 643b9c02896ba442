//! HTTP API surface
//!
//! Thin axum handlers over the lifecycle coordinator. Authentication and rate
//! limiting are transport concerns handled in front of this service.

pub mod payments;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::health::HealthChecker;
use crate::services::PaymentLifecycle;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<PaymentLifecycle>,
    pub health: Arc<HealthChecker>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

/// Map an [`AppError`] onto the JSON error envelope.
pub fn error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = serde_json::to_value(err.error_code())
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "INTERNAL_ERROR".to_string());

    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                code,
                message: err.user_message(),
                retryable: err.is_retryable(),
            },
        }),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    let status = state.health.check().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/payments", post(payments::create_payment))
        .route("/api/payments/pending", get(payments::get_pending_payments))
        .route("/api/payments/{id}", get(payments::get_payment))
        .route("/api/payments/{id}/card", post(payments::charge_card))
        .route("/api/payments/{id}/chain", post(payments::initiate_chain))
        .route(
            "/api/payments/{id}/chain/confirm",
            post(payments::confirm_chain),
        )
        .route(
            "/api/payments/{id}/chain/status",
            get(payments::chain_status),
        )
        .route("/api/payments/{id}/refund", post(payments::refund_payment))
        .route(
            "/api/orders/{order_id}/payments",
            get(payments::get_order_payments),
        )
        .route(
            "/api/users/{user_id}/payments",
            get(payments::get_user_payments),
        )
        .with_state(state)
}
