//! End-to-end card rail scenarios against in-memory collaborators.

mod common;

use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use common::{harness, harness_with, valid_card, MemoryCache, MockGateway, MockNode, RecordingPublisher};
use railpay_backend::database::repository::PaymentStore;
use railpay_backend::domain::{CardDetails, PaymentMethod, PaymentStatus};
use railpay_backend::events::PaymentEventKind;
use railpay_backend::gateway::error::GatewayError;
use railpay_backend::services::NewPaymentRequest;

fn card_request(amount: &str) -> NewPaymentRequest {
    NewPaymentRequest {
        order_id: "order-1".to_string(),
        user_id: "user-1".to_string(),
        amount: BigDecimal::from_str(amount).unwrap(),
        currency: "USD".to_string(),
        method: PaymentMethod::Card,
    }
}

#[tokio::test]
async fn card_payment_happy_path() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("100.0")).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Pending);
    assert_eq!(payment.amount(), &BigDecimal::from_str("100.0").unwrap());
    assert_eq!(payment.method(), PaymentMethod::Card);
    assert!(!payment.id().is_empty());

    let settled = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();
    assert_eq!(settled.status(), PaymentStatus::Completed);
    assert!(settled.transaction_reference().is_some());

    // Durable state matches what the caller saw.
    let stored = h.store.get_by_id(payment.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), PaymentStatus::Completed);

    // Created then completed events, confirmation email sent.
    assert_eq!(
        h.events.kinds().await,
        vec![PaymentEventKind::Created, PaymentEventKind::Completed]
    );
    assert_eq!(h.notifier.confirmations.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.charge_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn settle_is_idempotent_on_completed_payment() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("50")).await.unwrap();
    let first = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();
    let second = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    assert_eq!(first.status(), PaymentStatus::Completed);
    assert_eq!(second.status(), PaymentStatus::Completed);
    assert_eq!(
        first.transaction_reference(),
        second.transaction_reference()
    );
    // The gateway was charged exactly once.
    assert_eq!(h.gateway.tokenize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.charge_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_card_fails_payment_without_gateway_call() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("50")).await.unwrap();
    let card = CardDetails {
        card_number: "4532015112830367".to_string(),
        ..valid_card()
    };

    let settled = h.lifecycle.settle_card(payment.id(), card).await.unwrap();
    assert_eq!(settled.status(), PaymentStatus::Failed);
    assert_eq!(settled.error_message(), Some("invalid card number"));

    assert_eq!(h.gateway.tokenize_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.gateway.charge_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.notifier.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declined_charge_marks_payment_failed() {
    let h = harness(MockGateway::declining(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("50")).await.unwrap();
    let settled = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    assert_eq!(settled.status(), PaymentStatus::Failed);
    assert_eq!(
        h.events.kinds().await,
        vec![PaymentEventKind::Created, PaymentEventKind::Failed]
    );
}

#[tokio::test]
async fn gateway_outage_fails_payment_with_retryable_reason() {
    let gateway = MockGateway {
        charge_error: Some(GatewayError::network("connection reset")),
        ..MockGateway::paying()
    };
    let h = harness(gateway, MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("50")).await.unwrap();
    let settled = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    // The failure is recorded, never silently dropped.
    assert_eq!(settled.status(), PaymentStatus::Failed);
    assert!(settled.error_message().unwrap().contains("charge"));
}

#[tokio::test]
async fn refund_succeeds_once_then_rejects() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("100.0")).await.unwrap();
    h.lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    let refunded = h.lifecycle.refund(payment.id()).await.unwrap();
    assert_eq!(refunded.status(), PaymentStatus::Refunded);
    assert_eq!(h.notifier.refunds.load(Ordering::SeqCst), 1);

    // Refunding a refunded payment is a business-rule error.
    let again = h.lifecycle.refund(payment.id()).await;
    assert!(again.is_err());
    let err = again.unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(h.gateway.refund_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refund_requires_completed_payment() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("100.0")).await.unwrap();
    let result = h.lifecycle.refund(payment.id()).await;

    assert!(result.is_err());
    assert_eq!(h.gateway.refund_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_gateway_refund_leaves_payment_completed() {
    let gateway = MockGateway {
        refund_error: Some(GatewayError::network("connection reset")),
        ..MockGateway::paying()
    };
    let h = harness(gateway, MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("100.0")).await.unwrap();
    h.lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    let result = h.lifecycle.refund(payment.id()).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_retryable());

    // The successful charge is not clobbered.
    let stored = h.store.get_by_id(payment.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), PaymentStatus::Completed);
}

#[tokio::test]
async fn cache_and_event_failures_do_not_fail_settlement() {
    let h = harness_with(
        MockGateway::paying(),
        MockNode::unobserved(),
        MemoryCache::failing(),
        RecordingPublisher::failing(),
    );

    let payment = h.lifecycle.initiate_payment(card_request("100.0")).await.unwrap();
    let settled = h
        .lifecycle
        .settle_card(payment.id(), valid_card())
        .await
        .unwrap();

    // Persistence gates success; cache and events are best-effort.
    assert_eq!(settled.status(), PaymentStatus::Completed);
    let stored = h.store.get_by_id(payment.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), PaymentStatus::Completed);
}

#[tokio::test]
async fn zero_amount_is_rejected_before_any_entity_exists() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let result = h.lifecycle.initiate_payment(card_request("0")).await;
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().status_code(), 400);
    assert!(h.store.find_open(24).await.unwrap().is_empty());
}

#[tokio::test]
async fn chain_operations_reject_card_payments() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("50")).await.unwrap();
    let result = h.lifecycle.initiate_chain(payment.id(), common::WALLET).await;

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().status_code(), 409);
}

#[tokio::test]
async fn reads_go_through_cache_and_store() {
    let h = harness(MockGateway::paying(), MockNode::unobserved());

    let payment = h.lifecycle.initiate_payment(card_request("75.50")).await.unwrap();

    let fetched = h.lifecycle.get_payment(payment.id()).await.unwrap();
    assert_eq!(fetched.id(), payment.id());

    let by_order = h.lifecycle.get_order_payments("order-1").await.unwrap();
    assert_eq!(by_order.len(), 1);

    let page = h.lifecycle.get_user_payments("user-1", 1, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.payments.len(), 1);

    let pending = h.lifecycle.get_pending_payments().await.unwrap();
    assert_eq!(pending.len(), 1);

    let missing = h.lifecycle.get_payment("2f4df3a4-9731-4254-a57f-3c8a9a1aee66").await;
    assert!(missing.is_err());
    assert_eq!(missing.unwrap_err().status_code(), 404);
}
