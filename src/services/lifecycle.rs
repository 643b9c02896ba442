//! Payment lifecycle coordinator
//!
//! The single orchestration point for settlements. It selects the rail by
//! payment method, invokes the matching orchestrator, maps the outcome onto
//! an entity transition, and dispatches side effects in a fixed order:
//! persist (fatal on failure), cache (best-effort), event (at-most-once),
//! email (best-effort). Persistence gates success because the entity state
//! must be durable before it is reported; everything after it must never roll
//! back a durable change.
//!
//! Per-payment serialization: every mutating operation holds an async lock
//! keyed by payment id, so two settlement attempts against the same payment
//! cannot interleave. Unrelated payments proceed in parallel.

use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::cache::payment_cache::PaymentCache;
use crate::database::repository::{PaymentPage, PaymentStore};
use crate::domain::{
    CardDetails, ChainTransfer, ChainTxStatus, DomainError, Payment, PaymentMethod,
    SettlementOutcome,
};
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::events::{EventPublisher, PaymentEventKind};
use crate::services::card_settlement::CardSettlementService;
use crate::services::chain_settlement::ChainSettlementService;
use crate::services::notification::PaymentNotifier;

/// Coordinator tuning knobs.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How far back `get_pending_payments` looks for open payments, in hours.
    pub pending_window_hours: i32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pending_window_hours: 24,
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Self {
        Self {
            pending_window_hours: std::env::var("PENDING_WINDOW_HOURS")
                .ok()
                .and_then(|v| v.parse::<i32>().ok())
                .unwrap_or(24),
        }
    }
}

/// Input for creating a payment.
#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: PaymentMethod,
}

/// Async mutexes keyed by payment id.
///
/// The slot map is swept opportunistically once it grows past a bound;
/// entries still held by an in-flight operation survive the sweep.
struct PaymentLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

const LOCK_SWEEP_THRESHOLD: usize = 1024;

impl PaymentLocks {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, payment_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() > LOCK_SWEEP_THRESHOLD {
                slots.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            slots
                .entry(payment_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

/// The coordinator. Holds every collaborator behind its port so tests can
/// substitute in-memory doubles.
pub struct PaymentLifecycle {
    store: Arc<dyn PaymentStore>,
    cache: Arc<dyn PaymentCache>,
    events: Arc<dyn EventPublisher>,
    notifier: Arc<dyn PaymentNotifier>,
    card: CardSettlementService,
    chain: ChainSettlementService,
    locks: PaymentLocks,
    config: LifecycleConfig,
}

impl PaymentLifecycle {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        cache: Arc<dyn PaymentCache>,
        events: Arc<dyn EventPublisher>,
        notifier: Arc<dyn PaymentNotifier>,
        card: CardSettlementService,
        chain: ChainSettlementService,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            notifier,
            card,
            chain,
            locks: PaymentLocks::new(),
            config,
        }
    }

    /// Create a new PENDING payment, persist it and announce it.
    pub async fn initiate_payment(&self, request: NewPaymentRequest) -> AppResult<Payment> {
        let payment = Payment::new(
            request.order_id,
            request.user_id,
            request.amount,
            request.currency,
            request.method,
        )?;

        let payment = self.store.create(&payment).await?;

        info!(
            payment_id = %payment.id(),
            order_id = %payment.order_id(),
            method = %payment.method(),
            amount = %payment.amount(),
            "payment created"
        );

        if let Err(e) = self.cache.set_payment(&payment).await {
            warn!(payment_id = %payment.id(), error = %e, "failed to cache payment");
        }
        if let Err(e) = self.cache.delete_order_payments(payment.order_id()).await {
            warn!(order_id = %payment.order_id(), error = %e, "failed to invalidate order cache");
        }
        if let Err(e) = self.events.publish(PaymentEventKind::Created, &payment).await {
            warn!(payment_id = %payment.id(), error = %e, "failed to publish created event");
        }

        Ok(payment)
    }

    /// Settle a card payment: validate, tokenize, charge, apply the outcome.
    ///
    /// Calling this on an already-COMPLETED payment short-circuits to the
    /// current state without touching the gateway.
    pub async fn settle_card(&self, payment_id: &str, card: CardDetails) -> AppResult<Payment> {
        let _guard = self.locks.acquire(payment_id).await;

        let mut payment = self.load(payment_id).await?;
        self.require_method(&payment, PaymentMethod::Card, "charged on the card rail")?;

        if payment.is_completed() {
            info!(payment_id = %payment.id(), "payment already completed, skipping charge");
            return Ok(payment);
        }
        if !payment.is_open() {
            return Err(DomainError::invalid_state(
                payment.id().to_string(),
                payment.status(),
                "settled; create a fresh payment to retry",
            )
            .into());
        }

        payment.mark_processing();
        let outcome = self.card.charge(&payment, &card).await;
        let kind = Self::apply_outcome(&mut payment, outcome);
        self.finish(&payment, kind).await?;

        Ok(payment)
    }

    /// Bind a wallet address to a chain payment and return the transfer
    /// parameters for the client wallet. No on-chain submission happens here.
    pub async fn initiate_chain(
        &self,
        payment_id: &str,
        wallet_address: &str,
    ) -> AppResult<(Payment, ChainTransfer)> {
        let _guard = self.locks.acquire(payment_id).await;

        let mut payment = self.load(payment_id).await?;
        self.require_method(&payment, PaymentMethod::Chain, "initiated on the chain rail")?;

        if payment.is_completed() {
            // Short-circuit: echo the stored settlement instead of
            // re-initiating.
            let mut transfer = self.chain.initiate(&payment, wallet_address)?;
            transfer.transaction_hash = payment.transaction_reference().map(str::to_string);
            info!(payment_id = %payment.id(), "payment already completed, skipping initiation");
            return Ok((payment, transfer));
        }
        if !payment.is_open() {
            return Err(DomainError::invalid_state(
                payment.id().to_string(),
                payment.status(),
                "initiated; create a fresh payment to retry",
            )
            .into());
        }

        let transfer = self.chain.initiate(&payment, wallet_address)?;
        payment.mark_processing();
        self.finish(&payment, PaymentEventKind::StatusUpdated).await?;

        Ok((payment, transfer))
    }

    /// Verify a submitted chain transaction and apply the outcome. Pending
    /// leaves the payment PROCESSING with the hash recorded for a later
    /// re-check; callers (or the confirmation monitor) call again until the
    /// confirmation depth is reached.
    pub async fn confirm_chain(
        &self,
        payment_id: &str,
        transaction_hash: &str,
    ) -> AppResult<Payment> {
        let _guard = self.locks.acquire(payment_id).await;

        let mut payment = self.load(payment_id).await?;
        self.require_method(&payment, PaymentMethod::Chain, "confirmed on the chain rail")?;

        if payment.is_completed() {
            info!(payment_id = %payment.id(), "payment already completed, skipping verification");
            return Ok(payment);
        }
        if !payment.is_open() {
            return Err(DomainError::invalid_state(
                payment.id().to_string(),
                payment.status(),
                "confirmed",
            )
            .into());
        }

        // Node transport failures propagate here and leave the entity
        // untouched; only a definite on-chain answer moves the state machine.
        let outcome = self.chain.verify(&payment, transaction_hash).await?;
        let kind = Self::apply_outcome(&mut payment, outcome);
        self.finish(&payment, kind).await?;

        Ok(payment)
    }

    /// Refund a COMPLETED card payment.
    ///
    /// A gateway failure leaves the payment COMPLETED and surfaces a typed
    /// retryable error; marking it FAILED would clobber a successful charge.
    pub async fn refund(&self, payment_id: &str) -> AppResult<Payment> {
        let _guard = self.locks.acquire(payment_id).await;

        let mut payment = self.load(payment_id).await?;
        self.require_method(&payment, PaymentMethod::Card, "refunded")?;

        if !payment.is_completed() {
            return Err(DomainError::invalid_state(
                payment.id().to_string(),
                payment.status(),
                "refunded",
            )
            .into());
        }

        match self.card.refund(&payment).await? {
            SettlementOutcome::Succeeded { reference } => {
                info!(
                    payment_id = %payment.id(),
                    refund_reference = %reference,
                    "refund applied"
                );
                payment.refund()?;
                self.finish(&payment, PaymentEventKind::Refunded).await?;
                Ok(payment)
            }
            SettlementOutcome::Failed { reason, retryable } => {
                Err(AppError::new(AppErrorKind::External(
                    ExternalError::CardGateway {
                        message: reason,
                        is_retryable: retryable,
                    },
                )))
            }
            SettlementOutcome::Pending { .. } => Err(AppError::new(AppErrorKind::External(
                ExternalError::CardGateway {
                    message: "gateway returned an unexpected pending refund".to_string(),
                    is_retryable: true,
                },
            ))),
        }
    }

    /// Cache-first payment read.
    pub async fn get_payment(&self, payment_id: &str) -> AppResult<Payment> {
        match self.cache.get_payment(payment_id).await {
            Ok(Some(payment)) => return Ok(payment),
            Ok(None) => {}
            Err(e) => warn!(payment_id = %payment_id, error = %e, "payment cache read failed"),
        }

        let payment = self.load(payment_id).await?;
        if let Err(e) = self.cache.set_payment(&payment).await {
            warn!(payment_id = %payment_id, error = %e, "failed to cache payment");
        }
        Ok(payment)
    }

    pub async fn get_order_payments(&self, order_id: &str) -> AppResult<Vec<Payment>> {
        match self.cache.get_order_payments(order_id).await {
            Ok(Some(payments)) => return Ok(payments),
            Ok(None) => {}
            Err(e) => warn!(order_id = %order_id, error = %e, "order cache read failed"),
        }

        let payments = self.store.get_by_order(order_id).await?;
        if let Err(e) = self.cache.set_order_payments(order_id, &payments).await {
            warn!(order_id = %order_id, error = %e, "failed to cache order payments");
        }
        Ok(payments)
    }

    pub async fn get_user_payments(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> AppResult<PaymentPage> {
        match self.cache.get_user_page(user_id, page, limit).await {
            Ok(Some((payments, total))) => return Ok(PaymentPage { payments, total }),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "user cache read failed"),
        }

        let page_result = self.store.get_by_user(user_id, page, limit).await?;
        if let Err(e) = self
            .cache
            .set_user_page(user_id, page, limit, &page_result.payments, page_result.total)
            .await
        {
            warn!(user_id = %user_id, error = %e, "failed to cache user payments");
        }
        Ok(page_result)
    }

    /// Open payments inside the configured window, oldest first.
    pub async fn get_pending_payments(&self) -> AppResult<Vec<Payment>> {
        Ok(self.store.find_open(self.config.pending_window_hours).await?)
    }

    /// Derived chain transaction status for read-only callers.
    pub async fn chain_status(&self, transaction_hash: &str) -> AppResult<ChainTxStatus> {
        match self.cache.get_transaction_status(transaction_hash).await {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => warn!(tx_hash = %transaction_hash, error = %e, "status cache read failed"),
        }

        let status = self.chain.poll_status(transaction_hash).await?;
        if let Err(e) = self
            .cache
            .set_transaction_status(transaction_hash, status)
            .await
        {
            warn!(tx_hash = %transaction_hash, error = %e, "failed to cache transaction status");
        }
        Ok(status)
    }

    async fn load(&self, payment_id: &str) -> AppResult<Payment> {
        self.store
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| DomainError::payment_not_found(payment_id).into())
    }

    fn require_method(
        &self,
        payment: &Payment,
        expected: PaymentMethod,
        operation: &'static str,
    ) -> AppResult<()> {
        if payment.method() != expected {
            return Err(DomainError::MethodMismatch {
                payment_id: payment.id().to_string(),
                method: payment.method(),
                operation,
            }
            .into());
        }
        Ok(())
    }

    /// Map a settlement outcome onto the entity transition it implies and
    /// return the matching lifecycle event.
    fn apply_outcome(payment: &mut Payment, outcome: SettlementOutcome) -> PaymentEventKind {
        match outcome {
            SettlementOutcome::Succeeded { reference } => {
                payment.mark_completed(reference);
                PaymentEventKind::Completed
            }
            SettlementOutcome::Failed { reason, .. } => {
                payment.mark_failed(reason);
                PaymentEventKind::Failed
            }
            SettlementOutcome::Pending { poll_token } => {
                payment.mark_processing();
                payment.record_transaction_reference(poll_token);
                PaymentEventKind::StatusUpdated
            }
        }
    }

    /// Side-effect dispatch in fixed order. Persistence failure is fatal to
    /// the call; cache, event and notification failures are logged and
    /// isolated.
    async fn finish(&self, payment: &Payment, kind: PaymentEventKind) -> AppResult<()> {
        self.store.update(payment).await?;

        if let Err(e) = self.cache.set_payment(payment).await {
            warn!(payment_id = %payment.id(), error = %e, "failed to refresh payment cache");
        }
        if let Err(e) = self.cache.delete_order_payments(payment.order_id()).await {
            warn!(order_id = %payment.order_id(), error = %e, "failed to invalidate order cache");
        }

        if let Err(e) = self.events.publish(kind, payment).await {
            warn!(payment_id = %payment.id(), error = %e, "failed to publish lifecycle event");
        }

        let notified = match kind {
            PaymentEventKind::Completed => Some(self.notifier.payment_confirmation(payment).await),
            PaymentEventKind::Failed => Some(self.notifier.payment_failure(payment).await),
            PaymentEventKind::Refunded => Some(self.notifier.refund_confirmation(payment).await),
            PaymentEventKind::Created | PaymentEventKind::StatusUpdated => None,
        };
        if let Some(Err(e)) = notified {
            warn!(payment_id = %payment.id(), error = %e, "failed to send notification");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_registry_serializes_same_key() {
        let locks = Arc::new(PaymentLocks::new());

        let guard = locks.acquire("pay_1").await;
        let contended = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("pay_1").await;
            })
        };

        // The second acquire cannot finish while the first guard is held.
        tokio::task::yield_now().await;
        assert!(!contended.is_finished());

        drop(guard);
        contended.await.unwrap();
    }

    #[tokio::test]
    async fn lock_registry_does_not_block_other_keys() {
        let locks = PaymentLocks::new();
        let _guard = locks.acquire("pay_1").await;
        // Must not deadlock.
        let _other = locks.acquire("pay_2").await;
    }

    #[tokio::test]
    async fn lock_sweep_keeps_held_slots() {
        let locks = PaymentLocks::new();
        let guard = locks.acquire("held").await;

        for i in 0..(LOCK_SWEEP_THRESHOLD + 2) {
            let _g = locks.acquire(&format!("pay_{}", i)).await;
        }

        let slots = locks.slots.lock().await;
        assert!(slots.contains_key("held"));
        assert!(slots.len() <= LOCK_SWEEP_THRESHOLD + 2);
        drop(slots);
        drop(guard);
    }
}
