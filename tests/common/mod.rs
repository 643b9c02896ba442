//! In-memory doubles for the coordinator's collaborator ports.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use railpay_backend::cache::error::{CacheError, CacheResult};
use railpay_backend::cache::payment_cache::PaymentCache;
use railpay_backend::chains::evm::errors::EvmResult;
use railpay_backend::chains::evm::{EvmNode, TxReceipt};
use railpay_backend::database::error::{DatabaseError, DatabaseResult};
use railpay_backend::database::repository::{PaymentPage, PaymentStore};
use railpay_backend::domain::{CardDetails, ChainTxStatus, Payment, PaymentStatus};
use railpay_backend::events::{EventError, EventPublisher, PaymentEventKind};
use railpay_backend::gateway::error::{GatewayError, GatewayResult};
use railpay_backend::gateway::types::{CardToken, ChargeMetadata, ChargeReceipt, ChargeRequest, RefundReceipt};
use railpay_backend::gateway::CardGateway;
use railpay_backend::services::notification::{NotificationError, PaymentNotifier};
use railpay_backend::services::{
    CardSettlementService, ChainSettlementService, LifecycleConfig, PaymentLifecycle,
};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    payments: Mutex<HashMap<String, Payment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create(&self, payment: &Payment) -> DatabaseResult<Payment> {
        let persisted = payment.clone().with_id(Uuid::new_v4().to_string());
        self.payments
            .lock()
            .await
            .insert(persisted.id().to_string(), persisted.clone());
        Ok(persisted)
    }

    async fn get_by_id(&self, id: &str) -> DatabaseResult<Option<Payment>> {
        Ok(self.payments.lock().await.get(id).cloned())
    }

    async fn get_by_order(&self, order_id: &str) -> DatabaseResult<Vec<Payment>> {
        Ok(self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| p.order_id() == order_id)
            .cloned()
            .collect())
    }

    async fn get_by_user(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> DatabaseResult<PaymentPage> {
        let all: Vec<Payment> = self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        let total = all.len() as i64;
        let start = ((page.max(1) - 1) * limit) as usize;
        let payments = all.into_iter().skip(start).take(limit as usize).collect();
        Ok(PaymentPage { payments, total })
    }

    async fn update(&self, payment: &Payment) -> DatabaseResult<()> {
        let mut payments = self.payments.lock().await;
        if !payments.contains_key(payment.id()) {
            return Err(DatabaseError::not_found("Payment", payment.id()));
        }
        payments.insert(payment.id().to_string(), payment.clone());
        Ok(())
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> DatabaseResult<()> {
        let mut payments = self.payments.lock().await;
        let current = payments
            .get(id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Payment", id))?;
        let mut snapshot = current.snapshot();
        snapshot.status = status;
        payments.insert(id.to_string(), Payment::from_snapshot(snapshot));
        Ok(())
    }

    async fn find_open(&self, _hours_back: i32) -> DatabaseResult<Vec<Payment>> {
        let mut open: Vec<Payment> = self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|p| p.created_at());
        Ok(open)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Cache double. With `fail = true` every operation errors, which must never
/// fail a settlement call.
pub struct MemoryCache {
    pub fail: bool,
    payments: Mutex<HashMap<String, Payment>>,
    statuses: Mutex<HashMap<String, ChainTxStatus>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            fail: false,
            payments: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            payments: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    fn check(&self) -> CacheResult<()> {
        if self.fail {
            Err(CacheError::ConnectionError("cache is down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentCache for MemoryCache {
    async fn get_payment(&self, payment_id: &str) -> CacheResult<Option<Payment>> {
        self.check()?;
        Ok(self.payments.lock().await.get(payment_id).cloned())
    }

    async fn set_payment(&self, payment: &Payment) -> CacheResult<()> {
        self.check()?;
        self.payments
            .lock()
            .await
            .insert(payment.id().to_string(), payment.clone());
        Ok(())
    }

    async fn delete_payment(&self, payment_id: &str) -> CacheResult<()> {
        self.check()?;
        self.payments.lock().await.remove(payment_id);
        Ok(())
    }

    async fn get_order_payments(&self, _order_id: &str) -> CacheResult<Option<Vec<Payment>>> {
        self.check()?;
        Ok(None)
    }

    async fn set_order_payments(
        &self,
        _order_id: &str,
        _payments: &[Payment],
    ) -> CacheResult<()> {
        self.check()
    }

    async fn delete_order_payments(&self, _order_id: &str) -> CacheResult<()> {
        self.check()
    }

    async fn get_user_page(
        &self,
        _user_id: &str,
        _page: i64,
        _limit: i64,
    ) -> CacheResult<Option<(Vec<Payment>, i64)>> {
        self.check()?;
        Ok(None)
    }

    async fn set_user_page(
        &self,
        _user_id: &str,
        _page: i64,
        _limit: i64,
        _payments: &[Payment],
        _total: i64,
    ) -> CacheResult<()> {
        self.check()
    }

    async fn get_transaction_status(&self, tx_hash: &str) -> CacheResult<Option<ChainTxStatus>> {
        self.check()?;
        Ok(self.statuses.lock().await.get(tx_hash).copied())
    }

    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        status: ChainTxStatus,
    ) -> CacheResult<()> {
        self.check()?;
        self.statuses
            .lock()
            .await
            .insert(tx_hash.to_string(), status);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events and notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<(PaymentEventKind, PaymentStatus)>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn kinds(&self) -> Vec<PaymentEventKind> {
        self.events.lock().await.iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, kind: PaymentEventKind, payment: &Payment) -> Result<(), EventError> {
        if self.fail {
            return Err(EventError::Connection {
                message: "event bus is down".to_string(),
            });
        }
        self.events.lock().await.push((kind, payment.status()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub confirmations: AtomicUsize,
    pub failures: AtomicUsize,
    pub refunds: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn payment_confirmation(&self, _payment: &Payment) -> Result<(), NotificationError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn payment_failure(&self, _payment: &Payment) -> Result<(), NotificationError> {
        self.failures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refund_confirmation(&self, _payment: &Payment) -> Result<(), NotificationError> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Card gateway
// ---------------------------------------------------------------------------

pub struct MockGateway {
    pub paid: bool,
    pub charge_error: Option<GatewayError>,
    pub refund_error: Option<GatewayError>,
    pub tokenize_calls: AtomicUsize,
    pub charge_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
}

impl MockGateway {
    pub fn paying() -> Self {
        Self {
            paid: true,
            charge_error: None,
            refund_error: None,
            tokenize_calls: AtomicUsize::new(0),
            charge_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            paid: false,
            ..Self::paying()
        }
    }
}

#[async_trait]
impl CardGateway for MockGateway {
    async fn tokenize(&self, _card: &CardDetails) -> GatewayResult<CardToken> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CardToken {
            token: "tok_test".to_string(),
        })
    }

    async fn charge(&self, request: ChargeRequest) -> GatewayResult<ChargeReceipt> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.charge_error {
            return Err(err.clone());
        }
        Ok(ChargeReceipt {
            paid: self.paid,
            reference: format!("ch_{}", request.metadata.payment_id),
        })
    }

    async fn refund(
        &self,
        charge_reference: &str,
        _metadata: ChargeMetadata,
    ) -> GatewayResult<RefundReceipt> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.refund_error {
            return Err(err.clone());
        }
        Ok(RefundReceipt {
            reference: format!("re_{}", charge_reference),
        })
    }
}

// ---------------------------------------------------------------------------
// Chain node
// ---------------------------------------------------------------------------

pub struct MockNode {
    pub receipt: Mutex<Option<TxReceipt>>,
    pub height: AtomicU64,
    pub receipt_calls: AtomicUsize,
}

impl MockNode {
    pub fn unobserved() -> Self {
        Self {
            receipt: Mutex::new(None),
            height: AtomicU64::new(100),
            receipt_calls: AtomicUsize::new(0),
        }
    }

    pub async fn mine(&self, tx_hash: &str, block: u64, succeeded: bool) {
        *self.receipt.lock().await = Some(TxReceipt {
            transaction_hash: tx_hash.to_string(),
            block_number: block,
            succeeded,
        });
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }
}

#[async_trait]
impl EvmNode for MockNode {
    async fn transaction_receipt(&self, _tx_hash: &str) -> EvmResult<Option<TxReceipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.receipt.lock().await.clone())
    }

    async fn block_number(&self) -> EvmResult<u64> {
        Ok(self.height.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub const CONTRACT: &str = "0x000000000000000000000000000000000000dEaD";
pub const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
pub const TX_HASH: &str = "0x4e3a3754410177e6937ef1f84bba68ea139e8d1a2258c5f85db9f1cd715a1bdd";

pub struct Harness {
    pub lifecycle: PaymentLifecycle,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub events: Arc<RecordingPublisher>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<MockGateway>,
    pub node: Arc<MockNode>,
}

pub fn harness(gateway: MockGateway, node: MockNode) -> Harness {
    harness_with(gateway, node, MemoryCache::new(), RecordingPublisher::new())
}

pub fn harness_with(
    gateway: MockGateway,
    node: MockNode,
    cache: MemoryCache,
    events: RecordingPublisher,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(cache);
    let events = Arc::new(events);
    let notifier = Arc::new(RecordingNotifier::new());
    let gateway = Arc::new(gateway);
    let node = Arc::new(node);

    let lifecycle = PaymentLifecycle::new(
        store.clone(),
        cache.clone(),
        events.clone(),
        notifier.clone(),
        CardSettlementService::new(gateway.clone()),
        ChainSettlementService::new(node.clone(), CONTRACT, 6),
        LifecycleConfig::default(),
    );

    Harness {
        lifecycle,
        store,
        cache,
        events,
        notifier,
        gateway,
        node,
    }
}

pub fn valid_card() -> CardDetails {
    CardDetails {
        card_number: "4532015112830366".to_string(),
        expiry_month: "12".to_string(),
        expiry_year: "2099".to_string(),
        cvv: "123".to_string(),
        holder_name: "Ada Lovelace".to_string(),
    }
}
