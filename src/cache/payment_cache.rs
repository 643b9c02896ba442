//! Payment-scoped cache operations behind a mockable trait

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::{keys, RedisPool};
use crate::domain::{ChainTxStatus, Payment, PaymentSnapshot};

/// Cache port used by the lifecycle coordinator.
///
/// Every operation is best-effort: callers log failures and continue, and a
/// read failure is indistinguishable from a miss.
#[async_trait]
pub trait PaymentCache: Send + Sync {
    async fn get_payment(&self, payment_id: &str) -> CacheResult<Option<Payment>>;

    async fn set_payment(&self, payment: &Payment) -> CacheResult<()>;

    async fn delete_payment(&self, payment_id: &str) -> CacheResult<()>;

    async fn get_order_payments(&self, order_id: &str) -> CacheResult<Option<Vec<Payment>>>;

    async fn set_order_payments(&self, order_id: &str, payments: &[Payment]) -> CacheResult<()>;

    async fn delete_order_payments(&self, order_id: &str) -> CacheResult<()>;

    async fn get_user_page(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> CacheResult<Option<(Vec<Payment>, i64)>>;

    async fn set_user_page(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
        payments: &[Payment],
        total: i64,
    ) -> CacheResult<()>;

    async fn get_transaction_status(&self, tx_hash: &str) -> CacheResult<Option<ChainTxStatus>>;

    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        status: ChainTxStatus,
    ) -> CacheResult<()>;
}

/// Cached page of a user's payment history.
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedUserPage {
    payments: Vec<PaymentSnapshot>,
    total: i64,
}

/// Redis-backed implementation over the bb8 pool
#[derive(Clone)]
pub struct RedisPaymentCache {
    pool: RedisPool,
    /// TTL for payment and order entries, seconds.
    detail_ttl: u64,
    /// TTL for chain transaction status entries, seconds. Short, because the
    /// status advances with every mined block.
    status_ttl: u64,
}

impl RedisPaymentCache {
    pub fn new(pool: RedisPool, detail_ttl: u64, status_ttl: u64) -> Self {
        Self {
            pool,
            detail_ttl,
            status_ttl,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> CacheResult<Option<T>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: u64,
    ) -> CacheResult<()> {
        let data = serde_json::to_string(value)?;
        let mut conn = self.pool.get().await?;
        let _: () = conn.set_ex(key, data, ttl).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentCache for RedisPaymentCache {
    async fn get_payment(&self, payment_id: &str) -> CacheResult<Option<Payment>> {
        let key = keys::payment::DetailKey::new(payment_id).to_string();
        let snapshot: Option<PaymentSnapshot> = self.get_json(&key).await?;
        Ok(snapshot.map(Payment::from_snapshot))
    }

    async fn set_payment(&self, payment: &Payment) -> CacheResult<()> {
        if payment.id().is_empty() {
            return Err(CacheError::OperationError(
                "cannot cache a payment without an id".to_string(),
            ));
        }
        let key = keys::payment::DetailKey::new(payment.id()).to_string();
        self.set_json(&key, &payment.snapshot(), self.detail_ttl).await
    }

    async fn delete_payment(&self, payment_id: &str) -> CacheResult<()> {
        let key = keys::payment::DetailKey::new(payment_id).to_string();
        self.delete(&key).await
    }

    async fn get_order_payments(&self, order_id: &str) -> CacheResult<Option<Vec<Payment>>> {
        let key = keys::order::PaymentsKey::new(order_id).to_string();
        let snapshots: Option<Vec<PaymentSnapshot>> = self.get_json(&key).await?;
        Ok(snapshots.map(|list| list.into_iter().map(Payment::from_snapshot).collect()))
    }

    async fn set_order_payments(&self, order_id: &str, payments: &[Payment]) -> CacheResult<()> {
        let key = keys::order::PaymentsKey::new(order_id).to_string();
        let snapshots: Vec<PaymentSnapshot> = payments.iter().map(Payment::snapshot).collect();
        self.set_json(&key, &snapshots, self.detail_ttl).await
    }

    async fn delete_order_payments(&self, order_id: &str) -> CacheResult<()> {
        let key = keys::order::PaymentsKey::new(order_id).to_string();
        self.delete(&key).await
    }

    async fn get_user_page(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> CacheResult<Option<(Vec<Payment>, i64)>> {
        let key = keys::user::PaymentsKey::new(user_id, page, limit).to_string();
        let cached: Option<CachedUserPage> = self.get_json(&key).await?;
        Ok(cached.map(|page| {
            let payments = page
                .payments
                .into_iter()
                .map(Payment::from_snapshot)
                .collect();
            (payments, page.total)
        }))
    }

    async fn set_user_page(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
        payments: &[Payment],
        total: i64,
    ) -> CacheResult<()> {
        let key = keys::user::PaymentsKey::new(user_id, page, limit).to_string();
        let cached = CachedUserPage {
            payments: payments.iter().map(Payment::snapshot).collect(),
            total,
        };
        self.set_json(&key, &cached, self.detail_ttl).await
    }

    async fn get_transaction_status(&self, tx_hash: &str) -> CacheResult<Option<ChainTxStatus>> {
        let key = keys::transaction::StatusKey::new(tx_hash).to_string();
        self.get_json(&key).await
    }

    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        status: ChainTxStatus,
    ) -> CacheResult<()> {
        let key = keys::transaction::StatusKey::new(tx_hash).to_string();
        self.set_json(&key, &status, self.status_ttl).await
    }
}
