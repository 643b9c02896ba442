use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::repository::{PaymentPage, PaymentStore};
use crate::domain::{Payment, PaymentMethod, PaymentSnapshot, PaymentStatus};

/// Stored payment row. Status and method are kept as text in the database;
/// the total mapping to the typed enums lives here and nowhere else.
#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    pub id: Uuid,
    pub order_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    pub transaction_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> DatabaseResult<Payment> {
        let status = PaymentStatus::from_db_str(&self.status).ok_or_else(|| {
            DatabaseError::corrupted(format!(
                "payment {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        let method = PaymentMethod::from_db_str(&self.payment_method).ok_or_else(|| {
            DatabaseError::corrupted(format!(
                "payment {} has unknown method '{}'",
                self.id, self.payment_method
            ))
        })?;

        Ok(Payment::from_snapshot(PaymentSnapshot {
            id: self.id.to_string(),
            order_id: self.order_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            status,
            method,
            transaction_reference: self.transaction_reference,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }))
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount, currency, status, payment_method, \
     transaction_reference, error_message, created_at, updated_at";

/// Postgres-backed payment store
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored identifiers that do not parse are treated as not-found rather
    /// than surfaced as a failure.
    fn parse_id(id: &str) -> Option<Uuid> {
        Uuid::parse_str(id).ok()
    }
}

#[async_trait]
impl PaymentStore for PgPaymentRepository {
    async fn create(&self, payment: &Payment) -> DatabaseResult<Payment> {
        let snapshot = payment.snapshot();
        let id = Uuid::new_v4();

        let row = sqlx::query_as::<_, PaymentRow>(
            "INSERT INTO payments \
             (id, order_id, user_id, amount, currency, status, payment_method, \
              transaction_reference, error_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id, order_id, user_id, amount, currency, status, payment_method, \
                       transaction_reference, error_message, created_at, updated_at",
        )
        .bind(id)
        .bind(&snapshot.order_id)
        .bind(&snapshot.user_id)
        .bind(&snapshot.amount)
        .bind(&snapshot.currency)
        .bind(snapshot.status.as_db_str())
        .bind(snapshot.method.as_db_str())
        .bind(&snapshot.transaction_reference)
        .bind(&snapshot.error_message)
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.into_payment()
    }

    async fn get_by_id(&self, id: &str) -> DatabaseResult<Option<Payment>> {
        let Some(uuid) = Self::parse_id(id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn get_by_order(&self, order_id: &str) -> DatabaseResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn get_by_user(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
    ) -> DatabaseResult<PaymentPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let payments = rows
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect::<DatabaseResult<Vec<_>>>()?;

        Ok(PaymentPage { payments, total })
    }

    async fn update(&self, payment: &Payment) -> DatabaseResult<()> {
        let snapshot = payment.snapshot();
        let uuid = Self::parse_id(&snapshot.id)
            .ok_or_else(|| DatabaseError::not_found("Payment", snapshot.id.clone()))?;

        let result = sqlx::query(
            "UPDATE payments \
             SET status = $2, transaction_reference = $3, error_message = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(uuid)
        .bind(snapshot.status.as_db_str())
        .bind(&snapshot.transaction_reference)
        .bind(&snapshot.error_message)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", snapshot.id));
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: PaymentStatus) -> DatabaseResult<()> {
        let uuid =
            Self::parse_id(id).ok_or_else(|| DatabaseError::not_found("Payment", id))?;

        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(uuid)
        .bind(status.as_db_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", id));
        }
        Ok(())
    }

    async fn find_open(&self, hours_back: i32) -> DatabaseResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments \
             WHERE status IN ('PENDING', 'PROCESSING') \
               AND created_at > NOW() - INTERVAL '1 hour' * $1 \
             ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        ))
        .bind(hours_back)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }
}
