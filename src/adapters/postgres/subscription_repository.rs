//! PostgreSQL implementation of SubscriptionRepository.
//!
//! One row per subscription, keyed by the processor-assigned id. Upserts
//! replace every column so replayed events converge on the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::domain::entitlement::{EntitlementRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an entitlement record.
///
/// `metadata` is a JSONB column read back as text; the pool is configured
/// without sqlx JSON support, so the cast happens in SQL.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: String,
    status: String,
    price_ref: Option<String>,
    quantity: i32,
    cancel_at_period_end: bool,
    created_at: DateTime<Utc>,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    cancel_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    trial_start: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    metadata: String,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, status, price_ref, quantity, cancel_at_period_end,
           created_at, current_period_start, current_period_end,
           ended_at, cancel_at, canceled_at, trial_start, trial_end,
           metadata::text AS metadata
    FROM subscriptions
"#;

impl TryFrom<SubscriptionRow> for EntitlementRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let metadata: HashMap<String, String> = serde_json::from_str(&row.metadata)
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid metadata: {}", e))
            })?;

        Ok(EntitlementRecord {
            id: SubscriptionId::new(row.id).map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid subscription id: {}", e),
                )
            })?,
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            status: SubscriptionStatus::parse(&row.status),
            price_ref: row.price_ref,
            quantity: u32::try_from(row.quantity).unwrap_or(1),
            cancel_at_period_end: row.cancel_at_period_end,
            created_at: Timestamp::from_datetime(row.created_at),
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            ended_at: row.ended_at.map(Timestamp::from_datetime),
            cancel_at: row.cancel_at.map(Timestamp::from_datetime),
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            trial_start: row.trial_start.map(Timestamp::from_datetime),
            trial_end: row.trial_end.map(Timestamp::from_datetime),
            metadata,
        })
    }
}

fn encode_metadata(metadata: &HashMap<String, String>) -> Result<String, DomainError> {
    serde_json::to_string(metadata).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to encode metadata: {}", e),
        )
    })
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), DomainError> {
        let metadata = encode_metadata(&record.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, price_ref, quantity, cancel_at_period_end,
                created_at, current_period_start, current_period_end,
                ended_at, cancel_at, canceled_at, trial_start, trial_end,
                metadata, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15::jsonb, NOW()
            )
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                status = EXCLUDED.status,
                price_ref = EXCLUDED.price_ref,
                quantity = EXCLUDED.quantity,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                created_at = EXCLUDED.created_at,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                ended_at = EXCLUDED.ended_at,
                cancel_at = EXCLUDED.cancel_at,
                canceled_at = EXCLUDED.canceled_at,
                trial_start = EXCLUDED.trial_start,
                trial_end = EXCLUDED.trial_end,
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.user_id.as_str())
        .bind(record.status.as_str())
        .bind(&record.price_ref)
        .bind(i32::try_from(record.quantity).unwrap_or(i32::MAX))
        .bind(record.cancel_at_period_end)
        .bind(record.created_at.as_datetime())
        .bind(record.current_period_start.as_datetime())
        .bind(record.current_period_end.as_datetime())
        .bind(record.ended_at.as_ref().map(Timestamp::as_datetime))
        .bind(record.cancel_at.as_ref().map(Timestamp::as_datetime))
        .bind(record.canceled_at.as_ref().map(Timestamp::as_datetime))
        .bind(record.trial_start.as_ref().map(Timestamp::as_datetime))
        .bind(record.trial_end.as_ref().map(Timestamp::as_datetime))
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to upsert subscription: {}", e),
            )
        })?;

        Ok(())
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to delete subscription: {}", e),
                )
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_superseded(
        &self,
        user_id: &UserId,
        keep: &SubscriptionId,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND id <> $2")
            .bind(user_id.as_str())
            .bind(keep.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to delete superseded subscriptions: {}", e),
                )
            })?;

        Ok(result.rows_affected())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to find subscription: {}", e),
                    )
                })?;

        row.map(EntitlementRecord::try_from).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        // A user should have one row; if history left several, the newest
        // subscription wins.
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find subscription: {}", e),
            )
        })?;

        row.map(EntitlementRecord::try_from).transpose()
    }
}
