//! PostgreSQL implementation of UserProfileRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::UserProfileRepository;

/// PostgreSQL implementation of the UserProfileRepository port.
///
/// Profiles are created lazily: setting the flag for a user without a row
/// inserts one, and reading an absent row yields `false`.
pub struct PostgresUserProfileRepository {
    pool: PgPool,
}

impl PostgresUserProfileRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserProfileRepository for PostgresUserProfileRepository {
    async fn set_subscribed(&self, user_id: &UserId, subscribed: bool) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, is_subscribed, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                is_subscribed = EXCLUDED.is_subscribed,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(subscribed)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to set subscription flag: {}", e),
            )
        })?;

        Ok(())
    }

    async fn is_subscribed(&self, user_id: &UserId) -> Result<bool, DomainError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_subscribed FROM user_profiles WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to read subscription flag: {}", e),
                    )
                })?;

        Ok(flag.unwrap_or(false))
    }

    async fn find_email(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        let email: Option<Option<String>> =
            sqlx::query_scalar("SELECT email FROM user_profiles WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to read profile email: {}", e),
                    )
                })?;

        Ok(email.flatten())
    }
}
