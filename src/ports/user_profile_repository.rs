//! Outbound port for user profile rows.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// Access to user profile rows: the denormalized `is_subscribed` flag and
/// the email used to locate the user's processor customer.
///
/// The flag is a convenience for fast lookups; the entitlement record remains
/// the authoritative source. Callers treat flag write failures as non-fatal.
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// Sets the user's subscription flag.
    async fn set_subscribed(&self, user_id: &UserId, subscribed: bool) -> Result<(), DomainError>;

    /// Reads the user's subscription flag. Absent users read as `false`.
    async fn is_subscribed(&self, user_id: &UserId) -> Result<bool, DomainError>;

    /// Looks up the email on the user's profile, used to locate their
    /// processor customer during reconciliation.
    async fn find_email(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;
}
