//! Outbound port for entitlement record persistence.

use async_trait::async_trait;

use crate::domain::entitlement::EntitlementRecord;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

/// Persistence interface for entitlement records.
///
/// Records are keyed by subscription id. `upsert` replaces all fields of an
/// existing row; there is no partial update. Implementations must make the
/// write idempotent so replayed events converge on the same row.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts or fully replaces the record with the same subscription id.
    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), DomainError>;

    /// Deletes the record with the given subscription id.
    ///
    /// Returns `Ok(false)` when no such record existed; deleting an absent
    /// record is not an error.
    async fn delete(&self, id: &SubscriptionId) -> Result<bool, DomainError>;

    /// Deletes every record the user holds except the one with the given
    /// subscription id. Returns the number of rows removed.
    async fn delete_superseded(
        &self,
        user_id: &UserId,
        keep: &SubscriptionId,
    ) -> Result<u64, DomainError>;

    /// Finds a record by subscription id.
    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<EntitlementRecord>, DomainError>;

    /// Finds the user's record, if they have one.
    ///
    /// A user has at most one record; when storage holds more than one row
    /// for the user, implementations return the most recently created.
    async fn find_by_user(&self, user_id: &UserId)
        -> Result<Option<EntitlementRecord>, DomainError>;
}
