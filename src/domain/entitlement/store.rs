//! Entitlement store - the authoritative write path for entitlement state.
//!
//! Wraps the subscription repository and the denormalized profile flag so
//! every write goes through one place: the record is written first, the flag
//! follows, and a change event is published for in-process subscribers.
//!
//! Flag and event failures are deliberately non-fatal. The record is the
//! source of truth; the flag and the change signal are conveniences that the
//! next reconciliation repairs.

use std::sync::Arc;

use super::events::EntitlementChanged;
use super::record::EntitlementRecord;
use crate::domain::foundation::{
    DomainError, SerializableDomainEvent, SubscriptionId, UserId,
};
use crate::ports::{EventPublisher, SubscriptionRepository, UserProfileRepository};

/// Write-side service for entitlement records.
pub struct EntitlementStore {
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn UserProfileRepository>,
    events: Arc<dyn EventPublisher>,
}

impl EntitlementStore {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn UserProfileRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            events,
        }
    }

    /// Writes (or fully replaces) the record and updates the user's flag to
    /// match the record's entitlement.
    ///
    /// Last write wins: callers pass whatever snapshot they just obtained and
    /// the store does not compare recency. A flag write failure is logged and
    /// swallowed; the record write is what counts.
    pub async fn record(&self, record: EntitlementRecord) -> Result<(), DomainError> {
        self.subscriptions.upsert(&record).await?;

        let entitled = record.entitled();
        if let Err(err) = self.profiles.set_subscribed(&record.user_id, entitled).await {
            tracing::warn!(
                user_id = %record.user_id,
                subscription_id = %record.id,
                error = %err,
                "subscription flag update failed; record write stands"
            );
        }

        tracing::info!(
            user_id = %record.user_id,
            subscription_id = %record.id,
            status = %record.status,
            entitled,
            "entitlement recorded"
        );

        self.emit(EntitlementChanged::recorded(
            record.user_id.clone(),
            record.id.clone(),
            record.status.clone(),
        ))
        .await;

        Ok(())
    }

    /// Removes the record for an ended subscription and clears the user's
    /// flag. Removing an absent record is not an error.
    pub async fn remove(
        &self,
        id: &SubscriptionId,
        user_id: &UserId,
    ) -> Result<bool, DomainError> {
        let existed = self.subscriptions.delete(id).await?;

        if let Err(err) = self.profiles.set_subscribed(user_id, false).await {
            tracing::warn!(
                user_id = %user_id,
                subscription_id = %id,
                error = %err,
                "subscription flag update failed after removal"
            );
        }

        tracing::info!(user_id = %user_id, subscription_id = %id, existed, "entitlement removed");

        self.emit(EntitlementChanged::cleared(user_id.clone(), id.clone()))
            .await;

        Ok(existed)
    }

    /// Removes every record the user holds under a different subscription id.
    ///
    /// Called after reconciliation commits the authoritative subscription, so
    /// rows from a previous plan cannot shadow it on the by-user read. Flag
    /// and change event are not touched; the preceding `record` write already
    /// covered them.
    pub async fn prune_others(
        &self,
        user_id: &UserId,
        keep: &SubscriptionId,
    ) -> Result<u64, DomainError> {
        self.subscriptions.delete_superseded(user_id, keep).await
    }

    /// The user's current record, if any.
    pub async fn get(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, DomainError> {
        self.subscriptions.find_by_user(user_id).await
    }

    /// Looks up a record by subscription id. Used to attribute webhook events
    /// that carry no user reference.
    pub async fn find_by_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        self.subscriptions.find_by_id(id).await
    }

    /// The denormalized flag as currently stored on the user's profile.
    pub async fn flag(&self, user_id: &UserId) -> Result<bool, DomainError> {
        self.profiles.is_subscribed(user_id).await
    }

    async fn emit(&self, event: EntitlementChanged) {
        if let Err(err) = self.events.publish(event.to_envelope()).await {
            tracing::warn!(error = %err, "entitlement change event publish failed");
        }
    }
}
