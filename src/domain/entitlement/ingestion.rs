//! Webhook event ingestion.
//!
//! Translates verified processor events into entitlement store writes:
//!
//! - `checkout.session.completed` - fetch the new subscription from the
//!   processor (with a short retry, it may not be visible yet) and record it
//! - `customer.subscription.created` / `.updated` - record the subscription
//!   state carried in the event
//! - `customer.subscription.deleted` - remove the record
//!
//! Everything else is acknowledged and skipped. Events that cannot be
//! attributed to a user are logged and skipped rather than failed, so the
//! processor does not redeliver what we can never process.

use std::sync::Arc;
use std::time::Duration;

use super::processor_event::{
    CheckoutSessionObject, ProcessorEvent, ProcessorEventType, SubscriptionObject,
};
use super::record::EntitlementRecord;
use super::store::EntitlementStore;
use super::webhook_errors::WebhookError;
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::ports::{ProcessorClient, ProcessorSubscription};

/// Attempts to fetch the subscription after checkout, including the first.
const CHECKOUT_FETCH_ATTEMPTS: u32 = 3;

/// Delay between checkout fetch attempts.
const CHECKOUT_FETCH_DELAY: Duration = Duration::from_secs(1);

/// What ingestion did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// A record was written.
    Recorded {
        user_id: UserId,
        subscription_id: SubscriptionId,
        entitled: bool,
    },
    /// A record was removed.
    Removed {
        user_id: UserId,
        subscription_id: SubscriptionId,
    },
    /// Event acknowledged without a store write.
    Skipped(&'static str),
}

/// Processes verified webhook events into store writes.
pub struct EventIngestionHandler {
    store: Arc<EntitlementStore>,
    processor: Arc<dyn ProcessorClient>,
    require_livemode: bool,
}

impl EventIngestionHandler {
    pub fn new(
        store: Arc<EntitlementStore>,
        processor: Arc<dyn ProcessorClient>,
        require_livemode: bool,
    ) -> Self {
        Self {
            store,
            processor,
            require_livemode,
        }
    }

    /// Handles a verified event.
    ///
    /// Returns an error only for conditions worth a processor redelivery
    /// (storage or processor API failures). Malformed-but-verified payloads
    /// and unattributable events are skipped.
    pub async fn handle_event(
        &self,
        event: &ProcessorEvent,
    ) -> Result<IngestionOutcome, WebhookError> {
        if self.require_livemode && event.is_test() {
            tracing::warn!(event_id = %event.id, "test mode event ignored");
            return Ok(IngestionOutcome::Skipped("test event ignored in live mode"));
        }

        match event.parsed_type() {
            ProcessorEventType::CheckoutSessionCompleted => {
                self.handle_checkout_completed(event).await
            }
            ProcessorEventType::SubscriptionCreated | ProcessorEventType::SubscriptionUpdated => {
                self.handle_subscription_changed(event).await
            }
            ProcessorEventType::SubscriptionDeleted => {
                self.handle_subscription_deleted(event).await
            }
            ProcessorEventType::Unknown => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "unhandled event type"
                );
                Ok(IngestionOutcome::Skipped("unhandled event type"))
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        event: &ProcessorEvent,
    ) -> Result<IngestionOutcome, WebhookError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(user_ref) = session.user_ref() else {
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                "checkout session carries no user reference"
            );
            return Ok(IngestionOutcome::Skipped("no user reference on session"));
        };
        let user_id =
            UserId::new(user_ref).map_err(|_| WebhookError::MissingField("client_reference_id"))?;

        let Some(subscription_ref) = session.subscription.as_deref() else {
            return Ok(IngestionOutcome::Skipped("session has no subscription"));
        };

        let Some(snapshot) = self.fetch_subscription_with_retry(subscription_ref).await? else {
            // The subscription.created/.updated events will carry the state
            // once the processor makes it visible.
            tracing::warn!(
                event_id = %event.id,
                subscription_ref,
                "subscription not visible after checkout; deferring to later events"
            );
            return Ok(IngestionOutcome::Skipped("subscription not yet visible"));
        };

        self.record_snapshot(user_id, &snapshot).await
    }

    async fn handle_subscription_changed(
        &self,
        event: &ProcessorEvent,
    ) -> Result<IngestionOutcome, WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(user_id) = self.resolve_user(&subscription).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                "subscription event cannot be attributed to a user"
            );
            return Ok(IngestionOutcome::Skipped("no user attribution"));
        };

        let snapshot = subscription.into_snapshot()?;
        self.record_snapshot(user_id, &snapshot).await
    }

    async fn handle_subscription_deleted(
        &self,
        event: &ProcessorEvent,
    ) -> Result<IngestionOutcome, WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(user_id) = self.resolve_user(&subscription).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                "deleted subscription cannot be attributed to a user"
            );
            return Ok(IngestionOutcome::Skipped("no user attribution"));
        };

        let subscription_id = SubscriptionId::new(subscription.id.clone())
            .map_err(|_| WebhookError::MissingField("id"))?;

        self.store
            .remove(&subscription_id, &user_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        Ok(IngestionOutcome::Removed {
            user_id,
            subscription_id,
        })
    }

    /// Resolves the owning user: subscription metadata first, then the
    /// existing store record for the same subscription id.
    async fn resolve_user(
        &self,
        subscription: &SubscriptionObject,
    ) -> Result<Option<UserId>, WebhookError> {
        if let Some(user_ref) = subscription.user_ref() {
            let user_id =
                UserId::new(user_ref).map_err(|_| WebhookError::MissingField("user_id"))?;
            return Ok(Some(user_id));
        }

        let Ok(subscription_id) = SubscriptionId::new(subscription.id.clone()) else {
            return Ok(None);
        };

        let existing = self
            .store
            .find_by_subscription(&subscription_id)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        Ok(existing.map(|record| record.user_id))
    }

    async fn record_snapshot(
        &self,
        user_id: UserId,
        snapshot: &ProcessorSubscription,
    ) -> Result<IngestionOutcome, WebhookError> {
        let record = EntitlementRecord::from_snapshot(user_id.clone(), snapshot);
        let subscription_id = record.id.clone();
        let entitled = record.entitled();

        self.store
            .record(record)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        Ok(IngestionOutcome::Recorded {
            user_id,
            subscription_id,
            entitled,
        })
    }

    /// Fetches the subscription, retrying on transient failure and on
    /// not-yet-visible. The processor commits the subscription slightly after
    /// the checkout event fires.
    async fn fetch_subscription_with_retry(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<ProcessorSubscription>, WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for attempt in 1..=CHECKOUT_FETCH_ATTEMPTS {
            match self.processor.get_subscription(subscription_ref).await {
                Ok(Some(snapshot)) => return Ok(Some(snapshot)),
                Ok(None) => {
                    tracing::debug!(subscription_ref, attempt, "subscription not yet visible");
                    last_err = None;
                }
                Err(err) => {
                    tracing::warn!(
                        subscription_ref,
                        attempt,
                        error = %err,
                        "subscription fetch failed"
                    );
                    last_err = Some(WebhookError::Processor(err.to_string()));
                }
            }

            if attempt < CHECKOUT_FETCH_ATTEMPTS {
                tokio::time::sleep(CHECKOUT_FETCH_DELAY).await;
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}
