//! Domain events emitted when a user's entitlement state changes.
//!
//! Published after every successful store write so interested components
//! (the in-process entitlement cache in particular) can refresh instead of
//! serving stale state.

use serde::{Deserialize, Serialize};

use super::record::SubscriptionStatus;
use crate::domain::foundation::{DomainEvent, EventId, SubscriptionId, Timestamp, UserId};

/// A user's entitlement state was written to the store.
///
/// Carries the outcome, not the full record; subscribers that need details
/// re-read through the normal query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementChanged {
    /// Unique ID for this event instance.
    pub event_id: EventId,

    /// The user whose entitlement changed.
    pub user_id: UserId,

    /// The subscription involved.
    pub subscription_id: SubscriptionId,

    /// Subscription status after the change, absent when cleared.
    pub status: Option<SubscriptionStatus>,

    /// Whether the user is entitled after the change.
    pub entitled: bool,

    /// When the change was recorded.
    pub occurred_at: Timestamp,
}

impl EntitlementChanged {
    /// Event type string for routing.
    pub const EVENT_TYPE: &'static str = "entitlement.changed.v1";

    /// Creates an event for a recorded subscription.
    pub fn recorded(
        user_id: UserId,
        subscription_id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> Self {
        let entitled = status.entitles();
        Self {
            event_id: EventId::new(),
            user_id,
            subscription_id,
            status: Some(status),
            entitled,
            occurred_at: Timestamp::now(),
        }
    }

    /// Creates an event for a removed subscription.
    pub fn cleared(user_id: UserId, subscription_id: SubscriptionId) -> Self {
        Self {
            event_id: EventId::new(),
            user_id,
            subscription_id,
            status: None,
            entitled: false,
            occurred_at: Timestamp::now(),
        }
    }
}

impl DomainEvent for EntitlementChanged {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn aggregate_id(&self) -> String {
        self.user_id.to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Entitlement"
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn event_id(&self) -> EventId {
        self.event_id.clone()
    }
}
