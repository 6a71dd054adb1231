//! Payment processor webhook event types.
//!
//! Defines the structures for parsing processor webhook payloads.
//! Only fields relevant to entitlement processing are captured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::record::SubscriptionStatus;
use super::webhook_errors::WebhookError;
use crate::domain::foundation::SubscriptionId;
use crate::ports::ProcessorSubscription;

/// Processor webhook event (simplified).
///
/// Contains the essential fields needed for webhook processing.
/// Additional fields from the processor's full event schema are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: ProcessorEventData,

    /// Whether this is a live mode event (vs test mode).
    pub livemode: bool,

    /// API version used to render this event.
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl ProcessorEvent {
    /// Returns true if this is a live mode event.
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Returns true if this is a test mode event.
    pub fn is_test(&self) -> bool {
        !self.livemode
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> ProcessorEventType {
        ProcessorEventType::from_str(&self.event_type)
    }
}

/// Known processor event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Customer subscription was created.
    SubscriptionCreated,
    /// Customer subscription was updated.
    SubscriptionUpdated,
    /// Customer subscription was deleted.
    SubscriptionDeleted,
    /// Unknown or unhandled event type.
    Unknown,
}

impl ProcessorEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    /// Convert to the processor event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::SubscriptionCreated => "customer.subscription.created",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// Checkout session object as it arrives in webhook payloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Customer ID if a customer was created or attached.
    pub customer: Option<String>,

    /// Subscription ID if checkout created a subscription.
    pub subscription: Option<String>,

    /// Our user id, attached at session creation.
    pub client_reference_id: Option<String>,

    /// Custom metadata attached to the session.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// The user id the session was created for, from the client reference or
    /// the `user_id` metadata key.
    pub fn user_ref(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("user_id").map(String::as_str))
    }
}

/// Subscription object as it arrives in webhook payloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: Option<String>,

    /// Subscription status string.
    pub status: String,

    /// Custom metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Subscription items (price/quantity pairs).
    #[serde(default)]
    pub items: SubscriptionItems,

    /// Whether subscription cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Unix timestamp of creation.
    pub created: Option<i64>,

    /// Current period start (Unix timestamp).
    pub current_period_start: Option<i64>,

    /// Current period end (Unix timestamp).
    pub current_period_end: Option<i64>,

    /// When subscription ended (Unix timestamp).
    pub ended_at: Option<i64>,

    /// Scheduled cancellation time (Unix timestamp).
    pub cancel_at: Option<i64>,

    /// When cancellation was requested (Unix timestamp).
    pub canceled_at: Option<i64>,

    /// Trial start (Unix timestamp).
    pub trial_start: Option<i64>,

    /// Trial end (Unix timestamp).
    pub trial_end: Option<i64>,
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubscriptionItems {
    /// List of subscription items.
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    /// Price object.
    pub price: PriceRef,

    /// Item quantity.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Price reference (embedded in subscription items).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceRef {
    /// Price ID.
    pub id: String,
}

impl SubscriptionObject {
    /// The user id carried in subscription metadata, if present.
    pub fn user_ref(&self) -> Option<&str> {
        self.metadata.get("user_id").map(String::as_str)
    }

    /// Converts the webhook object into the canonical subscription snapshot,
    /// the same shape the processor's query API returns. Keeps webhook
    /// ingestion and reconciliation on one record-construction path.
    pub fn into_snapshot(self) -> Result<ProcessorSubscription, WebhookError> {
        let id = SubscriptionId::new(self.id).map_err(|_| WebhookError::MissingField("id"))?;
        let customer_id = self
            .customer
            .ok_or(WebhookError::MissingField("customer"))?;

        let first_item = self.items.data.first();

        Ok(ProcessorSubscription {
            id,
            customer_id,
            status: SubscriptionStatus::parse(&self.status),
            price_ref: first_item.map(|i| i.price.id.clone()),
            quantity: first_item.map(|i| i.quantity),
            cancel_at_period_end: self.cancel_at_period_end,
            created: self.created,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            ended_at: self.ended_at,
            cancel_at: self.cancel_at,
            canceled_at: self.canceled_at,
            trial_start: self.trial_start,
            trial_end: self.trial_end,
            metadata: self.metadata,
        })
    }
}

/// Builder for creating test ProcessorEvent instances.
#[cfg(test)]
pub struct ProcessorEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    previous_attributes: Option<serde_json::Value>,
    livemode: bool,
}

#[cfg(test)]
impl Default for ProcessorEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "customer.subscription.updated".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            previous_attributes: None,
            livemode: false,
        }
    }
}

#[cfg(test)]
impl ProcessorEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> ProcessorEvent {
        ProcessorEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: ProcessorEventData {
                object: self.object,
                previous_attributes: self.previous_attributes,
            },
            livemode: self.livemode,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}
