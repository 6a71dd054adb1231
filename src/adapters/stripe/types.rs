//! Stripe API response types.
//!
//! These mirror the JSON the REST API returns, capturing only the fields the
//! entitlement core needs, and convert into the port-level snapshot types.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::SubscriptionId;
use crate::ports::{
    ProcessorCheckoutSession, ProcessorCustomer, ProcessorError, ProcessorSubscription,
};

/// Generic list envelope (`{"object": "list", "data": [...]}`).
#[derive(Debug, Deserialize)]
pub struct ApiList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Subscription object from the API.
#[derive(Debug, Deserialize)]
pub struct ApiSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: ApiSubscriptionItems,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
}

/// Subscription items container.
#[derive(Debug, Default, Deserialize)]
pub struct ApiSubscriptionItems {
    #[serde(default)]
    pub data: Vec<ApiSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Deserialize)]
pub struct ApiSubscriptionItem {
    pub price: ApiPrice,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Price reference embedded in subscription items.
#[derive(Debug, Deserialize)]
pub struct ApiPrice {
    pub id: String,
}

impl ApiSubscription {
    /// Converts the API object into the port-level snapshot.
    pub fn into_snapshot(self) -> Result<ProcessorSubscription, ProcessorError> {
        let id = SubscriptionId::new(self.id)
            .map_err(|e| ProcessorError::invalid_response(e.to_string()))?;

        let first_item = self.items.data.first();

        Ok(ProcessorSubscription {
            id,
            customer_id: self.customer,
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

/// Checkout session object from the API.
#[derive(Debug, Deserialize)]
pub struct ApiCheckoutSession {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<ApiCheckoutSession> for ProcessorCheckoutSession {
    fn from(session: ApiCheckoutSession) -> Self {
        Self {
            id: session.id,
            customer_id: session.customer,
            subscription_id: session.subscription,
            client_reference_id: session.client_reference_id,
            metadata: session.metadata,
        }
    }
}

/// Customer object from the API.
#[derive(Debug, Deserialize)]
pub struct ApiCustomer {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
}

impl From<ApiCustomer> for ProcessorCustomer {
    fn from(customer: ApiCustomer) -> Self {
        Self {
            id: customer.id,
            email: customer.email,
            metadata: customer.metadata,
            created: customer.created,
        }
    }
}
