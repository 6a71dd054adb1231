//! Outbound port for the payment processor's query API.
//!
//! The processor is the source of truth for subscription state. This port
//! covers the read-side calls reconciliation and ingestion need: fetching
//! subscriptions and checkout sessions by id, and locating a customer when
//! all we have is the user's email or metadata.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::SubscriptionId;

/// Error from a processor API call.
#[derive(Debug, Clone)]
pub struct ProcessorError {
    pub code: ProcessorErrorCode,
    pub message: String,
}

/// Categories of processor API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorErrorCode {
    /// Request never completed (connect/timeout/transport).
    Network,

    /// Processor rejected our credentials.
    Authentication,

    /// Processor throttled the request.
    RateLimited,

    /// Processor returned an error response for a well-formed request.
    Provider,

    /// Response body could not be decoded.
    InvalidResponse,
}

impl ProcessorError {
    pub fn new(code: ProcessorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::Network, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::Provider, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::InvalidResponse, message)
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ProcessorErrorCode::Network | ProcessorErrorCode::RateLimited
        )
    }
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProcessorError {}

/// Subscription snapshot as returned by the processor API.
///
/// Timestamps stay as raw Unix seconds here; conversion to domain timestamps
/// happens in `EntitlementRecord::from_snapshot`.
#[derive(Debug, Clone)]
pub struct ProcessorSubscription {
    pub id: SubscriptionId,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    pub price_ref: Option<String>,
    pub quantity: Option<u32>,
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    pub metadata: HashMap<String, String>,
}

impl ProcessorSubscription {
    /// Whether this snapshot grants premium access.
    pub fn entitles(&self) -> bool {
        self.status.entitles()
    }
}

/// Checkout session snapshot as returned by the processor API.
#[derive(Debug, Clone)]
pub struct ProcessorCheckoutSession {
    pub id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    /// Our user id, if it was attached at session creation.
    pub client_reference_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Customer snapshot as returned by the processor API.
#[derive(Debug, Clone)]
pub struct ProcessorCustomer {
    pub id: String,
    pub email: Option<String>,
    pub metadata: HashMap<String, String>,
    pub created: Option<i64>,
}

/// Query interface to the payment processor.
///
/// All lookups by id return `Ok(None)` when the processor reports the object
/// does not exist; `Err` is reserved for calls that failed outright.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Fetches a subscription by its processor id.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProcessorSubscription>, ProcessorError>;

    /// Fetches a checkout session by its processor id.
    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ProcessorCheckoutSession>, ProcessorError>;

    /// Lists all subscriptions belonging to a customer, newest first.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProcessorSubscription>, ProcessorError>;

    /// Finds the customer with the given email, if any.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProcessorCustomer>, ProcessorError>;

    /// Lists recent customers for the metadata-scan fallback, bounded by
    /// `limit`.
    async fn list_customers(&self, limit: u32) -> Result<Vec<ProcessorCustomer>, ProcessorError>;
}
