//! HTTP DTOs for entitlement endpoints.
//!
//! These types define the JSON request/response structure for the entitlement
//! API. They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::ports::EntitlementView;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request for a reconciliation run.
///
/// A bare `{}` is the cheap form: a stored entitling record answers without
/// touching the processor. A checkout session id (what the post-checkout
/// return page holds) or a subscription id (what support tooling tends to
/// have) forces a processor round trip, as does `force`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    /// Checkout session reference (`cs_...`).
    #[serde(default)]
    pub session_id: Option<String>,

    /// Subscription reference (`sub_...`).
    #[serde(default)]
    pub subscription_id: Option<String>,

    /// Bypass the stored record even without a reference (manual resync).
    #[serde(default)]
    pub force: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for the current user's entitlement state.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementResponse {
    /// Subscription status string, or null without a record.
    pub status: Option<String>,

    /// End of the current billing period (ISO 8601), or null.
    pub current_period_end: Option<String>,

    /// The denormalized subscription flag.
    pub is_subscribed: bool,

    /// Whether the user gets premium access right now.
    pub entitled: bool,
}

impl From<EntitlementView> for EntitlementResponse {
    fn from(view: EntitlementView) -> Self {
        Self {
            entitled: view.entitled(),
            status: view.status.map(|s| s.as_str().to_string()),
            current_period_end: view.current_period_end.map(|t| t.to_rfc3339()),
            is_subscribed: view.is_subscribed,
        }
    }
}

/// Response for a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    /// Whether the user is entitled after the sync.
    pub is_subscribed: bool,

    /// Which source settled the answer.
    pub source: String,
}

/// Acknowledgement for a processed webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::SubscriptionStatus;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn sync_request_deserializes_empty_body() {
        let request: SyncRequest = serde_json::from_str("{}").unwrap();
        assert!(request.session_id.is_none());
        assert!(request.subscription_id.is_none());
        assert!(!request.force);
    }

    #[test]
    fn sync_request_deserializes_force_flag() {
        let request: SyncRequest = serde_json::from_str(r#"{"force": true}"#).unwrap();
        assert!(request.force);
    }

    #[test]
    fn sync_request_deserializes_session_id() {
        let request: SyncRequest =
            serde_json::from_str(r#"{"session_id": "cs_test_abc"}"#).unwrap();
        assert_eq!(request.session_id.as_deref(), Some("cs_test_abc"));
    }

    #[test]
    fn entitlement_response_from_active_view() {
        let view = EntitlementView {
            status: Some(SubscriptionStatus::Active),
            current_period_end: Timestamp::from_unix_secs(1_706_745_600),
            is_subscribed: true,
        };

        let response = EntitlementResponse::from(view);
        assert_eq!(response.status.as_deref(), Some("active"));
        assert!(response.entitled);
        assert!(response.current_period_end.unwrap().starts_with("2024-02-01"));
    }

    #[test]
    fn entitlement_response_from_empty_view() {
        let response = EntitlementResponse::from(EntitlementView::none());

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status":null"#));
        assert!(json.contains(r#""entitled":false"#));
    }

    #[test]
    fn error_response_serializes() {
        let response = ErrorResponse::new("ENTITLEMENT_UNAVAILABLE", "all sources failed");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ENTITLEMENT_UNAVAILABLE"));
    }
}
