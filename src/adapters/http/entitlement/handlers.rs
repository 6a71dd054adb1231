//! HTTP handlers for entitlement endpoints.
//!
//! These handlers connect Axum routes to the entitlement domain services.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::domain::entitlement::{
    EntitlementError, EventIngestionHandler, ReconcileHint, ReconcileSource,
    ReconciliationService, WebhookError, WebhookVerifier,
};
use crate::domain::foundation::UserId;
use crate::ports::EntitlementReader;

use super::dto::{
    EntitlementResponse, ErrorResponse, SyncRequest, SyncResponse, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped
/// dependencies for efficient sharing across handlers.
#[derive(Clone)]
pub struct EntitlementAppState {
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub ingestion: Arc<EventIngestionHandler>,
    pub reconciliation: Arc<ReconciliationService>,
    pub entitlement_reader: Arc<dyn EntitlementReader>,
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// In production, this would be extracted from JWT/session by auth middleware.
/// For now, uses a header-based extraction for development/testing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // In production, this would validate JWT token from Authorization header
            // For development, we accept an X-User-Id header
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| UserId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/entitlement - Get current user's entitlement state
pub async fn get_entitlement(
    State(state): State<EntitlementAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let view = state
        .entitlement_reader
        .entitlement(&user.user_id)
        .await
        .map_err(EntitlementError::Storage)?;

    Ok(Json(EntitlementResponse::from(view)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/entitlement/sync - Reconcile entitlement against the processor
pub async fn sync_entitlement(
    State(state): State<EntitlementAppState>,
    user: AuthenticatedUser,
    Json(request): Json<SyncRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let hint = match (request.session_id, request.subscription_id) {
        (Some(session_id), _) => ReconcileHint::CheckoutRef(session_id),
        (None, Some(subscription_id)) => ReconcileHint::SubscriptionRef(subscription_id),
        (None, None) => ReconcileHint::None,
    };

    // A caller holding a reference knows something just changed, so the
    // stored record is bypassed; a bare sync takes the fast path.
    let force = request.force || hint != ReconcileHint::None;

    let outcome = state
        .reconciliation
        .reconcile(&user.user_id, hint, force)
        .await?;

    let response = SyncResponse {
        is_subscribed: outcome.entitled,
        source: source_name(outcome.source).to_string(),
    };

    Ok(Json(response))
}

/// POST /api/webhooks/stripe - Handle payment processor webhook events
pub async fn handle_stripe_webhook(
    State(state): State<EntitlementAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingField("Stripe-Signature"))?;

    let event = state.webhook_verifier.verify_and_parse(&body, signature)?;

    let outcome = state.ingestion.handle_event(&event).await?;
    tracing::info!(event_id = %event.id, ?outcome, "webhook processed");

    Ok(Json(WebhookAckResponse { received: true }))
}

fn source_name(source: ReconcileSource) -> &'static str {
    match source {
        ReconcileSource::Store => "store",
        ReconcileSource::Checkout => "checkout",
        ReconcileSource::Subscription => "subscription",
        ReconcileSource::CustomerSearch => "customer_search",
        ReconcileSource::NoSubscription => "no_subscription",
        ReconcileSource::StoredFallback => "stored_fallback",
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts entitlement errors to HTTP responses.
pub struct EntitlementApiError(EntitlementError);

impl From<EntitlementError> for EntitlementApiError {
    fn from(err: EntitlementError) -> Self {
        Self(err)
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            EntitlementError::Webhook(err) => (err.status_code(), "WEBHOOK_ERROR"),
            EntitlementError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            EntitlementError::Processor(_) => (StatusCode::BAD_GATEWAY, "PROCESSOR_ERROR"),
            EntitlementError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            // Unknown is not "not entitled"; clients must retry, not downgrade
            EntitlementError::Unavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ENTITLEMENT_UNAVAILABLE")
            }
        };

        let body = ErrorResponse::new(error_code, self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// API error type for the webhook endpoint.
///
/// The status code drives the processor's redelivery behavior, so the mapping
/// lives on [`WebhookError`] itself.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();

        if status.is_success() {
            // Intentionally ignored events are acknowledged
            return (status, Json(WebhookAckResponse { received: true })).into_response();
        }

        if self.0.is_retryable() {
            tracing::warn!(error = %self.0, "webhook processing failed, expecting redelivery");
        }

        let body = ErrorResponse::new("WEBHOOK_ERROR", self.0.to_string());
        (status, Json(body)).into_response()
    }
}
