//! Axum router configuration for entitlement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    get_entitlement, handle_stripe_webhook, sync_entitlement, EntitlementAppState,
};

/// Create the entitlement API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `GET /` - Get current user's entitlement state
/// - `POST /sync` - Force reconciliation against the payment processor
pub fn entitlement_routes() -> Router<EntitlementAppState> {
    Router::new()
        .route("/", get(get_entitlement))
        .route("/sync", post(sync_entitlement))
}

/// Create the webhook router.
///
/// This is separate from the entitlement routes because webhooks don't
/// require user authentication (they're verified via signature).
///
/// # Routes
/// - `POST /stripe` - Handle payment processor webhooks
pub fn webhook_routes() -> Router<EntitlementAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete entitlement module router, suitable for mounting
/// under `/api`.
pub fn entitlement_router() -> Router<EntitlementAppState> {
    Router::new()
        .nest("/entitlement", entitlement_routes())
        .nest("/webhooks", webhook_routes())
}
