//! Entitlement domain - subscription state, webhook ingestion, and
//! reconciliation.
//!
//! The payment processor owns the truth about subscriptions; this module
//! maintains the local mirror of it. Webhook events flow in through
//! [`WebhookVerifier`] and [`EventIngestionHandler`], reads and repairs flow
//! through [`ReconciliationService`], and every write lands in
//! [`EntitlementStore`].

mod errors;
mod events;
mod ingestion;
mod processor_event;
mod reconciliation;
mod record;
mod store;
mod webhook_errors;
mod webhook_verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::EntitlementError;
pub use events::EntitlementChanged;
pub use ingestion::{EventIngestionHandler, IngestionOutcome};
pub use processor_event::{
    CheckoutSessionObject, ProcessorEvent, ProcessorEventType, SubscriptionObject,
};
pub use reconciliation::{
    ReconcileHint, ReconcileOutcome, ReconcileSource, ReconciliationService,
};
pub use record::{EntitlementRecord, SubscriptionStatus};
pub use store::EntitlementStore;
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{SignatureHeader, WebhookVerifier};

#[cfg(test)]
pub(crate) use webhook_verifier::compute_test_signature;
