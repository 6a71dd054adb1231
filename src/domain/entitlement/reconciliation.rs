//! Entitlement reconciliation against the payment processor.
//!
//! Webhooks get lost, land out of order, or arrive before the user returns
//! from checkout. Reconciliation re-derives the user's entitlement from the
//! processor and repairs the store, trying sources in order of cost:
//!
//! 1. the store itself (fast path, unless a forced refresh)
//! 2. a checkout session reference, when the caller just completed checkout
//! 3. a subscription reference the caller already knows
//! 4. customer search: by profile email, then a bounded metadata scan
//!
//! A source that fails is logged and skipped; a source that definitively
//! answers "no subscription" lets later sources still run. Only when every
//! external source failed does the outcome degrade to the stored record, and
//! to `Unavailable` when there is none - never to a false "not entitled".

use std::sync::Arc;

use super::errors::EntitlementError;
use super::record::EntitlementRecord;
use super::store::EntitlementStore;
use crate::domain::foundation::UserId;
use crate::ports::{ProcessorClient, ProcessorSubscription, UserProfileRepository};

/// Upper bound for the customer metadata scan fallback.
const CUSTOMER_SCAN_LIMIT: u32 = 100;

/// Caller-supplied reference that narrows the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileHint {
    /// No reference; go straight to customer search.
    None,
    /// Checkout session id from a just-completed checkout.
    CheckoutRef(String),
    /// Subscription id the caller already holds.
    SubscriptionRef(String),
}

/// Which source produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSource {
    /// Stored record, fast path.
    Store,
    /// Resolved via checkout session reference.
    Checkout,
    /// Resolved via subscription reference.
    Subscription,
    /// Resolved via customer search.
    CustomerSearch,
    /// Every source answered; the user has no entitling subscription.
    NoSubscription,
    /// External sources failed; serving the stored record.
    StoredFallback,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub entitled: bool,
    pub record: Option<EntitlementRecord>,
    pub source: ReconcileSource,
}

impl ReconcileOutcome {
    fn from_record(record: EntitlementRecord, source: ReconcileSource) -> Self {
        Self {
            entitled: record.entitled(),
            record: Some(record),
            source,
        }
    }
}

/// Re-derives entitlement from the processor and repairs the store.
pub struct ReconciliationService {
    store: Arc<EntitlementStore>,
    processor: Arc<dyn ProcessorClient>,
    profiles: Arc<dyn UserProfileRepository>,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<EntitlementStore>,
        processor: Arc<dyn ProcessorClient>,
        profiles: Arc<dyn UserProfileRepository>,
    ) -> Self {
        Self {
            store,
            processor,
            profiles,
        }
    }

    /// Reconciles the user's entitlement.
    ///
    /// With `force` unset, a stored record short-circuits the search. With it
    /// set, the processor is always consulted and the store rewritten, which
    /// is what the post-checkout and manual sync paths want.
    pub async fn reconcile(
        &self,
        user_id: &UserId,
        hint: ReconcileHint,
        force: bool,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        if !force {
            if let Some(record) = self.store.get(user_id).await? {
                // Only an entitling record settles the question; a stored
                // canceled record may be stale, so the search continues.
                if record.entitled() {
                    return Ok(ReconcileOutcome::from_record(record, ReconcileSource::Store));
                }
            }
        }

        let mut degraded = false;

        if let ReconcileHint::CheckoutRef(session_ref) = &hint {
            match self.via_checkout(session_ref).await {
                Ok(Some(snapshot)) => {
                    return self.commit(user_id, snapshot, ReconcileSource::Checkout).await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(user_id = %user_id, session_ref, error = %err, "checkout lookup failed");
                    degraded = true;
                }
            }
        }

        if let ReconcileHint::SubscriptionRef(subscription_ref) = &hint {
            match self.processor.get_subscription(subscription_ref).await {
                Ok(Some(snapshot)) => {
                    return self
                        .commit(user_id, snapshot, ReconcileSource::Subscription)
                        .await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        user_id = %user_id,
                        subscription_ref,
                        error = %err,
                        "subscription lookup failed"
                    );
                    degraded = true;
                }
            }
        }

        match self.via_customer_search(user_id).await {
            Ok(Some(snapshot)) => {
                return self
                    .commit(user_id, snapshot, ReconcileSource::CustomerSearch)
                    .await;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "customer search failed");
                degraded = true;
            }
        }

        if degraded {
            return self.degrade(user_id).await;
        }

        // Every source answered and none found a subscription. Report it, but
        // leave the store alone: the customer search is bounded, so a miss is
        // not proof of absence. Downgrades come from ingestion.
        Ok(ReconcileOutcome {
            entitled: false,
            record: None,
            source: ReconcileSource::NoSubscription,
        })
    }

    /// Checkout session -> subscription reference -> snapshot.
    async fn via_checkout(
        &self,
        session_ref: &str,
    ) -> Result<Option<ProcessorSubscription>, EntitlementError> {
        let Some(session) = self.processor.get_checkout_session(session_ref).await? else {
            return Ok(None);
        };

        let Some(subscription_ref) = session.subscription_id.as_deref() else {
            return Ok(None);
        };

        Ok(self.processor.get_subscription(subscription_ref).await?)
    }

    /// Locates the user's processor customer and picks the newest entitling
    /// subscription.
    async fn via_customer_search(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ProcessorSubscription>, EntitlementError> {
        let customer_id = match self.find_customer(user_id).await? {
            Some(id) => id,
            None => return Ok(None),
        };

        let subscriptions = self.processor.list_subscriptions(&customer_id).await?;

        // Newest entitling subscription wins; non-entitling ones do not count
        // as a find, so the definitive no-subscription path handles them.
        Ok(subscriptions
            .into_iter()
            .filter(|s| s.entitles())
            .max_by_key(|s| s.created))
    }

    async fn find_customer(&self, user_id: &UserId) -> Result<Option<String>, EntitlementError> {
        if let Some(email) = self.profiles.find_email(user_id).await? {
            if let Some(customer) = self.processor.find_customer_by_email(&email).await? {
                return Ok(Some(customer.id));
            }
        }

        // Email missed; scan recent customers for our user id in metadata.
        let customers = self.processor.list_customers(CUSTOMER_SCAN_LIMIT).await?;
        Ok(customers
            .into_iter()
            .find(|c| c.metadata.get("user_id").map(String::as_str) == Some(user_id.as_str()))
            .map(|c| c.id))
    }

    async fn commit(
        &self,
        user_id: &UserId,
        snapshot: ProcessorSubscription,
        source: ReconcileSource,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        let record = EntitlementRecord::from_snapshot(user_id.clone(), &snapshot);
        self.store.record(record.clone()).await?;

        // The committed subscription is authoritative for this user; rows
        // left behind by a previous plan would shadow it on read.
        let pruned = self.store.prune_others(user_id, &record.id).await?;
        if pruned > 0 {
            tracing::info!(
                user_id = %user_id,
                subscription_id = %record.id,
                pruned,
                "superseded subscription records removed"
            );
        }

        tracing::info!(
            user_id = %user_id,
            subscription_id = %record.id,
            source = ?source,
            entitled = record.entitled(),
            "entitlement reconciled"
        );

        Ok(ReconcileOutcome::from_record(record, source))
    }

    /// All external sources failed. Serve the stored record if one exists;
    /// otherwise the entitlement is genuinely unknown.
    async fn degrade(&self, user_id: &UserId) -> Result<ReconcileOutcome, EntitlementError> {
        match self.store.get(user_id).await {
            Ok(Some(record)) => {
                tracing::warn!(
                    user_id = %user_id,
                    subscription_id = %record.id,
                    "external sources unavailable; serving stored entitlement"
                );
                Ok(ReconcileOutcome::from_record(
                    record,
                    ReconcileSource::StoredFallback,
                ))
            }
            Ok(None) => Err(EntitlementError::Unavailable(
                "all entitlement sources failed and no stored record exists".to_string(),
            )),
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "store read failed during degraded reconcile");
                Err(EntitlementError::Unavailable(
                    "all entitlement sources failed".to_string(),
                ))
            }
        }
    }
}
