//! Read-side query service for entitlement state.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entitlement::EntitlementStore;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{EntitlementReader, EntitlementView};

/// Projects the stored record and the profile flag into the view consumers
/// gate on.
pub struct EntitlementQueries {
    store: Arc<EntitlementStore>,
}

impl EntitlementQueries {
    pub fn new(store: Arc<EntitlementStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntitlementReader for EntitlementQueries {
    async fn entitlement(&self, user_id: &UserId) -> Result<EntitlementView, DomainError> {
        let record = self.store.get(user_id).await?;
        let is_subscribed = self.store.flag(user_id).await?;

        Ok(EntitlementView {
            status: record.as_ref().map(|r| r.status.clone()),
            current_period_end: record.as_ref().map(|r| r.current_period_end),
            is_subscribed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::testing::{
        record_for, CapturingPublisher, MockProfiles, MockSubscriptions,
    };
    use crate::domain::entitlement::SubscriptionStatus;

    fn queries() -> (EntitlementQueries, Arc<EntitlementStore>) {
        let store = Arc::new(EntitlementStore::new(
            Arc::new(MockSubscriptions::new()),
            Arc::new(MockProfiles::new()),
            Arc::new(CapturingPublisher::new()),
        ));
        (EntitlementQueries::new(store.clone()), store)
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[tokio::test]
    async fn empty_state_reads_as_none() {
        let (queries, _) = queries();

        let view = queries.entitlement(&user()).await.unwrap();

        assert_eq!(view, EntitlementView::none());
        assert!(!view.entitled());
    }

    #[tokio::test]
    async fn record_and_flag_are_projected() {
        let (queries, store) = queries();
        store
            .record(record_for("sub_1", "user-1", SubscriptionStatus::Active))
            .await
            .unwrap();

        let view = queries.entitlement(&user()).await.unwrap();

        assert_eq!(view.status, Some(SubscriptionStatus::Active));
        assert!(view.current_period_end.is_some());
        assert!(view.is_subscribed);
        assert!(view.entitled());
    }

    #[tokio::test]
    async fn canceled_record_is_not_entitled() {
        let (queries, store) = queries();
        store
            .record(record_for("sub_1", "user-1", SubscriptionStatus::Canceled))
            .await
            .unwrap();

        let view = queries.entitlement(&user()).await.unwrap();

        assert_eq!(view.status, Some(SubscriptionStatus::Canceled));
        assert!(!view.entitled());
    }
}
