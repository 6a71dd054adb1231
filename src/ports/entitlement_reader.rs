//! Read-side port for entitlement queries.

use async_trait::async_trait;

use crate::domain::entitlement::SubscriptionStatus;
use crate::domain::foundation::{DomainError, Timestamp, UserId};

/// Entitlement state as consumers see it: the stored record projected down
/// to what gating decisions need, plus the denormalized flag.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementView {
    /// Status of the user's subscription, if a record exists.
    pub status: Option<SubscriptionStatus>,

    /// End of the current billing period, if a record exists.
    pub current_period_end: Option<Timestamp>,

    /// The denormalized profile flag.
    pub is_subscribed: bool,
}

impl EntitlementView {
    /// An empty view for users with no entitlement state at all.
    pub fn none() -> Self {
        Self {
            status: None,
            current_period_end: None,
            is_subscribed: false,
        }
    }

    /// Whether the user should get premium access.
    ///
    /// Entitling status OR the flag: the record is authoritative, but a set
    /// flag with a missing record still grants access until reconciliation
    /// sorts the mismatch out.
    pub fn entitled(&self) -> bool {
        self.status.as_ref().map(|s| s.entitles()).unwrap_or(false) || self.is_subscribed
    }
}

/// Query interface for a user's current entitlement.
#[async_trait]
pub trait EntitlementReader: Send + Sync {
    /// The user's entitlement view. Users without any state get
    /// `EntitlementView::none()`, not an error.
    async fn entitlement(&self, user_id: &UserId) -> Result<EntitlementView, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitled_from_status() {
        let view = EntitlementView {
            status: Some(SubscriptionStatus::Trialing),
            current_period_end: None,
            is_subscribed: false,
        };
        assert!(view.entitled());
    }

    #[test]
    fn entitled_from_flag_alone() {
        let view = EntitlementView {
            status: None,
            current_period_end: None,
            is_subscribed: true,
        };
        assert!(view.entitled());
    }

    #[test]
    fn non_entitling_status_with_clear_flag() {
        let view = EntitlementView {
            status: Some(SubscriptionStatus::Canceled),
            current_period_end: None,
            is_subscribed: false,
        };
        assert!(!view.entitled());
    }

    #[test]
    fn empty_view_is_not_entitled() {
        assert!(!EntitlementView::none().entitled());
    }
}
