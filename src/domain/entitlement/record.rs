//! Entitlement record - the last-known subscription snapshot per user.
//!
//! The record mirrors the payment processor's subscription object. Whether a
//! user is entitled to premium features is always derived from `status` via
//! [`SubscriptionStatus::entitles`]; it is never stored as independent truth.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::ports::ProcessorSubscription;

/// Subscription status as reported by the payment processor.
///
/// The processor defines the vocabulary; statuses outside the known set are
/// preserved verbatim in `Other` so round-trips through storage are lossless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is paid and current.
    Active,

    /// Subscription is in its trial period.
    Trialing,

    /// Payment failed, grace period active.
    PastDue,

    /// Subscription was canceled.
    Canceled,

    /// Initial payment not yet completed.
    Incomplete,

    /// Initial payment window expired.
    IncompleteExpired,

    /// Payment retries exhausted.
    Unpaid,

    /// Subscription is paused.
    Paused,

    /// Any processor-defined status we do not model explicitly.
    #[serde(untagged)]
    Other(String),
}

impl SubscriptionStatus {
    /// Parse a processor status string. Never fails; unknown strings map to
    /// `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            other => Self::Other(other.to_string()),
        }
    }

    /// The processor's string form of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
            Self::Other(s) => s,
        }
    }

    /// The entitlement predicate: only `active` and `trialing` subscriptions
    /// grant premium access.
    pub fn entitles(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last-known subscription record for a user.
///
/// Keyed by the processor-assigned subscription id; all fields are replaced
/// wholesale on every write (last-write-wins, no incremental merging).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Processor-assigned subscription id (`sub_...`).
    pub id: SubscriptionId,

    /// Owning user.
    pub user_id: UserId,

    /// Current subscription status.
    pub status: SubscriptionStatus,

    /// Plan/price reference, informational.
    pub price_ref: Option<String>,

    /// Seat count, informational.
    pub quantity: u32,

    /// Whether the subscription cancels at period end.
    pub cancel_at_period_end: bool,

    /// When the subscription was created.
    pub created_at: Timestamp,

    /// Current billing period start.
    pub current_period_start: Timestamp,

    /// Current billing period end.
    pub current_period_end: Timestamp,

    /// When the subscription fully ended, if it has.
    pub ended_at: Option<Timestamp>,

    /// Scheduled cancellation time, if any.
    pub cancel_at: Option<Timestamp>,

    /// When cancellation was requested, if it was.
    pub canceled_at: Option<Timestamp>,

    /// Trial period start, if the subscription had a trial.
    pub trial_start: Option<Timestamp>,

    /// Trial period end, if the subscription had a trial.
    pub trial_end: Option<Timestamp>,

    /// Processor metadata bag, passed through unmodified.
    pub metadata: HashMap<String, String>,
}

impl EntitlementRecord {
    /// Builds a record from a processor subscription snapshot.
    ///
    /// This is the single construction path shared by webhook ingestion and
    /// reconciliation so both produce identical rows. Required timestamps
    /// that cannot be derived from the snapshot fall back to now() to keep
    /// the record well-formed.
    pub fn from_snapshot(user_id: UserId, sub: &ProcessorSubscription) -> Self {
        let now = Timestamp::now();
        let required = |secs: Option<i64>| {
            secs.and_then(Timestamp::from_unix_secs).unwrap_or(now)
        };
        let optional = |secs: Option<i64>| secs.and_then(Timestamp::from_unix_secs);

        Self {
            id: sub.id.clone(),
            user_id,
            status: sub.status.clone(),
            price_ref: sub.price_ref.clone(),
            quantity: sub.quantity.unwrap_or(1),
            cancel_at_period_end: sub.cancel_at_period_end,
            created_at: required(sub.created),
            current_period_start: required(sub.current_period_start),
            current_period_end: required(sub.current_period_end),
            ended_at: optional(sub.ended_at),
            cancel_at: optional(sub.cancel_at),
            canceled_at: optional(sub.canceled_at),
            trial_start: optional(sub.trial_start),
            trial_end: optional(sub.trial_end),
            metadata: sub.metadata.clone(),
        }
    }

    /// Whether this record grants premium access. Always derived from
    /// `status`, never cached.
    pub fn entitled(&self) -> bool {
        self.status.entitles()
    }
}
