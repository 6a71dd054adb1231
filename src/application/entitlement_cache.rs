//! In-process entitlement cache.
//!
//! Gating checks ("can this user stream premium audio?") happen far more
//! often than entitlement changes, so sessions hold a small cached answer in
//! front of [`EntitlementReader`] instead of hitting storage every time.
//!
//! The cache tracks one user at a time, mirroring a client session:
//!
//! - a fresh value (within the freshness window) answers without any read
//! - concurrent refreshes coalesce onto one in-flight check
//! - switching users drops all previous state
//! - a failed check records `false` and the error, and still counts as a
//!   check so a flapping reader is not hammered
//!
//! It also subscribes to [`EntitlementChanged`] events and force-refreshes
//! when the change concerns the cached user.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::entitlement::EntitlementChanged;
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope, UserId};
use crate::ports::{EntitlementReader, EventHandler};

/// Default freshness window.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CacheState {
    user_id: Option<UserId>,
    value: Option<bool>,
    checked_at: Option<Instant>,
    checking: bool,
    last_error: Option<String>,
}

impl CacheState {
    /// Resets everything when the user changes. No state crosses users.
    fn switch_user(&mut self, user_id: &UserId) {
        if self.user_id.as_ref() != Some(user_id) {
            *self = CacheState {
                user_id: Some(user_id.clone()),
                ..CacheState::default()
            };
        }
    }
}

/// Cached entitlement answer for the current user.
pub struct EntitlementCache {
    reader: Arc<dyn EntitlementReader>,
    freshness: Duration,
    state: Mutex<CacheState>,
}

impl EntitlementCache {
    pub fn new(reader: Arc<dyn EntitlementReader>) -> Self {
        Self::with_freshness(reader, DEFAULT_FRESHNESS)
    }

    pub fn with_freshness(reader: Arc<dyn EntitlementReader>, freshness: Duration) -> Self {
        Self {
            reader,
            freshness,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns whether the user is entitled, reading through when the cached
    /// answer is stale or `force` is set.
    ///
    /// While a check is in flight, callers get the previous known value
    /// (`false` if there is none) rather than starting a second check.
    pub async fn refresh(&self, user_id: &UserId, force: bool) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            state.switch_user(user_id);

            if state.checking {
                return state.value.unwrap_or(false);
            }

            if !force {
                if let (Some(value), Some(checked_at)) = (state.value, state.checked_at) {
                    if checked_at.elapsed() < self.freshness {
                        return value;
                    }
                }
            }

            state.checking = true;
        }

        let result = self.reader.entitlement(user_id).await;

        let mut state = self.state.lock().unwrap();
        if state.user_id.as_ref() != Some(user_id) {
            // User switched while the check was in flight; the state was
            // already reset and this result must not leak into it.
            return match result {
                Ok(view) => view.entitled(),
                Err(_) => false,
            };
        }

        state.checking = false;
        state.checked_at = Some(Instant::now());

        match result {
            Ok(view) => {
                let entitled = view.entitled();
                state.value = Some(entitled);
                state.last_error = None;
                entitled
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "entitlement check failed");
                state.value = Some(false);
                state.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Assumes a value immediately, typically `true` right after checkout.
    ///
    /// The freshness timer is left alone on purpose: the assumption is shown
    /// at once, and the next forced refresh confirms it against the store.
    pub fn set_optimistic(&self, user_id: &UserId, value: bool) {
        let mut state = self.state.lock().unwrap();
        state.switch_user(user_id);
        state.value = Some(value);
    }

    /// Clears all state, used at logout.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = CacheState::default();
    }

    /// The cached value, if any. Does not trigger a check.
    pub fn current_value(&self) -> Option<bool> {
        self.state.lock().unwrap().value
    }

    /// The error from the last failed check, if the last check failed.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }

    fn cached_user(&self) -> Option<UserId> {
        self.state.lock().unwrap().user_id.clone()
    }
}

#[async_trait]
impl EventHandler for EntitlementCache {
    /// Force-refreshes when an entitlement change concerns the cached user.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let changed: EntitlementChanged = event
            .payload_as()
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        if self.cached_user().as_ref() == Some(&changed.user_id) {
            self.refresh(&changed.user_id, true).await;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "EntitlementCache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::SubscriptionStatus;
    use crate::domain::foundation::{SerializableDomainEvent, SubscriptionId};
    use crate::ports::EntitlementView;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    struct StubReader {
        calls: AtomicU32,
        outcome: Mutex<Result<bool, String>>,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl StubReader {
        fn entitled(value: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcome: Mutex::new(Ok(value)),
                gate: Mutex::new(None),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcome: Mutex::new(Err(message.to_string())),
                gate: Mutex::new(None),
            })
        }

        fn set_outcome(&self, outcome: Result<bool, String>) {
            *self.outcome.lock().unwrap() = outcome;
        }

        fn set_gate(&self, gate: Arc<Notify>) {
            *self.gate.lock().unwrap() = Some(gate);
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EntitlementReader for StubReader {
        async fn entitlement(&self, _user_id: &UserId) -> Result<EntitlementView, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            match self.outcome.lock().unwrap().clone() {
                Ok(entitled) => Ok(EntitlementView {
                    status: entitled.then(|| SubscriptionStatus::Active),
                    current_period_end: None,
                    is_subscribed: entitled,
                }),
                Err(message) => Err(DomainError::database(message)),
            }
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Freshness Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_refresh_reads_through() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        assert!(cache.refresh(&user("u1"), false).await);
        assert_eq!(reader.calls(), 1);
    }

    #[tokio::test]
    async fn fresh_value_answers_without_reading() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        assert!(cache.refresh(&user("u1"), false).await);

        assert_eq!(reader.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_value_reads_through_again() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        tokio::time::advance(DEFAULT_FRESHNESS + Duration::from_secs(1)).await;
        cache.refresh(&user("u1"), false).await;

        assert_eq!(reader.calls(), 2);
    }

    #[tokio::test]
    async fn force_ignores_freshness() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        reader.set_outcome(Ok(false));
        assert!(!cache.refresh(&user("u1"), true).await);

        assert_eq!(reader.calls(), 2);
    }

    // ══════════════════════════════════════════════════════════════
    // Coalescing Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn in_flight_check_coalesces() {
        let reader = StubReader::entitled(true);
        let gate = Arc::new(Notify::new());
        reader.set_gate(gate.clone());

        let cache = Arc::new(EntitlementCache::new(reader.clone()));
        let background = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh(&user("u1"), true).await })
        };

        // Let the background refresh reach the blocked reader call.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        // No known value yet, so the coalesced caller gets false without
        // starting a second check.
        assert!(!cache.refresh(&user("u1"), true).await);
        assert_eq!(reader.calls(), 1);

        gate.notify_one();
        assert!(background.await.unwrap());
        assert_eq!(cache.current_value(), Some(true));
    }

    // ══════════════════════════════════════════════════════════════
    // Failure Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failed_check_records_false_and_error() {
        let reader = StubReader::failing("storage down");
        let cache = EntitlementCache::new(reader.clone());

        assert!(!cache.refresh(&user("u1"), false).await);
        assert_eq!(cache.current_value(), Some(false));
        assert!(cache.last_error().unwrap().contains("storage down"));
    }

    #[tokio::test]
    async fn failed_check_still_counts_as_fresh() {
        let reader = StubReader::failing("storage down");
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        cache.refresh(&user("u1"), false).await;

        assert_eq!(reader.calls(), 1);
    }

    #[tokio::test]
    async fn successful_check_clears_previous_error() {
        let reader = StubReader::failing("blip");
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        reader.set_outcome(Ok(true));
        assert!(cache.refresh(&user("u1"), true).await);
        assert!(cache.last_error().is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // User Switch / Optimistic / Reset Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn user_switch_drops_cached_state() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        reader.set_outcome(Ok(false));

        // Different user must not see u1's cached answer.
        assert!(!cache.refresh(&user("u2"), false).await);
        assert_eq!(reader.calls(), 2);
    }

    #[tokio::test]
    async fn optimistic_value_shows_immediately() {
        let reader = StubReader::entitled(false);
        let cache = EntitlementCache::new(reader.clone());

        cache.set_optimistic(&user("u1"), true);

        assert_eq!(cache.current_value(), Some(true));
        assert_eq!(reader.calls(), 0);
    }

    #[tokio::test]
    async fn optimistic_value_does_not_stamp_freshness() {
        let reader = StubReader::entitled(false);
        let cache = EntitlementCache::new(reader.clone());

        cache.set_optimistic(&user("u1"), true);

        // With no check on record, even a non-forced refresh verifies.
        assert!(!cache.refresh(&user("u1"), false).await);
        assert_eq!(reader.calls(), 1);
        assert_eq!(cache.current_value(), Some(false));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        cache.reset();

        assert_eq!(cache.current_value(), None);
        assert!(cache.last_error().is_none());
    }

    // ══════════════════════════════════════════════════════════════
    // Event Subscription Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn change_event_for_cached_user_forces_refresh() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;
        reader.set_outcome(Ok(false));

        let event = EntitlementChanged::cleared(user("u1"), SubscriptionId::new("sub_1").unwrap());
        cache.handle(event.to_envelope()).await.unwrap();

        assert_eq!(cache.current_value(), Some(false));
        assert_eq!(reader.calls(), 2);
    }

    #[tokio::test]
    async fn change_event_for_other_user_is_ignored() {
        let reader = StubReader::entitled(true);
        let cache = EntitlementCache::new(reader.clone());

        cache.refresh(&user("u1"), false).await;

        let event = EntitlementChanged::cleared(user("u2"), SubscriptionId::new("sub_2").unwrap());
        cache.handle(event.to_envelope()).await.unwrap();

        assert_eq!(cache.current_value(), Some(true));
        assert_eq!(reader.calls(), 1);
    }
}
