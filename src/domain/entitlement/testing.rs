//! Shared test doubles for entitlement service tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::record::{EntitlementRecord, SubscriptionStatus};
use crate::domain::foundation::{
    DomainError, EventEnvelope, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{
    EventPublisher, ProcessorCheckoutSession, ProcessorClient, ProcessorCustomer,
    ProcessorError, ProcessorSubscription, SubscriptionRepository, UserProfileRepository,
};

/// Builds a well-formed record for tests.
pub fn record_for(sub_id: &str, user_id: &str, status: SubscriptionStatus) -> EntitlementRecord {
    let now = Timestamp::now();
    EntitlementRecord {
        id: SubscriptionId::new(sub_id).unwrap(),
        user_id: UserId::new(user_id).unwrap(),
        status,
        price_ref: Some("price_premium_monthly".to_string()),
        quantity: 1,
        cancel_at_period_end: false,
        created_at: now,
        current_period_start: now,
        current_period_end: now.add_days(30),
        ended_at: None,
        cancel_at: None,
        canceled_at: None,
        trial_start: None,
        trial_end: None,
        metadata: HashMap::new(),
    }
}

/// Builds a processor subscription snapshot for tests.
pub fn snapshot_for(
    sub_id: &str,
    customer_id: &str,
    status: SubscriptionStatus,
) -> ProcessorSubscription {
    let now = chrono::Utc::now().timestamp();
    ProcessorSubscription {
        id: SubscriptionId::new(sub_id).unwrap(),
        customer_id: customer_id.to_string(),
        status,
        price_ref: Some("price_premium_monthly".to_string()),
        quantity: Some(1),
        cancel_at_period_end: false,
        created: Some(now),
        current_period_start: Some(now),
        current_period_end: Some(now + 30 * 86_400),
        ended_at: None,
        cancel_at: None,
        canceled_at: None,
        trial_start: None,
        trial_end: None,
        metadata: HashMap::new(),
    }
}

/// In-memory subscription repository with a failure switch.
pub struct MockSubscriptions {
    rows: Mutex<HashMap<String, EntitlementRecord>>,
    fail: AtomicBool,
}

impl MockSubscriptions {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptions {
    async fn upsert(&self, record: &EntitlementRecord) -> Result<(), DomainError> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .insert(record.id.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().remove(id.as_str()).is_some())
    }

    async fn delete_superseded(
        &self,
        user_id: &UserId,
        keep: &SubscriptionId,
    ) -> Result<u64, DomainError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| &r.user_id != user_id || &r.id == keep);
        Ok((before - rows.len()) as u64)
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        self.check()?;
        Ok(self.rows.lock().unwrap().get(id.as_str()).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| &r.user_id == user_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}

/// In-memory user profile repository.
pub struct MockProfiles {
    flags: Mutex<HashMap<String, bool>>,
    emails: Mutex<HashMap<String, String>>,
    fail_flag_writes: AtomicBool,
    fail_all: AtomicBool,
}

impl MockProfiles {
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(HashMap::new()),
            emails: Mutex::new(HashMap::new()),
            fail_flag_writes: AtomicBool::new(false),
            fail_all: AtomicBool::new(false),
        }
    }

    pub fn fail_flag_writes(&self, fail: bool) {
        self.fail_flag_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn with_email(self, user_id: &str, email: &str) -> Self {
        self.emails
            .lock()
            .unwrap()
            .insert(user_id.to_string(), email.to_string());
        self
    }
}

#[async_trait]
impl UserProfileRepository for MockProfiles {
    async fn set_subscribed(&self, user_id: &UserId, subscribed: bool) -> Result<(), DomainError> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail_flag_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated flag failure"));
        }
        self.flags
            .lock()
            .unwrap()
            .insert(user_id.as_str().to_string(), subscribed);
        Ok(())
    }

    async fn is_subscribed(&self, user_id: &UserId) -> Result<bool, DomainError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated failure"));
        }
        Ok(self
            .flags
            .lock()
            .unwrap()
            .get(user_id.as_str())
            .copied()
            .unwrap_or(false))
    }

    async fn find_email(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated failure"));
        }
        Ok(self.emails.lock().unwrap().get(user_id.as_str()).cloned())
    }
}

/// Event publisher that captures published envelopes.
pub struct CapturingPublisher {
    events: Mutex<Vec<EventEnvelope>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<EventEnvelope> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Scriptable processor client.
pub struct MockProcessor {
    subscriptions: Mutex<HashMap<String, ProcessorSubscription>>,
    sessions: Mutex<HashMap<String, ProcessorCheckoutSession>>,
    customers: Mutex<Vec<ProcessorCustomer>>,
    fail_all: AtomicBool,
    fail_next_subscription_fetches: AtomicU32,
    subscription_fetches: AtomicU32,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            customers: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            fail_next_subscription_fetches: AtomicU32::new(0),
            subscription_fetches: AtomicU32::new(0),
        }
    }

    pub fn with_subscription(self, sub: ProcessorSubscription) -> Self {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(sub.id.as_str().to_string(), sub);
        self
    }

    pub fn with_session(self, session: ProcessorCheckoutSession) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
        self
    }

    pub fn with_customer(self, customer: ProcessorCustomer) -> Self {
        self.customers.lock().unwrap().push(customer);
        self
    }

    pub fn add_subscription(&self, sub: ProcessorSubscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(sub.id.as_str().to_string(), sub);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// The next `n` get_subscription calls fail with a network error.
    pub fn fail_next_subscription_fetches(&self, n: u32) {
        self.fail_next_subscription_fetches.store(n, Ordering::SeqCst);
    }

    pub fn subscription_fetch_count(&self) -> u32 {
        self.subscription_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProcessorError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ProcessorError::network("simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessorClient for MockProcessor {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProcessorSubscription>, ProcessorError> {
        self.subscription_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let remaining = self.fail_next_subscription_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_subscription_fetches
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ProcessorError::network("simulated transient failure"));
        }

        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned())
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ProcessorCheckoutSession>, ProcessorError> {
        self.check()?;
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProcessorSubscription>, ProcessorError> {
        self.check()?;
        let mut subs: Vec<_> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect();
        // Newest first, matching the live API's default ordering
        subs.sort_by_key(|s| std::cmp::Reverse(s.created));
        Ok(subs)
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProcessorCustomer>, ProcessorError> {
        self.check()?;
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned())
    }

    async fn list_customers(&self, limit: u32) -> Result<Vec<ProcessorCustomer>, ProcessorError> {
        self.check()?;
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
