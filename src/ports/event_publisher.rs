//! EventPublisher port - interface for publishing domain events.
//!
//! The domain publishes events without knowing the underlying transport
//! (in-memory bus today, a broker later).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Delivery is at-least-once; handlers may receive duplicates and must be
/// idempotent.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;
}
