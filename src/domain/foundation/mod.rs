//! Foundation module - shared value objects and error types.
//!
//! Building blocks used across the domain: strongly-typed identifiers,
//! timestamps, error types, and the event envelope infrastructure.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, SerializableDomainEvent};
pub use ids::{SubscriptionId, UserId};
pub use timestamp::Timestamp;
