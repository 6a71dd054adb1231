//! Ports - interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - entitlement record storage
//! - `UserProfileRepository` - denormalized flag and email lookup
//! - `EntitlementReader` - read-side projection for queries and caching
//!
//! ## Payment Processor Ports
//!
//! - `ProcessorClient` - query API of the payment processor
//!
//! ## Event Ports
//!
//! - `EventPublisher` - port for publishing domain events
//! - `EventSubscriber` - port for subscribing to domain events
//! - `EventHandler` - handler that processes incoming events

mod entitlement_reader;
mod event_publisher;
mod event_subscriber;
mod processor_client;
mod subscription_repository;
mod user_profile_repository;

pub use entitlement_reader::{EntitlementReader, EntitlementView};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use processor_client::{
    ProcessorCheckoutSession, ProcessorClient, ProcessorCustomer, ProcessorError,
    ProcessorErrorCode, ProcessorSubscription,
};
pub use subscription_repository::SubscriptionRepository;
pub use user_profile_repository::UserProfileRepository;
