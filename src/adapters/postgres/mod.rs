//! PostgreSQL adapters - persistent storage implementations.

mod subscription_repository;
mod user_profile_repository;

pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_profile_repository::PostgresUserProfileRepository;
