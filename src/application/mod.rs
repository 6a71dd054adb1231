//! Application layer - read-side services built on the domain.
//!
//! Orchestrates domain operations for consumers: the entitlement query
//! projection and the in-process cache that fronts it.

mod entitlement_cache;
mod queries;

pub use entitlement_cache::{EntitlementCache, DEFAULT_FRESHNESS};
pub use queries::EntitlementQueries;
