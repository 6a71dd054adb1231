//! HTTP adapters - REST API implementations.

pub mod entitlement;

// Re-export key types for convenience
pub use entitlement::entitlement_router;
pub use entitlement::EntitlementAppState;
