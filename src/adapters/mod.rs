//! Adapters - concrete implementations of the outbound and inbound ports.

pub mod events;
pub mod http;
pub mod postgres;
pub mod stripe;
