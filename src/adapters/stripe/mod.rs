//! Stripe adapter - payment processor integration.

mod client;
mod types;

pub use client::{StripeConfig, StripeProcessorClient};
