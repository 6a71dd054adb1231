//! Waveplay - Music Streaming Backend
//!
//! This crate implements the subscription entitlement core of the Waveplay
//! music streaming service: webhook ingestion from the payment processor,
//! on-demand reconciliation, and the presentation-facing entitlement cache.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
