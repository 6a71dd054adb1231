//! Error types for entitlement operations.

use thiserror::Error;

use super::webhook_errors::WebhookError;
use crate::domain::foundation::{DomainError, ValidationError};
use crate::ports::ProcessorError;

/// Errors surfaced by entitlement queries and reconciliation.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// Webhook verification or processing failed.
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] DomainError),

    /// Processor API call failed.
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entitlement could not be determined: every external source failed and
    /// no stored record exists to fall back on. Callers must not treat this
    /// as "not entitled".
    #[error("Entitlement unavailable: {0}")]
    Unavailable(String),
}

impl EntitlementError {
    /// True when the state of the user's entitlement is unknown, as opposed
    /// to known-absent.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EntitlementError::Unavailable(_))
    }
}
