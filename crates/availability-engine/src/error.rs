//! Error types for availability-engine operations.

use thiserror::Error;

use crate::backend::BackendError;
use crate::model::{ServiceId, WindowId};

/// Errors returned by the availability core.
///
/// Every variant names the precondition or invariant that failed. None of them
/// leave the backing store partially written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    /// A time-of-day string was malformed, or a range was empty or inverted.
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    /// The referenced service does not exist.
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// The candidate window intersects a window already committed for the service.
    #[error("Overlapping availability window (conflicts with {conflicting})")]
    OverlappingWindow { conflicting: WindowId },

    /// The backing store failed or did not answer in time.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A request field outside the time fields failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AvailabilityError {
    /// Whether a caller may retry the same request with backoff.
    ///
    /// Only store failures are transient. Overlaps and validation errors will
    /// fail the same way until the request itself changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<BackendError> for AvailabilityError {
    fn from(err: BackendError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Convenience alias used throughout availability-engine.
pub type Result<T> = std::result::Result<T, AvailabilityError>;
