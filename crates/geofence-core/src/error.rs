//! Error types for the geofence registry
//!
//! This module defines all error types used throughout the crate.
//!
//! - [`Error`]: infrastructure failures (store I/O, configuration)
//! - [`ProviderError`]: failures reported by the external geofencing provider
//! - [`RegistrationError`]: caller-facing result of register/remove requests

use std::time::Duration;
use thiserror::Error;

/// Result type alias for geofence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the geofence registry
#[derive(Error, Debug)]
pub enum Error {
    /// Region store errors (unreadable, corrupt, or failed write)
    #[error("Region store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a region store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure reported by a [`GeofenceProvider`](crate::traits::GeofenceProvider)
///
/// Reported exactly once per provider call, never once per region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider refused the request (bad region, quota, missing location permission)
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// No completion was reported within the configured bound
    #[error("provider did not respond within {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Caller-facing error for register and remove requests
///
/// Every variant guarantees the region store is in its pre-call state,
/// except [`RegistrationError::Persistence`], where the provider already
/// accepted the change but the store could not record it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Malformed or missing input; rejected before any side effect
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The geofencing provider refused or failed the operation
    #[error("Provider rejected request: {0}")]
    ProviderRejected(ProviderError),

    /// The provider confirmed, but the region store write failed
    #[error("Failed to persist regions: {0}")]
    Persistence(String),
}

impl RegistrationError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<ProviderError> for RegistrationError {
    fn from(err: ProviderError) -> Self {
        Self::ProviderRejected(err)
    }
}
