//! Configuration types for the geofence registry
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default file name of the region storage slot
pub const DEFAULT_STORE_FILE: &str = "saved_geofences.json";

/// Main geofence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Region store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Registry coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl GeofenceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.coordinator.validate()?;
        Ok(())
    }
}

/// Region store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based region store
    File {
        /// Path to the storage slot file
        path: String,
    },

    /// In-memory region store (not persistent)
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("Region store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: DEFAULT_STORE_FILE.to_string(),
        }
    }
}

/// Registry coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound on a single provider call (in seconds)
    ///
    /// A call that exceeds it fails with `ProviderRejected(Timeout)`.
    /// Set to 0 to trust the provider's own completion contract.
    #[serde(default)]
    pub provider_timeout_secs: u64,

    /// Capacity of the registry event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 256 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl CoordinatorConfig {
    /// Validate the coordinator configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Provider timeout, if one is configured
    pub fn provider_timeout(&self) -> Option<Duration> {
        (self.provider_timeout_secs > 0).then(|| Duration::from_secs(self.provider_timeout_secs))
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 0,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    256
}
