//! Registry coordinator
//!
//! The RegistryCoordinator keeps the region store and the provider's
//! monitoring set convergent:
//! - Registering regions with the provider, then recording them
//! - Unregistering regions, then forgetting them
//! - Replaying the store into the provider after a restart
//!
//! ## Architecture
//!
//! ```text
//!        register / remove / list / resynchronize
//!                          │
//!                          ▼
//!               ┌─────────────────────┐
//!               │ RegistryCoordinator │
//!               └─────────────────────┘
//!                          │
//!         ┌────────────────┼────────────────┐
//!         │                │                │
//!         ▼                ▼                ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │GeofenceProvid│ │ RegionStore  │ │    Events    │
//! │ (arm/disarm) │ │ (persist)    │ │  (notify)    │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Ordering
//!
//! 1. Validate the request (no side effects on failure)
//! 2. Call the provider and wait for its single completion
//! 3. Only on success, load-modify-save the store under the store lock
//!
//! The store is never updated before the provider confirms, so it never
//! claims a region is armed when the provider refused it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::Stream;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{ProviderError, RegistrationError, Result};
use crate::traits::{
    GeofenceProvider, GeofenceRequest, Region, RegionStore, RegistrySnapshot, TransitionEvent,
};

/// Events emitted by the RegistryCoordinator
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// Provider armed the region and the store recorded it
    RegionRegistered { id: String },

    /// Registration failed; the store is unchanged
    RegistrationFailed { id: String, error: String },

    /// Provider disarmed the region and the store forgot it
    RegionRemoved { id: String },

    /// Removal failed; the region is still presumed armed
    RemovalFailed { id: String, error: String },

    /// Stored regions were re-armed after startup
    Resynchronized { count: usize },

    /// Re-arming stored regions failed; the store is unchanged
    ResynchronizeFailed { count: usize, error: String },
}

/// Result of a [`RegistryCoordinator::resynchronize`] pass
#[derive(Debug, Clone, PartialEq)]
pub enum ResyncOutcome {
    /// The store was empty; the provider was not called
    Empty,

    /// Every stored region was re-armed in one batch
    Rearmed(usize),

    /// The batch was refused; retried only on the next resynchronize
    Failed { count: usize, error: ProviderError },
}

/// Geofence registry coordinator
///
/// Owns the provider adapter and the region store for its whole lifetime.
///
/// ## Concurrency
///
/// Provider calls from concurrent requests run independently; each awaits its
/// own completion. Every load-modify-save of the store runs under a single
/// async mutex so concurrent register/remove/resynchronize calls never
/// interleave their store updates.
pub struct RegistryCoordinator {
    /// Platform geofencing service
    provider: Box<dyn GeofenceProvider>,

    /// Durable record of what should be monitored
    store: Box<dyn RegionStore>,

    /// Single-writer guard for the store
    store_lock: Mutex<()>,

    /// Optional bound on each provider call
    provider_timeout: Option<Duration>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<RegistryEvent>,
}

impl RegistryCoordinator {
    /// Create a new coordinator
    ///
    /// # Returns
    ///
    /// A tuple of (coordinator, event_receiver) where event_receiver yields registry events
    pub fn new(
        provider: Box<dyn GeofenceProvider>,
        store: Box<dyn RegionStore>,
        config: CoordinatorConfig,
    ) -> Result<(Self, mpsc::Receiver<RegistryEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let coordinator = Self {
            provider,
            store,
            store_lock: Mutex::new(()),
            provider_timeout: config.provider_timeout(),
            event_tx: tx,
        };

        Ok((coordinator, rx))
    }

    /// Register (or replace) a region
    ///
    /// Arms the region with the provider for ENTER and EXIT, never expiring,
    /// initial trigger ENTER. On confirmation the region replaces any stored
    /// record with the same id.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: blank id, non-finite coordinates or radius <= 0
    /// - `ProviderRejected`: the provider refused; the store is unchanged
    /// - `Persistence`: the provider armed the region but the store write failed
    pub async fn register_region(
        &self,
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> std::result::Result<(), RegistrationError> {
        let region = Region::new(id, latitude, longitude, radius_meters)?;
        let id = region.id.clone();
        let request = GeofenceRequest::new(vec![region.clone()]);

        if let Err(e) = self.call_provider(self.provider.register_batch(&request)).await {
            error!("Failed to register geofence {}: {}", id, e);
            self.emit_event(RegistryEvent::RegistrationFailed {
                id,
                error: e.to_string(),
            });
            return Err(RegistrationError::ProviderRejected(e));
        }

        let persisted = self
            .update_store(|snapshot| {
                if let Some(previous) = snapshot.upsert(region) {
                    debug!("Replacing stored geofence {:?}", previous);
                }
                true
            })
            .await;

        if let Err(e) = persisted {
            error!("Geofence {} armed but not persisted: {}", id, e);
            self.emit_event(RegistryEvent::RegistrationFailed {
                id,
                error: e.to_string(),
            });
            return Err(RegistrationError::Persistence(e.to_string()));
        }

        info!(
            "Registered geofence {} at ({}, {}) radius {}m",
            id, latitude, longitude, radius_meters
        );
        self.emit_event(RegistryEvent::RegionRegistered { id });
        Ok(())
    }

    /// Remove a region
    ///
    /// The provider is always asked to disarm the id, even if it is not
    /// stored. The store is only rewritten if it held the id.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: blank id
    /// - `ProviderRejected`: the provider refused; the region stays listed
    /// - `Persistence`: the provider disarmed the region but the store write failed
    pub async fn remove_region(&self, id: &str) -> std::result::Result<(), RegistrationError> {
        if id.trim().is_empty() {
            return Err(RegistrationError::invalid_argument("region id cannot be blank"));
        }

        let ids = [id.to_string()];
        if let Err(e) = self.call_provider(self.provider.unregister(&ids)).await {
            error!("Failed to remove geofence {}: {}", id, e);
            self.emit_event(RegistryEvent::RemovalFailed {
                id: id.to_string(),
                error: e.to_string(),
            });
            return Err(RegistrationError::ProviderRejected(e));
        }

        let persisted = self
            .update_store(|snapshot| {
                let removed = snapshot.remove(id).is_some();
                if !removed {
                    debug!("Geofence {} was not stored; store unchanged", id);
                }
                removed
            })
            .await;

        if let Err(e) = persisted {
            error!("Geofence {} disarmed but store not updated: {}", id, e);
            self.emit_event(RegistryEvent::RemovalFailed {
                id: id.to_string(),
                error: e.to_string(),
            });
            return Err(RegistrationError::Persistence(e.to_string()));
        }

        info!("Removed geofence {}", id);
        self.emit_event(RegistryEvent::RegionRemoved { id: id.to_string() });
        Ok(())
    }

    /// All stored regions
    ///
    /// Pure read of the store; the provider is not consulted.
    pub async fn list_regions(&self) -> RegistrySnapshot {
        self.load_snapshot().await
    }

    /// Re-arm every stored region in a single batched registration
    ///
    /// Run once at startup. Failure is logged and reported in the outcome,
    /// never retried here, and never changes the store.
    pub async fn resynchronize(&self) -> ResyncOutcome {
        let snapshot = {
            let _guard = self.store_lock.lock().await;
            self.load_snapshot().await
        };

        if snapshot.is_empty() {
            debug!("No stored geofences to re-register");
            return ResyncOutcome::Empty;
        }

        let count = snapshot.len();
        let request = GeofenceRequest::new(snapshot.into_regions());

        match self.call_provider(self.provider.register_batch(&request)).await {
            Ok(()) => {
                info!("Re-registered {} stored geofence(s)", count);
                self.emit_event(RegistryEvent::Resynchronized { count });
                ResyncOutcome::Rearmed(count)
            }
            Err(e) => {
                error!("Failed to re-register {} stored geofence(s): {}", count, e);
                self.emit_event(RegistryEvent::ResynchronizeFailed {
                    count,
                    error: e.to_string(),
                });
                ResyncOutcome::Failed { count, error: e }
            }
        }
    }

    /// Transition stream of the owned provider
    pub fn transitions(&self) -> Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>> {
        self.provider.transitions()
    }

    /// Await a provider completion, bounded by the configured timeout
    async fn call_provider<F>(&self, call: F) -> std::result::Result<(), ProviderError>
    where
        F: Future<Output = std::result::Result<(), ProviderError>>,
    {
        match self.provider_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ProviderError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Load the store, treating unreadable data as empty
    async fn load_snapshot(&self) -> RegistrySnapshot {
        match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Failed to load regions from {} store, treating as empty: {}",
                    self.store.store_name(),
                    e
                );
                RegistrySnapshot::new()
            }
        }
    }

    /// Load-modify-save under the store lock
    ///
    /// `mutate` returns whether it changed the snapshot; unchanged snapshots
    /// are not written back.
    async fn update_store<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut RegistrySnapshot) -> bool,
    {
        let _guard = self.store_lock.lock().await;

        let mut snapshot = self.load_snapshot().await;
        if !mutate(&mut snapshot) {
            return Ok(());
        }

        self.store.save(&snapshot).await
    }

    /// Emit a registry event
    fn emit_event(&self, event: RegistryEvent) {
        // Nobody listening is fine; a full channel means a slow consumer
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            warn!(
                "Registry event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                event
            );
        }
    }
}
