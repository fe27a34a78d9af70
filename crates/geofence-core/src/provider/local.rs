//! In-process geofence provider
//!
//! Keeps the monitored set in memory and turns injected transition
//! notifications into the provider's transition stream. It accepts every
//! well-formed request; it does no location sensing of its own.

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, mpsc};
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::traits::{GeofenceProvider, GeofenceRequest, Region, TransitionEvent, TransitionNotification};

/// Handle for pushing platform notifications into a [`LocalGeofenceProvider`]
#[derive(Debug, Clone)]
pub struct TransitionSender {
    tx: mpsc::UnboundedSender<TransitionEvent>,
}

impl TransitionSender {
    /// Deliver a raw platform notification
    ///
    /// Returns `false` if the transition stream has been dropped.
    pub fn deliver(&self, notification: TransitionNotification) -> bool {
        self.send(notification.into())
    }

    /// Deliver an already-classified event
    pub fn send(&self, event: TransitionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Read-only view of the regions a [`LocalGeofenceProvider`] is monitoring
#[derive(Debug, Clone, Default)]
pub struct MonitoredRegions {
    inner: Arc<RwLock<HashMap<String, Region>>>,
}

impl MonitoredRegions {
    /// Ids currently armed, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Armed definition for `id`
    pub async fn get(&self, id: &str) -> Option<Region> {
        self.inner.read().await.get(id).cloned()
    }

    /// Number of armed regions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// In-process geofence provider
///
/// Like a platform provider, its monitoring set is lost when it is dropped.
pub struct LocalGeofenceProvider {
    monitored: MonitoredRegions,
    /// Receiver handed out by the first `transitions()` call
    transitions_rx: Mutex<Option<mpsc::UnboundedReceiver<TransitionEvent>>>,
}

impl LocalGeofenceProvider {
    /// Create a provider and the sender that feeds its transition stream
    pub fn new() -> (Self, TransitionSender) {
        let (tx, rx) = mpsc::unbounded_channel();

        let provider = Self {
            monitored: MonitoredRegions::default(),
            transitions_rx: Mutex::new(Some(rx)),
        };

        (provider, TransitionSender { tx })
    }

    /// Shared view of the monitored set
    pub fn monitored(&self) -> MonitoredRegions {
        self.monitored.clone()
    }
}

#[async_trait]
impl GeofenceProvider for LocalGeofenceProvider {
    async fn register_batch(&self, request: &GeofenceRequest) -> Result<(), ProviderError> {
        if request.regions.is_empty() {
            return Err(ProviderError::rejected("request contains no regions"));
        }
        for region in &request.regions {
            region
                .validate()
                .map_err(|e| ProviderError::rejected(e.to_string()))?;
        }

        let mut monitored = self.monitored.inner.write().await;
        for region in &request.regions {
            monitored.insert(region.id.clone(), region.clone());
        }
        debug!("Armed {} region(s): {:?}", request.regions.len(), request.region_ids());
        Ok(())
    }

    async fn unregister(&self, ids: &[String]) -> Result<(), ProviderError> {
        let mut monitored = self.monitored.inner.write().await;
        for id in ids {
            if monitored.remove(id).is_none() {
                debug!("Region {} was not armed", id);
            }
        }
        Ok(())
    }

    fn transitions(&self) -> Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>> {
        let rx = match self.transitions_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("Transition stream already taken; returning an empty stream");
                Box::pin(tokio_stream::empty())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
