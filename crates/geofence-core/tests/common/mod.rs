//! Test doubles and common utilities for registry contract tests
//!
//! This module provides minimal test doubles that record how the
//! coordinator drives its collaborators.

use async_trait::async_trait;
use geofence_core::error::{Error, ProviderError, Result};
use geofence_core::traits::{
    GeofenceProvider, GeofenceRequest, Region, RegionStore, RegistrySnapshot, TransitionEvent,
};
use geofence_core::{CoordinatorConfig, MemoryRegionStore, RegistryCoordinator, RegistryEvent};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// How a [`ScriptedProvider`] answers calls
#[derive(Debug, Clone)]
pub enum ProviderMode {
    /// Every call succeeds
    Accept,
    /// Every call fails with this rejection message
    Reject(String),
    /// Every call fails as unavailable
    Unavailable,
    /// Calls never complete
    Hang,
}

/// A provider whose answers are scripted by the test
///
/// Clones share counters, recorded requests and mode.
#[derive(Clone)]
pub struct ScriptedProvider {
    mode: Arc<Mutex<ProviderMode>>,
    register_call_count: Arc<AtomicUsize>,
    unregister_call_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<GeofenceRequest>>>,
    unregistered: Arc<Mutex<Vec<Vec<String>>>>,
    transitions_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<TransitionEvent>>>>,
    transitions_tx: mpsc::UnboundedSender<TransitionEvent>,
}

impl ScriptedProvider {
    pub fn new(mode: ProviderMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            mode: Arc::new(Mutex::new(mode)),
            register_call_count: Arc::new(AtomicUsize::new(0)),
            unregister_call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            unregistered: Arc::new(Mutex::new(Vec::new())),
            transitions_rx: Arc::new(Mutex::new(Some(rx))),
            transitions_tx: tx,
        }
    }

    pub fn accepting() -> Self {
        Self::new(ProviderMode::Accept)
    }

    pub fn rejecting(message: &str) -> Self {
        Self::new(ProviderMode::Reject(message.to_string()))
    }

    /// Change how subsequent calls are answered
    pub fn set_mode(&self, mode: ProviderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Get the number of times register_batch() was called
    pub fn register_call_count(&self) -> usize {
        self.register_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times unregister() was called
    pub fn unregister_call_count(&self) -> usize {
        self.unregister_call_count.load(Ordering::SeqCst)
    }

    /// Every registration request received, in order
    pub fn requests(&self) -> Vec<GeofenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Every id list passed to unregister(), in order
    pub fn unregistered(&self) -> Vec<Vec<String>> {
        self.unregistered.lock().unwrap().clone()
    }

    /// Push a transition event into the provider's stream
    pub fn emit_transition(&self, event: TransitionEvent) {
        let _ = self.transitions_tx.send(event);
    }

    async fn answer(&self) -> std::result::Result<(), ProviderError> {
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            ProviderMode::Accept => Ok(()),
            ProviderMode::Reject(message) => Err(ProviderError::rejected(message)),
            ProviderMode::Unavailable => Err(ProviderError::unavailable("location service offline")),
            ProviderMode::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl GeofenceProvider for ScriptedProvider {
    async fn register_batch(&self, request: &GeofenceRequest) -> std::result::Result<(), ProviderError> {
        self.register_call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.answer().await
    }

    async fn unregister(&self, ids: &[String]) -> std::result::Result<(), ProviderError> {
        self.unregister_call_count.fetch_add(1, Ordering::SeqCst);
        self.unregistered.lock().unwrap().push(ids.to_vec());
        self.answer().await
    }

    fn transitions(&self) -> Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>> {
        let rx = self
            .transitions_rx
            .lock()
            .unwrap()
            .take()
            .expect("transitions() can only be called once");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// A store that reads normally but refuses every write
#[derive(Clone, Default)]
pub struct ReadOnlyStore {
    inner: MemoryRegionStore,
    save_attempts: Arc<AtomicUsize>,
}

impl ReadOnlyStore {
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            inner: MemoryRegionStore::with_snapshot(snapshot),
            save_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegionStore for ReadOnlyStore {
    async fn load(&self) -> Result<RegistrySnapshot> {
        self.inner.load().await
    }

    async fn save(&self, _snapshot: &RegistrySnapshot) -> Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("disk full"))
    }

    fn store_name(&self) -> &'static str {
        "read-only"
    }
}

/// Build a coordinator over a scripted provider and a store
pub fn coordinator_with(
    provider: &ScriptedProvider,
    store: impl RegionStore + 'static,
) -> (RegistryCoordinator, mpsc::Receiver<RegistryEvent>) {
    coordinator_with_config(provider, store, CoordinatorConfig::default())
}

pub fn coordinator_with_config(
    provider: &ScriptedProvider,
    store: impl RegionStore + 'static,
    config: CoordinatorConfig,
) -> (RegistryCoordinator, mpsc::Receiver<RegistryEvent>) {
    RegistryCoordinator::new(Box::new(provider.clone()), Box::new(store), config)
        .expect("coordinator construction succeeds")
}

/// Shorthand for a valid region
pub fn region(id: &str, lat: f64, lng: f64, radius: f64) -> Region {
    Region::new(id, lat, lng, radius).expect("valid region")
}

/// Drain every event currently queued on the receiver
pub fn drain_events(rx: &mut mpsc::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
