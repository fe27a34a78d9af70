//! Contract Test: Resynchronize
//!
//! This test verifies the startup catch-up step that re-arms every stored
//! region after the provider lost its monitoring set.
//!
//! Constraints verified:
//! - An empty store issues no provider call
//! - N stored regions are re-armed by exactly one batched call
//! - Failure is reported, not retried, and never changes the store
//! - Unreadable store data counts as "nothing stored"
//! - Regions survive a simulated process restart

mod common;

use common::*;
use geofence_core::traits::{InitialTrigger, RegionStore, RegistrySnapshot};
use geofence_core::{
    CoordinatorConfig, FileRegionStore, LocalGeofenceProvider, MemoryRegionStore, ProviderError,
    RegistryCoordinator, RegistryEvent, ResyncOutcome,
};
use tempfile::tempdir;

#[tokio::test]
async fn empty_store_issues_no_provider_call() {
    let provider = ScriptedProvider::accepting();
    let (coordinator, _events) = coordinator_with(&provider, MemoryRegionStore::new());

    assert_eq!(coordinator.resynchronize().await, ResyncOutcome::Empty);
    assert_eq!(provider.register_call_count(), 0);
}

#[tokio::test]
async fn stored_regions_are_rearmed_in_one_batch() {
    let stored = vec![
        region("home", 37.0, -122.0, 100.0),
        region("work", 40.0, -74.0, 250.0),
        region("gym", 51.5, -0.12, 75.0),
    ];
    let provider = ScriptedProvider::accepting();
    let store = MemoryRegionStore::with_snapshot(RegistrySnapshot::from(stored.clone()));
    let (coordinator, mut events) = coordinator_with(&provider, store);

    assert_eq!(coordinator.resynchronize().await, ResyncOutcome::Rearmed(3));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1, "expected exactly one batched registration");
    assert_eq!(requests[0].regions, stored);
    assert_eq!(requests[0].initial_trigger, InitialTrigger::Enter);
    assert_eq!(
        drain_events(&mut events),
        vec![RegistryEvent::Resynchronized { count: 3 }]
    );
}

#[tokio::test]
async fn failed_resynchronize_keeps_store() {
    let stored = RegistrySnapshot::from(vec![
        region("home", 37.0, -122.0, 100.0),
        region("work", 40.0, -74.0, 250.0),
    ]);
    let provider = ScriptedProvider::rejecting("location services disabled");
    let store = MemoryRegionStore::with_snapshot(stored.clone());
    let (coordinator, _events) = coordinator_with(&provider, store.clone());

    let outcome = coordinator.resynchronize().await;

    assert_eq!(
        outcome,
        ResyncOutcome::Failed {
            count: 2,
            error: ProviderError::rejected("location services disabled"),
        }
    );
    assert_eq!(provider.register_call_count(), 1, "no retry");
    assert_eq!(store.load().await.unwrap(), stored);
}

#[tokio::test]
async fn unreadable_store_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_geofences.json");
    tokio::fs::write(&path, b"[{\"id\":\"home\"}]").await.unwrap();

    let provider = ScriptedProvider::accepting();
    let store = FileRegionStore::new(&path).await.unwrap();
    let (coordinator, _events) = coordinator_with(&provider, store);

    assert_eq!(coordinator.resynchronize().await, ResyncOutcome::Empty);
    assert!(coordinator.list_regions().await.is_empty());
    assert_eq!(provider.register_call_count(), 0);
}

#[tokio::test]
async fn restart_rearms_previously_registered_regions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_geofences.json");

    // First "run": register two regions
    {
        let (provider, _tx) = LocalGeofenceProvider::new();
        let store = FileRegionStore::new(&path).await.unwrap();
        let (coordinator, _events) =
            RegistryCoordinator::new(Box::new(provider), Box::new(store), CoordinatorConfig::default())
                .expect("coordinator construction succeeds");

        coordinator.register_region("home", 37.0, -122.0, 100.0).await.unwrap();
        coordinator.register_region("work", 40.0, -74.0, 250.0).await.unwrap();
    }

    // Second "run": the new provider starts with nothing armed
    let (provider, _tx) = LocalGeofenceProvider::new();
    let monitored = provider.monitored();
    assert_eq!(monitored.len().await, 0);

    let store = FileRegionStore::new(&path).await.unwrap();
    let (coordinator, _events) =
        RegistryCoordinator::new(Box::new(provider), Box::new(store), CoordinatorConfig::default())
            .expect("coordinator construction succeeds");

    assert_eq!(coordinator.resynchronize().await, ResyncOutcome::Rearmed(2));
    assert_eq!(monitored.ids().await, vec!["home", "work"]);
    assert_eq!(
        monitored.get("work").await,
        Some(region("work", 40.0, -74.0, 250.0))
    );
}

#[tokio::test]
async fn invalid_stored_record_does_not_block_valid_regions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved_geofences.json");

    let store = FileRegionStore::new(&path).await.unwrap();
    let good = RegistrySnapshot::from(vec![region("home", 37.0, -122.0, 100.0)]);
    store.save(&good).await.unwrap();
    store.save(&good).await.unwrap();

    // Primary copy holds a repeated id and a zero radius
    tokio::fs::write(
        &path,
        br#"[{"id":"home","lat":37.0,"lng":-122.0,"radiusMeters":100.0},{"id":"home","lat":38.0,"lng":-123.0,"radiusMeters":50.0},{"id":"bad","lat":1.0,"lng":2.0,"radiusMeters":0.0}]"#,
    )
    .await
    .unwrap();

    let (provider, _tx) = LocalGeofenceProvider::new();
    let monitored = provider.monitored();
    let (coordinator, _events) =
        RegistryCoordinator::new(Box::new(provider), Box::new(store), CoordinatorConfig::default())
            .expect("coordinator construction succeeds");

    assert_eq!(coordinator.resynchronize().await, ResyncOutcome::Rearmed(1));
    assert_eq!(monitored.ids().await, vec!["home"]);

    // One record per id, so removal really forgets it
    coordinator.remove_region("home").await.unwrap();
    assert!(coordinator.list_regions().await.is_empty());
}
