// # Memory Region Store
//
// In-memory implementation of RegionStore.
//
// ## Purpose
//
// A fast store that doesn't persist across restarts. Useful for testing and
// for embedding where the host application owns persistence.
//
// ## Crash Behavior
//
// - All regions are lost on restart
// - `resynchronize()` after a restart has nothing to replay

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::region_store::{RegionStore, RegistrySnapshot};

/// In-memory region store
///
/// Clones share the same snapshot.
///
/// # Example
///
/// ```rust,no_run
/// use geofence_core::store::MemoryRegionStore;
/// use geofence_core::traits::{Region, RegionStore, RegistrySnapshot};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRegionStore::new();
///
///     let snapshot = RegistrySnapshot::from(vec![Region::new("home", 37.0, -122.0, 100.0)?]);
///     store.save(&snapshot).await?;
///
///     assert_eq!(store.load().await?.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRegionStore {
    inner: Arc<RwLock<RegistrySnapshot>>,
}

impl MemoryRegionStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store pre-populated with a snapshot
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Get the number of stored regions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RegionStore for MemoryRegionStore {
    async fn load(&self) -> Result<RegistrySnapshot, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), Error> {
        *self.inner.write().await = snapshot.clone();
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
