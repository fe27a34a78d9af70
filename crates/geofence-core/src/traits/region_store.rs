// # Region Store Trait
//
// Defines the durable record of which geofences should be monitored.
//
// ## Purpose
//
// The region store is the single source of truth for "what should be armed".
// The geofencing provider loses its monitoring set on every process or OS
// restart; the store does not. The coordinator replays the store into the
// provider at startup.
//
// ## Contract
//
// - `load()` returns the whole snapshot; absent data is an empty snapshot
// - `save()` replaces the whole snapshot atomically
//
// ## Usage
//
// ```rust,ignore
// use geofence_core::traits::{Region, RegionStore};
//
// let mut snapshot = store.load().await?;
// snapshot.upsert(Region::new("home", 37.0, -122.0, 100.0)?);
// store.save(&snapshot).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RegistrationError;

/// A circular geographic region registered for monitoring
///
/// Serialized as `{"id", "lat", "lng", "radiusMeters"}`. Unknown fields are
/// ignored on read; a missing field makes the record unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Unique, non-blank identifier (primary key)
    pub id: String,

    /// Latitude of the center, in degrees
    #[serde(rename = "lat")]
    pub latitude: f64,

    /// Longitude of the center, in degrees
    #[serde(rename = "lng")]
    pub longitude: f64,

    /// Radius in meters, always > 0
    #[serde(rename = "radiusMeters")]
    pub radius_meters: f64,
}

impl Region {
    /// Create a validated region
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidArgument`] if `id` is blank, a coordinate
    /// is not finite, or the radius is not a finite positive number.
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Result<Self, RegistrationError> {
        let region = Self {
            id: id.into(),
            latitude,
            longitude,
            radius_meters,
        };
        region.validate()?;
        Ok(region)
    }

    /// Check the region invariants
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.id.trim().is_empty() {
            return Err(RegistrationError::invalid_argument("region id cannot be blank"));
        }
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(RegistrationError::invalid_argument(format!(
                "region {} has non-finite coordinates ({}, {})",
                self.id, self.latitude, self.longitude
            )));
        }
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(RegistrationError::invalid_argument(format!(
                "region {} radius must be > 0, got {}",
                self.id, self.radius_meters
            )));
        }
        Ok(())
    }
}

/// The full set of stored regions; the unit of persistence and replay
///
/// Keeps insertion order. Holds at most one region per id. Deserializing
/// goes through [`RegistrySnapshot::checked`], so a duplicated id or an
/// invalid region rejects the whole array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    regions: Vec<Region>,
}

impl RegistrySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from persisted records
    ///
    /// Unlike `From<Vec<Region>>`, which keeps the last record for a repeated
    /// id, this fails on the first invalid region or repeated id.
    pub fn checked(regions: Vec<Region>) -> Result<Self, RegistrationError> {
        let mut snapshot = Self::new();
        for region in regions {
            region.validate()?;
            if snapshot.get(&region.id).is_some() {
                return Err(RegistrationError::invalid_argument(format!(
                    "region {} is stored more than once",
                    region.id
                )));
            }
            snapshot.regions.push(region);
        }
        Ok(snapshot)
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the snapshot holds no regions
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// All regions, in stored order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Look up a region by id
    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Insert a region, replacing the whole record if the id already exists
    ///
    /// A replaced record keeps its position. Returns the replaced record.
    pub fn upsert(&mut self, region: Region) -> Option<Region> {
        match self.regions.iter_mut().find(|r| r.id == region.id) {
            Some(existing) => Some(std::mem::replace(existing, region)),
            None => {
                self.regions.push(region);
                None
            }
        }
    }

    /// Remove a region by id, returning it if it was present
    pub fn remove(&mut self, id: &str) -> Option<Region> {
        let index = self.regions.iter().position(|r| r.id == id)?;
        Some(self.regions.remove(index))
    }

    /// Ids of all regions, in stored order
    pub fn ids(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.id.clone()).collect()
    }

    /// Consume the snapshot, returning its regions
    pub fn into_regions(self) -> Vec<Region> {
        self.regions
    }
}

impl From<Vec<Region>> for RegistrySnapshot {
    /// Build a snapshot, keeping the last record for duplicated ids
    fn from(regions: Vec<Region>) -> Self {
        let mut snapshot = Self::new();
        for region in regions {
            snapshot.upsert(region);
        }
        snapshot
    }
}

impl<'de> Deserialize<'de> for RegistrySnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let regions = Vec::<Region>::deserialize(deserializer)?;
        Self::checked(regions).map_err(serde::de::Error::custom)
    }
}

/// Trait for region store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, key-value slots)
/// - ✅ Recover from a corrupt primary copy using a backup
///
/// ## Forbidden Capabilities
/// - ❌ Call the geofencing provider (owned by `RegistryCoordinator`)
/// - ❌ Merge or deduplicate regions (the snapshot is saved as given)
/// - ❌ Serialize concurrent load-modify-save cycles (owned by `RegistryCoordinator`)
///
/// ## Atomicity
///
/// `save()` must never leave a partially written snapshot behind: after a
/// crash, `load()` yields either the previous complete snapshot or the new one.
#[async_trait]
pub trait RegionStore: Send + Sync {
    /// Load every persisted region
    ///
    /// # Returns
    ///
    /// - `Ok(snapshot)`: The stored regions (empty if nothing was ever saved)
    /// - `Err(Error)`: Data exists but is unreadable or malformed
    async fn load(&self) -> Result<RegistrySnapshot, crate::Error>;

    /// Atomically replace the persisted snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The new snapshot is durable
    /// - `Err(Error)`: The write failed; the previous snapshot is still readable
    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}
