// # File Region Store
//
// File-based implementation of RegionStore with crash recovery.
//
// ## Purpose
//
// Keeps the registered regions across process restarts so that
// `RegistryCoordinator::resynchronize()` can re-arm them.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename, temp file fsynced before the rename
// - Whole-load validation: one malformed record fails the whole load
// - Automatic backup: keeps `.backup` of the last good snapshot
// - Recovery: falls back to the backup if the main file is unreadable
//
// ## File Format
//
// A single JSON array (the storage slot), compact encoding:
//
// ```json
// [{"id":"home","lat":37.0,"lng":-122.0,"radiusMeters":100.0}]
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::region_store::{RegionStore, RegistrySnapshot};

/// File-based region store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use geofence_core::store::FileRegionStore;
/// use geofence_core::traits::{Region, RegionStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRegionStore::new("/var/lib/geofence/saved_geofences.json").await?;
///
///     let mut snapshot = store.load().await?;
///     snapshot.upsert(Region::new("home", 37.0, -122.0, 100.0)?);
///     store.save(&snapshot).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRegionStore {
    path: PathBuf,
    /// Serializes writers so two saves never share the temp file
    write_lock: Mutex<()>,
}

impl FileRegionStore {
    /// Open a file region store, creating parent directories if needed
    ///
    /// Nothing is read here; a missing file is an empty snapshot.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the storage slot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse a snapshot file
    async fn read_snapshot(path: &Path) -> Result<RegistrySnapshot, Error> {
        if !path.exists() {
            tracing::debug!("Region file does not exist: {}", path.display());
            return Ok(RegistrySnapshot::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read region file {}: {}",
                path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(RegistrySnapshot::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::store(format!(
                "Failed to parse region file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load with fallback to the backup copy
    async fn load_with_recovery(&self) -> Result<RegistrySnapshot, Error> {
        let err = match Self::read_snapshot(&self.path).await {
            Ok(snapshot) => {
                tracing::debug!("Loaded {} region(s) from {}", snapshot.len(), self.path.display());
                return Ok(snapshot);
            }
            Err(e) => e,
        };

        tracing::warn!("Region file appears corrupted: {}. Attempting recovery from backup.", err);

        let backup_path = Self::backup_path(&self.path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found for {}", self.path.display());
            return Err(err);
        }

        match Self::read_snapshot(&backup_path).await {
            Ok(snapshot) => {
                tracing::info!("Recovered {} region(s) from backup", snapshot.len());
                if let Err(restore_err) = Self::restore_from_backup(&self.path, &backup_path).await {
                    tracing::error!("Failed to restore region file from backup: {}", restore_err);
                }
                Ok(snapshot)
            }
            Err(backup_err) => {
                tracing::error!("Backup also unreadable: {}", backup_err);
                Err(err)
            }
        }
    }

    /// Write a snapshot atomically
    async fn write_snapshot(&self, snapshot: &RegistrySnapshot) -> Result<(), Error> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| Error::store(format!("Failed to serialize regions: {}", e)))?;

        let _guard = self.write_lock.lock().await;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Regions written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore the region file from its backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored region file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RegionStore for FileRegionStore {
    async fn load(&self) -> Result<RegistrySnapshot, Error> {
        self.load_with_recovery().await
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), Error> {
        self.write_snapshot(snapshot).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Region;
    use tempfile::tempdir;

    fn region(id: &str, lat: f64, lng: f64, radius: f64) -> Region {
        Region::new(id, lat, lng, radius).unwrap()
    }

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");

        let store = FileRegionStore::new(&path).await.unwrap();

        // Initially empty
        assert!(store.load().await.unwrap().is_empty());

        let mut snapshot = RegistrySnapshot::new();
        snapshot.upsert(region("home", 37.0, -122.0, 100.0));
        store.save(&snapshot).await.unwrap();
        assert!(path.exists());

        // Load new instance and verify persistence
        let store2 = FileRegionStore::new(&path).await.unwrap();
        assert_eq!(store2.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("geofence").join("regions.json");

        let store = FileRegionStore::new(&path).await.unwrap();
        store.save(&RegistrySnapshot::new()).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_load_is_fixed_point() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        let store = FileRegionStore::new(&path).await.unwrap();

        let snapshot = RegistrySnapshot::from(vec![
            region("home", 37.0, -122.0, 100.0),
            region("work", 40.7128, -74.006, 250.5),
        ]);
        store.save(&snapshot).await.unwrap();
        let first = fs::read(&path).await.unwrap();

        let loaded = store.load().await.unwrap();
        store.save(&loaded).await.unwrap();
        let second = fs::read(&path).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        fs::write(&path, b"[]").await.unwrap();

        let store = FileRegionStore::new(&path).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());

        fs::write(&path, b"").await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_fails_whole_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        fs::write(
            &path,
            br#"[{"id":"home","lat":37.0,"lng":-122.0,"radiusMeters":100.0},{"id":"work","lat":40.0}]"#,
        )
        .await
        .unwrap();

        let store = FileRegionStore::new(&path).await.unwrap();
        let result = store.load().await;

        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_repeated_id_fails_whole_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        fs::write(
            &path,
            br#"[{"id":"home","lat":37.0,"lng":-122.0,"radiusMeters":100.0},{"id":"home","lat":38.0,"lng":-123.0,"radiusMeters":50.0}]"#,
        )
        .await
        .unwrap();

        let store = FileRegionStore::new(&path).await.unwrap();
        assert!(matches!(store.load().await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_invalid_region_falls_back_to_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        let store = FileRegionStore::new(&path).await.unwrap();

        let good = RegistrySnapshot::from(vec![region("home", 37.0, -122.0, 100.0)]);
        store.save(&good).await.unwrap();
        store.save(&good).await.unwrap();

        // Zero radius would poison the whole resynchronize batch
        fs::write(
            &path,
            br#"[{"id":"home","lat":37.0,"lng":-122.0,"radiusMeters":100.0},{"id":"bad","lat":1.0,"lng":2.0,"radiusMeters":0.0}]"#,
        )
        .await
        .unwrap();

        assert_eq!(store.load().await.unwrap(), good);
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");

        let store = FileRegionStore::new(&path).await.unwrap();
        let first = RegistrySnapshot::from(vec![region("home", 37.0, -122.0, 100.0)]);
        store.save(&first).await.unwrap();

        // Second write moves the first snapshot into the backup
        let second = RegistrySnapshot::from(vec![region("home", 38.0, -123.0, 50.0)]);
        store.save(&second).await.unwrap();
        assert!(FileRegionStore::backup_path(&path).exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = store.load().await.unwrap();
        assert_eq!(recovered, first, "Backup should contain previous snapshot");

        // Main file was restored from the backup
        let reread = FileRegionStore::read_snapshot(&path).await.unwrap();
        assert_eq!(reread, first);
    }

    #[tokio::test]
    async fn test_corruption_without_backup_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");
        fs::write(&path, b"{not json").await.unwrap();

        let store = FileRegionStore::new(&path).await.unwrap();
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved_geofences.json");

        let store = FileRegionStore::new(&path).await.unwrap();

        for i in 0..10 {
            let snapshot =
                RegistrySnapshot::from(vec![region("home", 37.0 + i as f64, -122.0, 100.0)]);
            store.save(&snapshot).await.unwrap();
        }

        assert!(!store.temp_path().exists(), "temp file must be renamed away");

        let store2 = FileRegionStore::new(&path).await.unwrap();
        let last = store2.load().await.unwrap();
        assert_eq!(last.get("home").map(|r| r.latitude), Some(46.0));
    }
}
