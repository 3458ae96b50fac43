// Registry persistence: whole-registry JSON snapshots with a backup copy.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::FileExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use ladder_common::LadderError;

use crate::registry::{Registry, RegistrySnapshot};

pub const PRIMARY_FILE: &str = "player_data.json";
pub const BACKUP_FILE: &str = "player_data_backup.json";
pub const LOCK_FILE: &str = "player_data.lock";

/// Exclusive hold on the stored registry across processes. Released on drop.
pub struct StoreLock {
    _file: Option<File>,
}

impl StoreLock {
    /// For stores only one process can reach.
    pub fn in_process() -> Self {
        Self { _file: None }
    }
}

/// Durable home of the registry.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Load the latest snapshot. Absence or corruption of every copy yields an
    /// empty snapshot; a cold start is not an error.
    async fn load(&self) -> RegistrySnapshot;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), LadderError>;

    /// Wait for exclusive access. Hold the guard across load, mutate and save.
    async fn lock(&self) -> Result<StoreLock, LadderError> {
        Ok(StoreLock::in_process())
    }
}

/// Load a registry and rebuild its ownership index.
pub async fn load_registry(store: &dyn RegistryStore) -> Registry {
    let registry = Registry::from_snapshot(store.load().await);
    info!(
        identities = registry.len(),
        owners = registry.owner_count(),
        "Registry loaded"
    );
    registry
}

/// Save the registry and clear its unsaved flag.
pub async fn save_registry(
    store: &dyn RegistryStore,
    registry: &mut Registry,
) -> Result<(), LadderError> {
    store.save(&registry.snapshot()).await?;
    registry.mark_saved();
    Ok(())
}

/// Save the registry, logging instead of failing. In-memory state stays
/// authoritative; the next successful save carries any unsaved changes.
pub async fn persist(store: &dyn RegistryStore, registry: &mut Registry) -> bool {
    match save_registry(store, registry).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Failed to save registry");
            false
        }
    }
}

/// JSON files under a data directory: a primary file and the previous primary as backup.
///
/// Several processes may share one directory; writers serialize on an
/// advisory lock file next to the data.
pub struct FileStore {
    primary: PathBuf,
    backup: PathBuf,
    lock: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            primary: dir.join(PRIMARY_FILE),
            backup: dir.join(BACKUP_FILE),
            lock: dir.join(LOCK_FILE),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    async fn read_snapshot(path: &Path) -> Result<Option<RegistrySnapshot>, LadderError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Copy the primary over the backup, but only if the primary is a
    /// readable registry. A corrupt primary must not clobber a good backup.
    async fn back_up_primary(&self) -> Result<(), LadderError> {
        let bytes = match tokio::fs::read(&self.primary).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = serde_json::from_slice::<RegistrySnapshot>(&bytes) {
            warn!(path = %self.primary.display(), error = %e, "Primary player data is unreadable, keeping existing backup");
            return Ok(());
        }
        tokio::fs::write(&self.backup, &bytes).await?;
        Ok(())
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), LadderError> {
        let tmp = self.primary.with_extension("json.tmp");
        {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp, &self.primary).await?;
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for FileStore {
    async fn load(&self) -> RegistrySnapshot {
        match Self::read_snapshot(&self.primary).await {
            Ok(Some(snapshot)) => {
                debug!(path = %self.primary.display(), "Player data loaded");
                return snapshot;
            }
            Ok(None) => {}
            Err(e) => {
                error!(path = %self.primary.display(), error = %e, "Failed to load player data");
            }
        }

        match Self::read_snapshot(&self.backup).await {
            Ok(Some(snapshot)) => {
                warn!(path = %self.backup.display(), "Loaded player data from backup");
                snapshot
            }
            Ok(None) => {
                info!("No existing player data found, starting fresh");
                RegistrySnapshot::default()
            }
            Err(e) => {
                error!(path = %self.backup.display(), error = %e, "Failed to load backup player data, starting fresh");
                RegistrySnapshot::default()
            }
        }
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), LadderError> {
        if let Some(parent) = self.primary.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;

        self.back_up_primary().await?;
        self.write_atomic(&bytes).await?;

        info!(identities = snapshot.identities.len(), "Player data saved successfully");
        Ok(())
    }

    async fn lock(&self) -> Result<StoreLock, LadderError> {
        let path = self.lock.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| LadderError::Anyhow(e.into()))??;
        debug!(path = %self.lock.display(), "Acquired store lock");
        Ok(StoreLock { _file: Some(file) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_common::{OwnerId, Tag};

    fn sample() -> Registry {
        let mut reg = Registry::new();
        reg.link("2PYLQC", OwnerId::from("U1"), "Ana").unwrap();
        reg.link("8QG", OwnerId::from("U2"), "Bo").unwrap();
        reg.add_points(&Tag::parse("2PYLQC").unwrap(), 20);
        reg
    }

    #[tokio::test]
    async fn round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut reg = sample();

        assert!(persist(&store, &mut reg).await);
        assert!(!reg.has_unsaved_changes());
        let loaded = load_registry(&store).await;

        assert_eq!(loaded.snapshot(), reg.snapshot());
        assert_eq!(loaded.owner_totals(), reg.owner_totals());
    }

    #[tokio::test]
    async fn missing_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.load().await.identities.is_empty());
    }

    #[tokio::test]
    async fn second_save_backs_up_previous_primary() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut reg = sample();

        store.save(&reg.snapshot()).await.unwrap();
        assert!(!store.backup_path().exists());
        let first = std::fs::read(store.primary_path()).unwrap();

        reg.add_points(&Tag::parse("8QG").unwrap(), 2);
        store.save(&reg.snapshot()).await.unwrap();

        assert_eq!(std::fs::read(store.backup_path()).unwrap(), first);
        assert_ne!(std::fs::read(store.primary_path()).unwrap(), first);
    }

    #[tokio::test]
    async fn corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let reg = sample();
        store.save(&reg.snapshot()).await.unwrap();
        std::fs::copy(store.primary_path(), store.backup_path()).unwrap();
        std::fs::write(store.primary_path(), b"{ not json").unwrap();

        assert_eq!(store.load().await, reg.snapshot());
    }

    #[tokio::test]
    async fn save_after_corrupt_primary_keeps_good_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut reg = sample();
        store.save(&reg.snapshot()).await.unwrap();
        std::fs::copy(store.primary_path(), store.backup_path()).unwrap();
        let good_backup = std::fs::read(store.backup_path()).unwrap();
        std::fs::write(store.primary_path(), b"{ not json").unwrap();

        let mut loaded = load_registry(&store).await;
        assert_eq!(loaded.snapshot(), reg.snapshot());
        loaded.add_points(&Tag::parse("8QG").unwrap(), 2);
        store.save(&loaded.snapshot()).await.unwrap();

        assert_eq!(std::fs::read(store.backup_path()).unwrap(), good_backup);
        reg.add_points(&Tag::parse("8QG").unwrap(), 2);
        assert_eq!(store.load().await, reg.snapshot());
    }

    #[tokio::test]
    async fn lock_is_exclusive_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStore::new(dir.path());
        let second = FileStore::new(dir.path());

        let held = first.lock().await.unwrap();
        let waiting = tokio::spawn(async move { second.lock().await.map(|_| ()) });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        drop(held);
        waiting.await.unwrap().unwrap();
        assert!(first.lock().await.is_ok());
    }

    #[tokio::test]
    async fn both_corrupt_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.primary_path(), b"[").unwrap();
        std::fs::write(store.backup_path(), b"]").unwrap();

        assert!(store.load().await.identities.is_empty());
    }

    #[tokio::test]
    async fn reads_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(
            store.primary_path(),
            br#"{
                "player_data": {"2PYLQC": {"discord_id": 111, "points": 34, "name": "Ana"}},
                "user_accounts": {"999": ["2PYLQC"]}
            }"#,
        )
        .unwrap();

        let reg = load_registry(&store).await;
        let owner = OwnerId::from("111");
        assert_eq!(reg.linked_accounts(&owner).total_points, 34);
        assert_eq!(reg.account_count(&OwnerId::from("999")), 0);
    }
}
