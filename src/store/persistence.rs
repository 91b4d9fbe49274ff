//! Persistence gateway
//!
//! Bridges a [`RecordStore`] and its JSON snapshot file. Loading migrates
//! older layouts in place (once, keeping a backup of the original bytes);
//! saving is skipped while the store is clean and goes through an atomic
//! temp-file rename otherwise.

use crate::common::utils::{sibling_path, write_atomic};
use crate::common::{Error, Result, Snapshot};
use crate::store::migration::StoredSnapshot;
use crate::store::record_store::RecordStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// A versioned snapshot file on disk
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot, migrating it to the current version if needed.
    ///
    /// A missing file yields an empty snapshot. Any read, parse or rewrite
    /// failure is fatal and reported with the file path.
    pub fn load(&self) -> Result<Snapshot> {
        self.load_inner().map_err(|e| {
            tracing::error!(
                "Failed to load prospecting data file at '{}': {}. Either delete that file or check what is causing the problem.",
                self.path.display(),
                e
            );
            Error::load(&self.path, e)
        })
    }

    fn load_inner(&self) -> Result<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No snapshot at {}, starting empty", self.path.display());
                return Ok(Snapshot::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let stored = StoredSnapshot::parse(&bytes)?;
        if stored.is_current() {
            let snapshot = stored.into_current();
            tracing::info!(
                "Loaded {} prospect record(s) from {}",
                snapshot.len(),
                self.path.display()
            );
            return Ok(snapshot);
        }

        let from = stored.version();
        let backup = sibling_path(&self.path, &format!(".v{}.bak", from));
        fs::write(&backup, &bytes)?;

        let snapshot = stored.into_current();
        self.save(&snapshot)?;
        tracing::info!(
            "Migrated {} from v{} to v{} ({} record(s), original kept at {})",
            self.path.display(),
            from,
            snapshot.version,
            snapshot.len(),
            backup.display()
        );
        Ok(snapshot)
    }

    /// Write the version header and the full record list.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec(snapshot)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    /// Copy a predecessor's data file into place when ours does not exist
    /// yet. Returns whether a copy happened.
    pub fn adopt_legacy(&self, legacy: &Path) -> Result<bool> {
        if self.exists() || !legacy.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::copy(legacy, &self.path)?;
        tracing::info!(
            "Adopted legacy data file {} as {}",
            legacy.display(),
            self.path.display()
        );
        Ok(true)
    }
}

/// A record store bound to its snapshot file.
#[derive(Debug)]
pub struct Persistence {
    store: Arc<RecordStore>,
    file: SnapshotFile,
    // Orders overlapping saves (timer tick vs shutdown).
    save_lock: Mutex<()>,
}

impl Persistence {
    /// Load the file (migrating if needed) into a new store.
    pub fn open(file: SnapshotFile) -> Result<Self> {
        let snapshot = file.load()?;
        Ok(Self::with_store(
            Arc::new(RecordStore::from_snapshot(snapshot)),
            file,
        ))
    }

    pub fn with_store(store: Arc<RecordStore>, file: SnapshotFile) -> Self {
        Self {
            store,
            file,
            save_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }

    /// Save if anything changed since the last save.
    ///
    /// The records are copied under the store lock and written after it is
    /// released, so a slow disk never blocks upserts. Returns whether the
    /// file was written.
    pub fn save(&self) -> Result<bool> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(snapshot) = self.store.take_dirty_snapshot() else {
            return Ok(false);
        };

        if let Err(e) = self.file.save(&snapshot) {
            self.store.mark_dirty();
            tracing::error!("Failed to save {}: {}", self.file.path().display(), e);
            return Err(e);
        }

        tracing::info!(
            "Saved {} prospect record(s) to {}",
            snapshot.len(),
            self.file.path().display()
        );
        Ok(true)
    }
}
