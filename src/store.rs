//! Persisted record of installed packages.
//!
//! The store lives in a hidden `.get/` directory at the install root and
//! holds a single `installed.json` index mapping package name to the exact
//! set of files that package's installation wrote. The index is the single
//! source of truth for "is X installed" and for safe uninstall.
//!
//! Every mutation rewrites the whole index to a temp file and renames it
//! into place, so a crash mid-write never leaves a corrupt index. An index
//! that exists but does not parse fails with
//! [`Error::StateCorruption`](crate::Error::StateCorruption) and blocks all
//! further mutation until it is explicitly recreated with
//! [`ManifestStore::init_force`].

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const STATE_DIR_NAME: &str = ".get";
pub const INDEX_FILE_NAME: &str = "installed.json";

/// What one installed package owns: its version, the relative paths its
/// installation wrote under the install root, and when it was committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub version: String,
    pub files: Vec<String>,
    pub installed_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    hbget_version: String,
    updated_at: String,
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self {
            hbget_version: env!("CARGO_PKG_VERSION").to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    #[serde(default)]
    metadata: IndexMetadata,

    // IndexMap keeps insertion order through the JSON round trip, so
    // list_installed reflects install order.
    #[serde(default)]
    packages: IndexMap<String, InstalledRecord>,
}

pub struct ManifestStore {
    install_root: PathBuf,
    // Held across every read-modify-write of the index, and only that.
    index_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new<P: AsRef<Path>>(install_root: P) -> Self {
        Self {
            install_root: install_root.as_ref().to_path_buf(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.install_root.join(STATE_DIR_NAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.state_dir().join(INDEX_FILE_NAME)
    }

    /// True iff the state directory and index exist and the index parses.
    pub fn is_initialized(&self) -> bool {
        let _guard = self.lock();
        self.index_path().exists() && self.read_index().is_ok()
    }

    /// Create the state directory and an empty index if absent. Idempotent;
    /// refuses to touch an existing index it cannot read.
    pub fn init(&self) -> Result<()> {
        let _guard = self.lock();
        if self.index_path().exists() {
            // No-op when already initialized; corrupt indexes are surfaced,
            // never silently replaced.
            self.read_index()?;
            return Ok(());
        }
        fs::create_dir_all(self.state_dir())?;
        self.write_index(&Index::default())
    }

    /// Recreate an empty index unconditionally, discarding any existing
    /// state. The only way a corrupt index is ever destroyed.
    pub fn init_force(&self) -> Result<()> {
        let _guard = self.lock();
        fs::create_dir_all(self.state_dir())?;
        self.write_index(&Index::default())
    }

    pub fn get(&self, name: &str) -> Result<Option<InstalledRecord>> {
        let _guard = self.lock();
        let index = self.read_index()?;
        Ok(index.packages.get(name).cloned())
    }

    /// Names of installed packages, in insertion order of the current state.
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let _guard = self.lock();
        let index = self.read_index()?;
        Ok(index.packages.keys().cloned().collect())
    }

    /// Write or delete one record atomically. `None` removes the record
    /// (uninstall); `Some` inserts or replaces it.
    pub fn commit(&self, name: &str, record: Option<InstalledRecord>) -> Result<()> {
        let _guard = self.lock();
        let mut index = self.read_index()?;
        match record {
            Some(record) => {
                index.packages.insert(name.to_string(), record);
            }
            None => {
                index.packages.shift_remove(name);
            }
        }
        index.metadata.updated_at = chrono::Utc::now().to_rfc3339();
        self.write_index(&index)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.index_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_index(&self) -> Result<Index> {
        let path = self.index_path();
        if !path.exists() {
            return Err(Error::InvalidState(format!(
                "install path {} is not initialized (no {}/{} index)",
                self.install_root.display(),
                STATE_DIR_NAME,
                INDEX_FILE_NAME
            )));
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::StateCorruption(format!("{}: {}", path.display(), e)))
    }

    fn write_index(&self, index: &Index) -> Result<()> {
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(index)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
