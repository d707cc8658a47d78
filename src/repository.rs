//! Repository facade.
//!
//! Composes one [`Catalog`], one [`AssetCache`], and one
//! [`LifecycleManager`] scoped to a single install path. Nothing is shared
//! across `Repository` instances, so one process can drive several
//! independent repository clients without interference.
//!
//! The surface mirrors the operations a front end needs: load/lookup,
//! icon and screenshot retrieval, install, uninstall, and enumeration of
//! installed packages.

use crate::cache::{AssetCache, ResourceKind};
use crate::catalog::{Catalog, CatalogSnapshot, LoadMode, PackageRecord};
use crate::lifecycle::{LifecycleManager, ProgressCallback};
use crate::store::{InstalledRecord, ManifestStore};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

pub struct Repository {
    name: String,
    cache: Arc<AssetCache>,
    catalog: Catalog,
    state: Mutex<RepoState>,
}

struct RepoState {
    install_path: PathBuf,
    // Constructed on the first lifecycle call; once present the install
    // path can no longer change.
    lifecycle: Option<Arc<LifecycleManager>>,
}

/// Resolve the catalog document URL for a repository base URL. Repositories
/// serve their catalog at `<base>/repo.json`; a URL already pointing at a
/// `.json` document is used as-is.
pub fn catalog_url(repository_url: &str) -> Result<String> {
    if repository_url.ends_with(".json") {
        return Ok(repository_url.to_string());
    }
    let mut base = repository_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let url = Url::parse(&base)?.join("repo.json")?;
    Ok(url.to_string())
}

impl Repository {
    /// Create a repository client. `mode` controls whether the catalog is
    /// fetched now or on first access; the install path defaults to the
    /// current directory until [`set_install_path`](Self::set_install_path)
    /// is called.
    pub fn new<P: AsRef<Path>>(
        name: &str,
        repository_url: &str,
        mode: LoadMode,
        cache_dir: P,
    ) -> Result<Self> {
        let cache = Arc::new(AssetCache::new(cache_dir)?);
        let catalog = Catalog::new(name, &catalog_url(repository_url)?, mode, Arc::clone(&cache))?;
        Ok(Self {
            name: name.to_string(),
            cache,
            catalog,
            state: Mutex::new(RepoState {
                install_path: std::env::current_dir()?,
                lifecycle: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the install root. Only valid before `init_get` or any
    /// lifecycle call; afterwards a fresh `Repository` is required.
    pub fn set_install_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.lifecycle.is_some() {
            return Err(Error::InvalidState(
                "install path cannot change after init or a lifecycle call; \
                 create a new Repository for a different install root"
                    .to_string(),
            ));
        }
        state.install_path = path.as_ref().to_path_buf();
        Ok(())
    }

    pub fn install_path(&self) -> PathBuf {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.install_path.clone()
    }

    /// True iff the install path carries a readable package index.
    pub fn check_if_get_init(&self) -> bool {
        let path = self.install_path();
        ManifestStore::new(path).is_initialized()
    }

    /// Initialize the package index at the install path. Idempotent.
    pub fn init_get(&self) -> Result<()> {
        self.manager_with(|store| store.init()).map(|_| ())
    }

    /// Recreate the package index, discarding existing records. The explicit
    /// recovery path for a corrupt index.
    pub fn reinit_get(&self) -> Result<()> {
        self.manager_with(|store| store.init_force()).map(|_| ())
    }

    /// Current lifecycle manager, constructing (and pinning the install
    /// path) on first use.
    fn manager(&self) -> Result<Arc<LifecycleManager>> {
        self.manager_with(|_| Ok(()))
    }

    fn manager_with<F: FnOnce(&ManifestStore) -> Result<()>>(
        &self,
        init: F,
    ) -> Result<Arc<LifecycleManager>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.lifecycle {
            Some(manager) => {
                init(manager.store())?;
                Ok(Arc::clone(manager))
            }
            None => {
                let store = Arc::new(ManifestStore::new(&state.install_path));
                init(&store)?;
                let manager = Arc::new(LifecycleManager::new(store, Arc::clone(&self.cache)));
                state.lifecycle = Some(Arc::clone(&manager));
                Ok(manager)
            }
        }
    }

    // ------------------------------------------------------------------
    // Catalog surface
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        self.catalog.snapshot()
    }

    pub fn packages(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.catalog.snapshot()?.packages().to_vec())
    }

    pub fn lookup(&self, name: &str) -> Result<PackageRecord> {
        self.catalog.lookup(name)
    }

    pub fn reload(&self) -> Result<Arc<CatalogSnapshot>> {
        self.catalog.reload()
    }

    // ------------------------------------------------------------------
    // Asset surface
    // ------------------------------------------------------------------

    /// Fetch a package's icon into the cache and return its local path.
    /// Unknown names fail before any network activity.
    pub fn get_icon(&self, name: &str) -> Result<PathBuf> {
        let record = self.catalog.lookup(name)?;
        self.cache.fetch(ResourceKind::Icon, name, &record.icon_url)
    }

    /// Fetch a package's screenshot into the cache and return its local path.
    pub fn get_screenshot(&self, name: &str) -> Result<PathBuf> {
        let record = self.catalog.lookup(name)?;
        self.cache
            .fetch(ResourceKind::Screenshot, name, &record.screenshot_url)
    }

    // ------------------------------------------------------------------
    // Lifecycle surface
    // ------------------------------------------------------------------

    /// Install (or upgrade) a package by catalog name.
    pub fn install(&self, name: &str, progress: Option<ProgressCallback>) -> Result<InstalledRecord> {
        let record = self.catalog.lookup(name)?;
        self.install_record(&record, progress)
    }

    /// Install from an already-resolved record (e.g. from a previous
    /// snapshot).
    pub fn install_record(
        &self,
        record: &PackageRecord,
        progress: Option<ProgressCallback>,
    ) -> Result<InstalledRecord> {
        self.manager()?.install(record, progress)
    }

    pub fn uninstall(&self, name: &str) -> Result<()> {
        self.manager()?.uninstall(name)
    }

    pub fn get_installed(&self, name: &str) -> Result<Option<InstalledRecord>> {
        self.manager()?.store().get(name)
    }

    pub fn list_installed(&self) -> Result<Vec<String>> {
        self.manager()?.list_installed()
    }
}
