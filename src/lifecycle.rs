//! Package install/uninstall orchestration.
//!
//! Each operation runs under a mutual-exclusion lock scoped to the package
//! name: concurrent calls for the same name serialize, calls for different
//! names proceed in parallel. Any failure before the final index commit
//! leaves the package's [`ManifestStore`] record exactly as it was before
//! the call began.
//!
//! Install walks `Absent → Fetching → Extracting → Committed`; uninstall
//! walks `Installed → Removing → Absent`. There is no partial-success
//! resting state: archives are unpacked into a staging directory and only
//! promoted into the install root once every entry decompressed cleanly,
//! so a failed attempt never disturbs the files a prior install owns, and
//! the commit itself is a single atomic index replace.

use crate::cache::{AssetCache, ResourceKind};
use crate::catalog::PackageRecord;
use crate::store::{InstalledRecord, ManifestStore};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Progress observer invoked at checkpoints (fetch-started, fetch-complete,
/// extract-complete). Called with a message and a current/total pair.
/// Panics raised by the callback are caught and ignored; they never abort
/// the operation.
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

pub struct LifecycleManager {
    install_root: PathBuf,
    store: Arc<ManifestStore>,
    cache: Arc<AssetCache>,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(store: Arc<ManifestStore>, cache: Arc<AssetCache>) -> Self {
        Self {
            install_root: store.install_root().to_path_buf(),
            store,
            cache,
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Install (or upgrade) one package from its archive.
    ///
    /// On upgrade the new record's file set is exactly the new archive's
    /// contents; files the old version owned but the new one does not are
    /// pruned best-effort.
    pub fn install(
        &self,
        record: &PackageRecord,
        progress: Option<ProgressCallback>,
    ) -> Result<InstalledRecord> {
        let lock = self.name_lock(&record.name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Fail before any network or filesystem work if the index is
        // unreadable or uninitialized.
        let previous = self.store.get(&record.name)?;

        report(&progress, &format!("Fetching {}...", record.name), 0, 100);
        let archive = self
            .cache
            .fetch(ResourceKind::Archive, &record.name, &record.archive_url)?;
        report(&progress, &format!("Fetched {}", record.name), 50, 100);

        let files = self.extract(&record.name, &archive)?;
        report(&progress, &format!("Extracted {}", record.name), 100, 100);

        if let Some(previous) = &previous {
            self.prune_stale(previous, &files);
        }

        let installed = InstalledRecord {
            version: record.version.clone(),
            files,
            installed_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.commit(&record.name, Some(installed.clone()))?;
        debug!(package = %record.name, version = %installed.version, "install committed");
        Ok(installed)
    }

    /// Remove one installed package: delete every entry its record lists
    /// (directories only when empty), clean up now-empty parent
    /// directories, commit the removal.
    pub fn uninstall(&self, name: &str) -> Result<()> {
        let lock = self.name_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let record = self
            .store
            .get(name)?
            .ok_or_else(|| Error::NotInstalled(name.to_string()))?;

        for rel in &record.files {
            remove_entry(&self.install_root.join(rel))?;
        }
        for rel in &record.files {
            remove_empty_parents(&self.install_root, Path::new(rel));
        }

        self.store.commit(name, None)?;
        debug!(package = name, "uninstall committed");
        Ok(())
    }

    /// Installed package names in insertion order. No network, no per-name
    /// lock; the store's own index lock is the only guard.
    pub fn list_installed(&self) -> Result<Vec<String>> {
        self.store.list_installed()
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .name_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Extract the archive, returning the relative path of every entry
    /// written (files and explicit directory entries).
    ///
    /// The archive is first unpacked in full into a staging directory under
    /// the state dir; a bad entry discards the staging directory and the
    /// install root is never touched. Only a completely unpacked staging
    /// set is promoted into place.
    fn extract(&self, name: &str, archive: &Path) -> Result<Vec<String>> {
        let stage_root = self.store.state_dir().join("stage");
        let staging = stage_root.join(name);
        let backup = stage_root.join(format!("{}.prev", name));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        if backup.exists() {
            fs::remove_dir_all(&backup)?;
        }
        fs::create_dir_all(&staging)?;

        let mut entries: Vec<String> = Vec::new();
        if let Err(e) = unpack_archive(archive, &staging, &mut entries) {
            let _ = fs::remove_dir_all(&staging);
            return Err(Error::Extraction(format!("{}: {}", archive.display(), e)));
        }

        let promoted = self.promote(&staging, &backup, &entries);
        let _ = fs::remove_dir_all(&staging);
        let _ = fs::remove_dir_all(&backup);
        promoted.map(|()| entries)
    }

    /// Move staged entries into the install root, one rename per file. Any
    /// prior file about to be overwritten is moved aside first, so a failure
    /// mid-promotion puts every displaced file back and removes what this
    /// attempt placed.
    fn promote(&self, staging: &Path, backup: &Path, entries: &[String]) -> Result<()> {
        let mut placed: Vec<&String> = Vec::new();
        let mut displaced: Vec<&String> = Vec::new();

        let result = (|| -> Result<()> {
            for rel in entries {
                let src = staging.join(rel);
                let dest = self.install_root.join(rel);
                if src.is_dir() {
                    fs::create_dir_all(&dest)?;
                    placed.push(rel);
                    continue;
                }
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                if dest.is_file() {
                    let aside = backup.join(rel);
                    if let Some(parent) = aside.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::rename(&dest, &aside)?;
                    displaced.push(rel);
                }
                fs::rename(&src, &dest)?;
                placed.push(rel);
            }
            Ok(())
        })();

        if let Err(e) = result {
            for rel in placed.iter().rev() {
                let _ = remove_entry(&self.install_root.join(rel.as_str()));
            }
            for rel in &displaced {
                let _ = fs::rename(
                    backup.join(rel.as_str()),
                    self.install_root.join(rel.as_str()),
                );
            }
            for rel in placed.iter().rev() {
                remove_empty_parents(&self.install_root, Path::new(rel.as_str()));
            }
            return Err(Error::Extraction(format!("promotion interrupted: {}", e)));
        }
        Ok(())
    }

    /// Delete entries the old record owned that the new set no longer
    /// contains. Best-effort: missing entries are fine, deletion failures
    /// are logged, never fatal.
    fn prune_stale(&self, previous: &InstalledRecord, new_files: &[String]) {
        let keep: HashSet<&str> = new_files.iter().map(|s| s.as_str()).collect();
        for rel in &previous.files {
            if keep.contains(rel.as_str()) {
                continue;
            }
            let path = self.install_root.join(rel);
            if let Err(e) = remove_entry(&path) {
                warn!(file = %path.display(), error = %e, "failed to prune stale file");
                continue;
            }
            remove_empty_parents(&self.install_root, Path::new(rel));
        }
    }
}

/// Unpack every archive entry into `staging`, recording each relative path.
/// Directory entries are created (and recorded) so empty directories the
/// package ships survive install and are swept at uninstall.
fn unpack_archive(archive: &Path, staging: &Path, entries: &mut Vec<String>) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let rel: PathBuf = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                return Err(Error::Extraction(format!(
                    "unsafe path in archive: {}",
                    entry.name()
                )))
            }
        };
        let dest = staging.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            entries.push(rel.to_string_lossy().into_owned());
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        entries.push(rel.to_string_lossy().into_owned());
    }
    Ok(())
}

/// Remove one owned entry: files are deleted, directories only when empty
/// (a shared directory still holding another package's files stays), and
/// an already-missing path is fine.
fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            let _ = fs::remove_dir(path);
            Ok(())
        }
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn report(progress: &Option<ProgressCallback>, message: &str, current: u64, total: u64) {
    if let Some(cb) = progress {
        let _ = catch_unwind(AssertUnwindSafe(|| cb(message, current, total)));
    }
}

/// Remove now-empty ancestors of `rel`, bottom-up, stopping at `root`.
/// `fs::remove_dir` refuses non-empty directories, so this never deletes
/// anything another package (or the user) still has files in.
fn remove_empty_parents(root: &Path, rel: &Path) {
    let mut dir = root.join(rel);
    while dir.pop() {
        if !dir.starts_with(root) || dir == *root {
            break;
        }
        if fs::remove_dir(&dir).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::thread;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Build an in-memory zip with the given (path, contents) entries.
    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        build_zip_with(entries, FileOptions::default())
    }

    fn build_zip_with(entries: &[(&str, &str)], options: FileOptions) -> Vec<u8> {
        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            for (path, contents) in entries {
                writer.start_file(*path, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    struct Fixture {
        server: mockito::ServerGuard,
        _cache_dir: TempDir,
        install_dir: TempDir,
        manager: LifecycleManager,
        store: Arc<ManifestStore>,
    }

    fn fixture() -> Fixture {
        let server = mockito::Server::new();
        let cache_dir = TempDir::new().unwrap();
        let install_dir = TempDir::new().unwrap();
        let cache = Arc::new(AssetCache::new(cache_dir.path()).unwrap());
        let store = Arc::new(ManifestStore::new(install_dir.path()));
        store.init().unwrap();
        let manager = LifecycleManager::new(Arc::clone(&store), cache);
        Fixture {
            server,
            _cache_dir: cache_dir,
            install_dir,
            manager,
            store,
        }
    }

    fn record(fx: &Fixture, name: &str, version: &str, zip_path: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: version.to_string(),
            title: name.to_string(),
            author: "someone".to_string(),
            category: "tool".to_string(),
            archive_url: format!("{}{}", fx.server.url(), zip_path),
            icon_url: format!("{}/packages/{}/icon.png", fx.server.url(), name),
            screenshot_url: format!("{}/packages/{}/screen.png", fx.server.url(), name),
            size: None,
        }
    }

    fn serve_zip(fx: &mut Fixture, path: &str, entries: &[(&str, &str)]) {
        let body = build_zip(entries);
        fx.server
            .mock("GET", path)
            .with_status(200)
            .with_body(body)
            .create();
    }

    // ============================================================================
    // Install tests
    // ============================================================================

    #[test]
    fn test_install_extracts_and_commits() {
        let mut fx = fixture();
        serve_zip(
            &mut fx,
            "/zips/appstore.zip",
            &[
                ("switch/appstore/appstore.nro", "NRO"),
                ("config/appstore.ini", "ini"),
            ],
        );
        let rec = record(&fx, "appstore", "2.0", "/zips/appstore.zip");

        let installed = fx.manager.install(&rec, None).unwrap();

        assert_eq!(installed.version, "2.0");
        assert_eq!(installed.files.len(), 2);
        assert!(fx
            .install_dir
            .path()
            .join("switch/appstore/appstore.nro")
            .exists());
        assert!(fx.install_dir.path().join("config/appstore.ini").exists());
        assert_eq!(fx.store.list_installed().unwrap(), vec!["appstore"]);
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A"), ("b.txt", "B")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        let first = fx.manager.install(&rec, None).unwrap();
        let second = fx.manager.install(&rec, None).unwrap();

        assert_eq!(first.version, second.version);
        assert_eq!(first.files, second.files);
        assert!(fx.install_dir.path().join("a.txt").exists());
        assert!(fx.install_dir.path().join("b.txt").exists());
        assert_eq!(fx.store.list_installed().unwrap(), vec!["appstore"]);
    }

    #[test]
    fn test_upgrade_prunes_stale_files() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/v1.zip", &[("a.txt", "A"), ("b.txt", "B")]);
        serve_zip(&mut fx, "/zips/v2.zip", &[("b.txt", "B2"), ("c.txt", "C")]);

        let v1 = record(&fx, "pkg", "1.0", "/zips/v1.zip");
        let v2 = record(&fx, "pkg", "2.0", "/zips/v2.zip");

        fx.manager.install(&v1, None).unwrap();
        let installed = fx.manager.install(&v2, None).unwrap();

        assert!(!fx.install_dir.path().join("a.txt").exists());
        assert!(fx.install_dir.path().join("b.txt").exists());
        assert!(fx.install_dir.path().join("c.txt").exists());
        let mut files = installed.files.clone();
        files.sort();
        assert_eq!(files, vec!["b.txt", "c.txt"]);
        assert_eq!(fx.store.get("pkg").unwrap().unwrap().files, installed.files);
    }

    #[test]
    fn test_install_corrupt_archive_rolls_back() {
        let mut fx = fixture();
        // Valid zip header prefix but truncated garbage
        fx.server
            .mock("GET", "/zips/bad.zip")
            .with_status(200)
            .with_body("PK\x03\x04 this is not a zip")
            .create();
        serve_zip(&mut fx, "/zips/good.zip", &[("keep.txt", "K")]);

        let good = record(&fx, "pkg", "1.0", "/zips/good.zip");
        let bad = record(&fx, "pkg", "2.0", "/zips/bad.zip");

        fx.manager.install(&good, None).unwrap();
        let result = fx.manager.install(&bad, None);

        assert!(matches!(result, Err(Error::Extraction(_))));
        // Prior install untouched, record still at 1.0
        assert!(fx.install_dir.path().join("keep.txt").exists());
        assert_eq!(fx.store.get("pkg").unwrap().unwrap().version, "1.0");
    }

    #[test]
    fn test_failed_upgrade_leaves_prior_files_intact() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/v1.zip", &[("a.txt", "A1"), ("b.txt", "B1")]);

        // v2 decompresses its first entry cleanly, then hits a payload whose
        // checksum no longer matches.
        let stored = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let payload = b"PAYLOADPAYLOAD";
        let mut body = build_zip_with(
            &[("b.txt", "fresh contents"), ("broken.txt", "PAYLOADPAYLOAD")],
            stored,
        );
        let pos = body
            .windows(payload.len())
            .position(|w| w == payload)
            .unwrap();
        body[pos] ^= 0xFF;
        fx.server
            .mock("GET", "/zips/v2.zip")
            .with_status(200)
            .with_body(body)
            .create();

        let v1 = record(&fx, "pkg", "1.0", "/zips/v1.zip");
        let v2 = record(&fx, "pkg", "2.0", "/zips/v2.zip");

        fx.manager.install(&v1, None).unwrap();
        let result = fx.manager.install(&v2, None);

        assert!(matches!(result, Err(Error::Extraction(_))));
        // Every v1 file still has its original contents, including the one
        // the bad archive would have replaced
        assert_eq!(
            fs::read_to_string(fx.install_dir.path().join("a.txt")).unwrap(),
            "A1"
        );
        assert_eq!(
            fs::read_to_string(fx.install_dir.path().join("b.txt")).unwrap(),
            "B1"
        );
        assert!(!fx.install_dir.path().join("broken.txt").exists());
        let kept = fx.store.get("pkg").unwrap().unwrap();
        assert_eq!(kept.version, "1.0");
        // No staging debris left behind
        assert!(!fx.install_dir.path().join(".get/stage/pkg").exists());
    }

    #[test]
    fn test_upgrade_fails_when_archive_unreachable() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/pkg.zip", &[("old.txt", "V1")]);
        let v1 = record(&fx, "pkg", "1.0", "/zips/pkg.zip");
        fx.manager.install(&v1, None).unwrap();

        fx.server.reset();
        fx.server
            .mock("GET", "/zips/pkg.zip")
            .with_status(500)
            .create();

        // The cached v1 archive must not stand in for the unreachable v2
        let v2 = record(&fx, "pkg", "2.0", "/zips/pkg.zip");
        let result = fx.manager.install(&v2, None);

        assert!(matches!(result, Err(Error::Download(_))));
        let kept = fx.store.get("pkg").unwrap().unwrap();
        assert_eq!(kept.version, "1.0");
        assert_eq!(
            fs::read_to_string(fx.install_dir.path().join("old.txt")).unwrap(),
            "V1"
        );
    }

    #[test]
    fn test_install_fails_cleanly_when_not_initialized() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        let uninit_dir = TempDir::new().unwrap();
        let store = Arc::new(ManifestStore::new(uninit_dir.path()));
        let cache_dir = TempDir::new().unwrap();
        let cache = Arc::new(AssetCache::new(cache_dir.path()).unwrap());
        let manager = LifecycleManager::new(store, cache);

        let result = manager.install(&rec, None);
        assert!(matches!(result, Err(Error::InvalidState(_))));
        // Nothing was extracted
        assert!(!uninit_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_install_progress_checkpoints() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        let messages = Arc::new(Mutex::new(Vec::new()));
        let messages_clone = Arc::clone(&messages);
        let progress: ProgressCallback = Arc::new(move |msg, _current, _total| {
            messages_clone.lock().unwrap().push(msg.to_string());
        });

        fx.manager.install(&rec, Some(progress)).unwrap();

        let messages = messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.starts_with("Fetching")));
        assert!(messages.iter().any(|m| m.starts_with("Fetched")));
        assert!(messages.iter().any(|m| m.starts_with("Extracted")));
    }

    #[test]
    fn test_install_survives_panicking_progress_callback() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        let progress: ProgressCallback = Arc::new(|_msg, _current, _total| {
            panic!("observer blew up");
        });

        let installed = fx.manager.install(&rec, Some(progress)).unwrap();
        assert_eq!(installed.version, "1.0");
        assert!(fx.install_dir.path().join("a.txt").exists());
    }

    // ============================================================================
    // Uninstall tests
    // ============================================================================

    #[test]
    fn test_uninstall_removes_files_and_empty_dirs() {
        let mut fx = fixture();
        serve_zip(
            &mut fx,
            "/zips/appstore.zip",
            &[("switch/appstore/appstore.nro", "NRO")],
        );
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        fx.manager.install(&rec, None).unwrap();
        fx.manager.uninstall("appstore").unwrap();

        assert!(!fx.install_dir.path().join("switch").exists());
        assert!(fx.store.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_uninstall_isolation_between_packages() {
        let mut fx = fixture();
        serve_zip(
            &mut fx,
            "/zips/p1.zip",
            &[("shared/a.txt", "A"), ("shared/b.txt", "B")],
        );
        serve_zip(&mut fx, "/zips/p2.zip", &[("shared/c.txt", "C")]);

        let p1 = record(&fx, "p1", "1.0", "/zips/p1.zip");
        let p2 = record(&fx, "p2", "1.0", "/zips/p2.zip");

        fx.manager.install(&p1, None).unwrap();
        fx.manager.install(&p2, None).unwrap();
        fx.manager.uninstall("p1").unwrap();

        assert!(!fx.install_dir.path().join("shared/a.txt").exists());
        assert!(!fx.install_dir.path().join("shared/b.txt").exists());
        // p2's file survives, and so does the shared directory holding it
        assert!(fx.install_dir.path().join("shared/c.txt").exists());
        assert_eq!(fx.store.list_installed().unwrap(), vec!["p2"]);
    }

    #[test]
    fn test_uninstall_removes_recorded_empty_directory() {
        let mut fx = fixture();
        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            writer
                .add_directory("plugins/", FileOptions::default())
                .unwrap();
            writer.start_file("app.nro", FileOptions::default()).unwrap();
            writer.write_all(b"NRO").unwrap();
            writer.finish().unwrap();
        }
        fx.server
            .mock("GET", "/zips/app.zip")
            .with_status(200)
            .with_body(cursor.into_inner())
            .create();

        let rec = record(&fx, "app", "1.0", "/zips/app.zip");
        let installed = fx.manager.install(&rec, None).unwrap();

        // The empty directory the archive ships is created and owned
        assert!(fx.install_dir.path().join("plugins").is_dir());
        assert!(installed.files.iter().any(|f| f == "plugins"));

        fx.manager.uninstall("app").unwrap();
        assert!(!fx.install_dir.path().join("plugins").exists());
        assert!(!fx.install_dir.path().join("app.nro").exists());
        assert!(fx.store.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_uninstall_not_installed() {
        let fx = fixture();
        let result = fx.manager.uninstall("ghost");
        assert!(matches!(result, Err(Error::NotInstalled(_))));
    }

    #[test]
    fn test_uninstall_tolerates_already_missing_files() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A"), ("b.txt", "B")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        fx.manager.install(&rec, None).unwrap();
        fs::remove_file(fx.install_dir.path().join("a.txt")).unwrap();

        fx.manager.uninstall("appstore").unwrap();
        assert!(!fx.install_dir.path().join("b.txt").exists());
        assert!(fx.store.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_list_round_trip() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/appstore.zip", &[("a.txt", "A")]);
        let rec = record(&fx, "appstore", "1.0", "/zips/appstore.zip");

        assert!(fx.manager.list_installed().unwrap().is_empty());
        fx.manager.install(&rec, None).unwrap();
        assert_eq!(fx.manager.list_installed().unwrap(), vec!["appstore"]);
        fx.manager.uninstall("appstore").unwrap();
        assert!(fx.manager.list_installed().unwrap().is_empty());
    }

    // ============================================================================
    // Concurrency tests
    // ============================================================================

    #[test]
    fn test_same_name_installs_serialize() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/v1.zip", &[("a.txt", "A"), ("b.txt", "B")]);
        serve_zip(&mut fx, "/zips/v2.zip", &[("b.txt", "B2"), ("c.txt", "C")]);

        let v1 = record(&fx, "pkg", "1.0", "/zips/v1.zip");
        let v2 = record(&fx, "pkg", "2.0", "/zips/v2.zip");

        let manager = Arc::new(fx.manager);
        let m1 = Arc::clone(&manager);
        let m2 = Arc::clone(&manager);
        let t1 = thread::spawn(move || m1.install(&v1, None).unwrap());
        let t2 = thread::spawn(move || m2.install(&v2, None).unwrap());
        t1.join().unwrap();
        t2.join().unwrap();

        // Exactly one record, and its file set is wholly one attempt's
        let record = fx.store.get("pkg").unwrap().unwrap();
        let mut files = record.files.clone();
        files.sort();
        match record.version.as_str() {
            "1.0" => assert_eq!(files, vec!["a.txt", "b.txt"]),
            "2.0" => assert_eq!(files, vec!["b.txt", "c.txt"]),
            other => panic!("unexpected version {}", other),
        }
        assert_eq!(fx.store.list_installed().unwrap(), vec!["pkg"]);
    }

    #[test]
    fn test_distinct_names_install_in_parallel() {
        let mut fx = fixture();
        serve_zip(&mut fx, "/zips/p1.zip", &[("one/a.txt", "A")]);
        serve_zip(&mut fx, "/zips/p2.zip", &[("two/b.txt", "B")]);

        let p1 = record(&fx, "p1", "1.0", "/zips/p1.zip");
        let p2 = record(&fx, "p2", "1.0", "/zips/p2.zip");

        let manager = Arc::new(fx.manager);
        let m1 = Arc::clone(&manager);
        let m2 = Arc::clone(&manager);
        let t1 = thread::spawn(move || m1.install(&p1, None).unwrap());
        let t2 = thread::spawn(move || m2.install(&p2, None).unwrap());
        t1.join().unwrap();
        t2.join().unwrap();

        let mut installed = fx.store.list_installed().unwrap();
        installed.sort();
        assert_eq!(installed, vec!["p1", "p2"]);
    }

    // ============================================================================
    // Helper tests
    // ============================================================================

    #[test]
    fn test_remove_empty_parents_stops_at_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();

        remove_empty_parents(root, Path::new("a/b/c/file.txt"));

        assert!(!root.join("a").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_remove_empty_parents_keeps_non_empty() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/keep.txt"), "k").unwrap();

        remove_empty_parents(root, Path::new("a/b/file.txt"));

        assert!(!root.join("a/b").exists());
        assert!(root.join("a/keep.txt").exists());
    }
}
