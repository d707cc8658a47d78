//! ETag-validated asset cache.
//!
//! Fetched bytes (the catalog document, package icons, screenshots, and
//! package archives) are cached under per-kind subdirectories, each data file
//! paired with a `<file>.etag` sidecar holding the validator from the last
//! full response. A cached entry is revalidated with a conditional GET; a 304
//! reuses the file on disk with no body transfer.
//!
//! New content is streamed to a `<file>.part` sibling and renamed into place,
//! so no reader ever observes a partially written cache file. An aborted
//! fetch leaves at most a stray `.part` file behind, never a corrupt slot.

use crate::transport::{response_etag, FetchOutcome, Transport};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Logical kind of a cached resource; selects the subdirectory, the file
/// extension, and the staleness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Catalog,
    Icon,
    Screenshot,
    Archive,
}

impl ResourceKind {
    fn subdir(&self) -> &'static str {
        match self {
            ResourceKind::Catalog => "catalog",
            ResourceKind::Icon => "icons",
            ResourceKind::Screenshot => "screens",
            ResourceKind::Archive => "zips",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ResourceKind::Catalog => "json",
            ResourceKind::Icon => "png",
            ResourceKind::Screenshot => "png",
            ResourceKind::Archive => "zip",
        }
    }

    /// Whether a transport failure may fall back to a stale cached copy.
    /// Only best-effort assets degrade. A stale catalog would hide upstream
    /// changes; a stale archive would install old bytes under a new
    /// record's version.
    fn stale_ok(&self) -> bool {
        matches!(self, ResourceKind::Icon | ResourceKind::Screenshot)
    }
}

pub struct AssetCache {
    root: PathBuf,
    transport: Transport,
    // One lock per (kind, id) slot; distinct slots proceed in parallel.
    slot_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssetCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("catalog"))?;
        fs::create_dir_all(root.join("icons"))?;
        fs::create_dir_all(root.join("screens"))?;
        fs::create_dir_all(root.join("zips"))?;

        Ok(Self {
            root,
            transport: Transport::new(),
            slot_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk path of a cache slot. The file may not exist yet.
    pub fn slot_path(&self, kind: ResourceKind, id: &str) -> PathBuf {
        self.root
            .join(kind.subdir())
            .join(format!("{}.{}", id, kind.extension()))
    }

    fn etag_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".etag");
        path.with_file_name(name)
    }

    fn part_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        path.with_file_name(name)
    }

    fn slot_lock(&self, kind: ResourceKind, id: &str) -> Arc<Mutex<()>> {
        let key = format!("{}/{}", kind.subdir(), id);
        let mut locks = self
            .slot_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fetch `url` into the cache slot for `(kind, id)` and return the local
    /// path of the cached file.
    ///
    /// An existing entry is revalidated with its stored ETag; "not modified"
    /// returns the existing path with no body transfer. A transport failure
    /// with an existing entry degrades to the stale copy for best-effort
    /// assets (never the catalog or an archive); with no entry it propagates.
    pub fn fetch(&self, kind: ResourceKind, id: &str, url: &str) -> Result<PathBuf> {
        let lock = self.slot_lock(kind, id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.slot_path(kind, id);
        let etag_path = Self::etag_path(&path);
        let stored_etag = if path.exists() {
            fs::read_to_string(&etag_path).ok()
        } else {
            None
        };

        let result = match self.transport.conditional_get(url, stored_etag.as_deref()) {
            Ok(FetchOutcome::NotModified) => {
                debug!(url, path = %path.display(), "cache revalidated, reusing");
                return Ok(path);
            }
            Ok(FetchOutcome::New(response)) => self.write_slot(&path, &etag_path, response),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(path),
            // A truncated body is never papered over with a stale copy.
            Err(Error::Integrity(msg)) => Err(Error::Integrity(msg)),
            Err(e) if path.exists() && kind.stale_ok() => {
                warn!(url, error = %e, "fetch failed, serving stale cached copy");
                Ok(path)
            }
            Err(e) => Err(e),
        }
    }

    /// Stream a full response into the slot: write to `<file>.part`, verify
    /// the declared content length, rename into place, update the validator.
    fn write_slot(
        &self,
        path: &Path,
        etag_path: &Path,
        mut response: reqwest::blocking::Response,
    ) -> Result<()> {
        let etag = response_etag(&response);
        let declared = response.content_length();
        let part = Self::part_path(path);

        let result = (|| -> Result<()> {
            let mut file = File::create(&part)?;
            copy_checked(&mut response, &mut file, declared)?;
            file.flush()?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&part);
            return Err(e);
        }

        fs::rename(&part, path)?;
        match etag {
            Some(tag) => fs::write(etag_path, tag)?,
            // No validator on a 200 means the slot is refetched next time.
            None => {
                let _ = fs::remove_file(etag_path);
            }
        }
        Ok(())
    }
}

/// Copy `reader` to `writer`, failing with [`Error::Integrity`] when the body
/// falls short of the declared content length.
fn copy_checked<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    declared: Option<u64>,
) -> Result<u64> {
    let written = std::io::copy(reader, writer)?;
    if let Some(expected) = declared {
        if written < expected {
            return Err(Error::Integrity(format!(
                "body ended after {} of {} declared bytes",
                written, expected
            )));
        }
    }
    Ok(written)
}
