//! Remote catalog loading and lookup.
//!
//! A libget repository serves a JSON document listing its packages. The
//! catalog fetches that document through the [`AssetCache`] (so it gets the
//! same conditional-GET treatment as any other asset) and parses it into an
//! immutable [`CatalogSnapshot`]. Parsing is defensive: a malformed entry is
//! skipped with a warning, an entirely unparsable document fails the load.

use crate::cache::{AssetCache, ResourceKind};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// One package as described by the catalog document. Immutable per load.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub archive_url: String,
    pub icon_url: String,
    pub screenshot_url: String,
    pub size: Option<u64>,
}

/// An immutable view of one repository catalog load.
///
/// `reload` produces a fresh snapshot; readers holding an `Arc` to the old
/// one keep a consistent view and are never exposed to a torn mix of old and
/// new records.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub repository_name: String,
    pub source_url: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    packages: Vec<PackageRecord>,
    by_name: HashMap<String, usize>,
    warnings: Vec<String>,
}

impl CatalogSnapshot {
    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    pub fn lookup(&self, name: &str) -> Option<&PackageRecord> {
        self.by_name.get(name).map(|&i| &self.packages[i])
    }

    /// Non-fatal problems encountered while parsing, one message per
    /// skipped entry.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Whether the catalog document is fetched at construction or lazily on
/// first access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Eager,
    Deferred,
}

pub struct Catalog {
    repository_name: String,
    source_url: String,
    cache: Arc<AssetCache>,
    snapshot: Mutex<Option<Arc<CatalogSnapshot>>>,
}

impl Catalog {
    pub fn new(
        repository_name: &str,
        source_url: &str,
        mode: LoadMode,
        cache: Arc<AssetCache>,
    ) -> Result<Self> {
        let catalog = Self {
            repository_name: repository_name.to_string(),
            source_url: source_url.to_string(),
            cache,
            snapshot: Mutex::new(None),
        };
        if mode == LoadMode::Eager {
            catalog.snapshot()?;
        }
        Ok(catalog)
    }

    /// Current snapshot, loading it first if the catalog was deferred.
    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>> {
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = guard.as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        let snapshot = Arc::new(self.load()?);
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Re-fetch the catalog document and atomically replace the snapshot.
    pub fn reload(&self) -> Result<Arc<CatalogSnapshot>> {
        let snapshot = Arc::new(self.load()?);
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn lookup(&self, name: &str) -> Result<PackageRecord> {
        let snapshot = self.snapshot()?;
        snapshot
            .lookup(name)
            .cloned()
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    fn load(&self) -> Result<CatalogSnapshot> {
        let path = self
            .cache
            .fetch(ResourceKind::Catalog, &self.repository_name, &self.source_url)?;
        let document = fs::read_to_string(path)?;
        parse_catalog(&self.repository_name, &self.source_url, &document)
    }
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<String>,
    title: Option<String>,
    author: Option<String>,
    category: Option<String>,
    archive_url: Option<String>,
    icon_url: Option<String>,
    screenshot_url: Option<String>,
    size: Option<u64>,
}

impl RawPackage {
    fn into_record(self) -> std::result::Result<PackageRecord, &'static str> {
        Ok(PackageRecord {
            name: self.name.ok_or("name")?,
            version: self.version.ok_or("version")?,
            title: self.title.ok_or("title")?,
            author: self.author.ok_or("author")?,
            category: self.category.ok_or("category")?,
            archive_url: self.archive_url.ok_or("archive_url")?,
            icon_url: self.icon_url.ok_or("icon_url")?,
            screenshot_url: self.screenshot_url.ok_or("screenshot_url")?,
            size: self.size,
        })
    }
}

/// Parse a catalog document into a snapshot.
///
/// The document is either `{"packages": [...]}` or a bare array. Entries
/// missing required fields (or of the wrong type) are skipped with a
/// warning; a document that is not JSON of either shape fails the load.
pub fn parse_catalog(
    repository_name: &str,
    source_url: &str,
    document: &str,
) -> Result<CatalogSnapshot> {
    let value: serde_json::Value = serde_json::from_str(document)
        .map_err(|e| Error::Parse(format!("catalog document is not valid JSON: {}", e)))?;

    let entries = match &value {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(map) => match map.get("packages") {
            Some(serde_json::Value::Array(items)) => items.as_slice(),
            _ => {
                return Err(Error::Parse(
                    "catalog document has no \"packages\" array".to_string(),
                ))
            }
        },
        _ => {
            return Err(Error::Parse(
                "catalog document is neither an array nor an object".to_string(),
            ))
        }
    };

    let mut packages: Vec<PackageRecord> = Vec::with_capacity(entries.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let raw: RawPackage = match serde_json::from_value(entry.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                let msg = format!("skipped catalog entry {}: {}", index, e);
                warn!(repository = repository_name, "{}", msg);
                warnings.push(msg);
                continue;
            }
        };
        let record = match raw.into_record() {
            Ok(record) => record,
            Err(field) => {
                let msg = format!("skipped catalog entry {}: missing field {}", index, field);
                warn!(repository = repository_name, "{}", msg);
                warnings.push(msg);
                continue;
            }
        };
        if by_name.contains_key(&record.name) {
            let msg = format!("skipped catalog entry {}: duplicate name {}", index, record.name);
            warn!(repository = repository_name, "{}", msg);
            warnings.push(msg);
            continue;
        }
        by_name.insert(record.name.clone(), packages.len());
        packages.push(record);
    }

    Ok(CatalogSnapshot {
        repository_name: repository_name.to_string(),
        source_url: source_url.to_string(),
        fetched_at: chrono::Utc::now(),
        packages,
        by_name,
        warnings,
    })
}
