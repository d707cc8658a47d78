//! hbget - a client for libget homebrew app repositories
//!
//! hbget talks to libget-style package repositories (the format behind
//! homebrew app stores such as switchbru): it fetches the repository's JSON
//! catalog, caches icons, screenshots, and archives with conditional HTTP
//! caching, and installs packages as zip archives extracted into an install
//! root (typically an SD card), tracking exactly which files each package
//! owns so uninstall removes those files and nothing else.
//!
//! # Examples
//!
//! ```no_run
//! use hbget::{LoadMode, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::new(
//!     "Switch",
//!     "https://switchbru.com/appstore/",
//!     LoadMode::Deferred,
//!     "/tmp/hbget-cache",
//! )?;
//! repo.set_install_path("/media/sdcard")?;
//! repo.init_get()?;
//!
//! repo.install("appstore", None)?;
//! println!("installed: {:?}", repo.list_installed()?);
//! repo.uninstall("appstore")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Catalog document parsing and package lookup
//! - [`cache`] - ETag-validated asset cache
//! - [`transport`] - Conditional HTTP fetches
//! - [`store`] - Persisted installed-package index
//! - [`lifecycle`] - Install/uninstall state machine
//! - [`repository`] - Facade composing the above
//! - [`bundle`] - Bundle-file parsing
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod bundle;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod repository;
pub mod store;
pub mod transport;

pub use bundle::{parse_bundle, parse_bundle_str};
pub use cache::{AssetCache, ResourceKind};
pub use catalog::{Catalog, CatalogSnapshot, LoadMode, PackageRecord};
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{LifecycleManager, ProgressCallback};
pub use repository::Repository;
pub use store::{InstalledRecord, ManifestStore};
