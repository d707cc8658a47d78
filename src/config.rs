//! User configuration.
//!
//! Stored in TOML format at `~/.hbget/config.toml`. Everything is optional;
//! a missing file behaves like an empty one.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Override for the asset cache directory. Defaults to the platform
    /// cache dir (e.g. `~/.cache/hbget`).
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository URL used when none is given on the command line.
    pub default_url: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not determine home directory".to_string()))?;
        Ok(home.join(".hbget").join("config.toml"))
    }

    /// Load the user config, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Effective cache directory: the configured override, or the platform
    /// cache dir under an `hbget` subdirectory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache.dir {
            return Ok(dir.clone());
        }
        let base = dirs::cache_dir()
            .ok_or_else(|| Error::Other("Could not determine cache directory".to_string()))?;
        Ok(base.join("hbget"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path().join("config.toml")).unwrap();
        assert!(config.cache.dir.is_none());
        assert!(config.repository.default_url.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/tmp/hbget-cache"));
        config.repository.default_url = Some("https://switchbru.com/appstore/".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.cache.dir, Some(PathBuf::from("/tmp/hbget-cache")));
        assert_eq!(
            loaded.repository.default_url.as_deref(),
            Some("https://switchbru.com/appstore/")
        );
    }

    #[test]
    fn test_load_partial_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[repository]\ndefault_url = \"https://example.com/repo\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.cache.dir.is_none());
        assert_eq!(
            config.repository.default_url.as_deref(),
            Some("https://example.com/repo")
        );
    }

    #[test]
    fn test_cache_dir_override() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/custom/cache"));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/custom/cache"));
    }
}
