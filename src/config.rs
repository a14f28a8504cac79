//! Storage configuration
//!
//! Loaded from a JSON file (every key optional) or built with `Default`.
//! The default storage folder lives in the user's data directory:
//! - Linux: ~/.local/share/admin-storage/storage
//! - macOS: ~/Library/Application Support/admin-storage/storage
//! - Windows: %APPDATA%\admin-storage\storage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Deployment environment. Anything but production forces filters to be
/// re-applied even when a derived image already exists.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Dev,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Folder holding uploaded originals and derived images
    pub base_path: PathBuf,
    /// Catalog database file; `{base_path}/catalog.db` when unset
    pub catalog_path: Option<PathBuf>,
    /// Web path prefix the storage folder is served under (e.g. "/storage")
    pub http_path: String,
    /// Same as `http_path` but including scheme and host
    pub absolute_http_path: String,
    /// Re-create derived images that went missing on disk when their
    /// source is requested
    pub auto_fix_missing_image_sources: bool,
    pub environment: Environment,
    /// Admin UI language used for guests and identities without a preference
    pub default_language: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            catalog_path: None,
            http_path: "/storage".to_string(),
            absolute_http_path: "http://localhost/storage".to_string(),
            auto_fix_missing_image_sources: true,
            environment: Environment::Prod,
            default_language: "en".to_string(),
        }
    }
}

impl StorageConfig {
    /// Read a config file. Missing keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: StorageConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config rooted at `base_path`, everything else default
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.base_path.join("catalog.db"))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Prod
    }

    fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(Error::Config("base_path must not be empty".to_string()));
        }
        if self.default_language.trim().is_empty() {
            return Err(Error::Config(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_path() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    path.push("admin-storage");
    path.push("storage");
    path
}
