//! Repository configuration management
//!
//! Stores the repository list in `~/.config/appletpak/repositories.yaml`:
//!
//! ```yaml
//! cache: file://~/.appletpak/cache
//! repositories:
//!   - path: file://~/.appletpak/cache
//!   - path: https://packages.appletpak.dev/
//!     settings:
//!       proxy: http://proxy.internal:3128
//!       usernameEnv: APPLETPAK_USER
//!       passwordEnv: APPLETPAK_PASSWORD
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Location of the local package cache
pub const LOCAL_CACHE_URL: &str = "file://~/.appletpak/cache";

/// Public package server added to new configurations
pub const DEFAULT_SERVER_URL: &str = "https://packages.appletpak.dev/";

/// Repository configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Location of the local cache repository
    #[serde(default = "default_cache")]
    pub cache: String,

    /// Configured repositories, in lookup order
    #[serde(default)]
    pub repositories: Vec<RepositoryDescriptor>,
}

fn default_cache() -> String {
    LOCAL_CACHE_URL.to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache: default_cache(),
            repositories: vec![
                RepositoryDescriptor::new(LOCAL_CACHE_URL),
                RepositoryDescriptor::new(DEFAULT_SERVER_URL),
            ],
        }
    }
}

impl RepositoryConfig {
    /// Configuration with only the given cache and repositories
    pub fn new(cache: impl Into<String>, repositories: Vec<RepositoryDescriptor>) -> Self {
        let mut config = Self {
            cache: cache.into(),
            repositories,
        };
        config.ensure_cache();
        config
    }

    /// Load the configuration from the default location, writing the
    /// default configuration there on first use
    pub fn load_or_init() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_or_init_at(&path)
    }

    /// Load the configuration at `path`, creating it when missing
    pub fn load_or_init_at(path: &Path) -> Result<Self> {
        if path.exists() {
            let mut config = Self::load_from(path)?;
            if config.ensure_cache() {
                config.save_to(path)?;
            }
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "created repository configuration");
            Ok(config)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("appletpak").join("repositories.yaml"))
    }

    /// Insert the cache entry at the front if it is missing
    ///
    /// Returns whether the configuration changed.
    pub fn ensure_cache(&mut self) -> bool {
        if self.cache_index().is_some() {
            return false;
        }
        self.repositories
            .insert(0, RepositoryDescriptor::new(self.cache.clone()));
        true
    }

    /// Position of the cache entry in the repository list
    pub fn cache_index(&self) -> Option<usize> {
        self.repositories
            .iter()
            .position(|r| same_location(&r.path, &self.cache))
    }

    /// Find the repository configured at `location`
    pub fn find(&self, location: &str) -> Option<&RepositoryDescriptor> {
        self.repositories
            .iter()
            .find(|r| same_location(&r.path, location))
    }
}

/// Compare repository locations ignoring a trailing slash
pub fn same_location(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// One configured repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Repository URL (`file://` or `http(s)://`)
    pub path: String,

    /// Backend specific settings
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl RepositoryDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// URL scheme of the repository location
    ///
    /// Bare absolute paths and `~` paths are treated as `file`.
    pub fn scheme(&self) -> Result<String> {
        scheme_of(&self.path)
    }
}

/// URL scheme of a repository location
pub fn scheme_of(location: &str) -> Result<String> {
    if location.starts_with('/') || location.starts_with('~') {
        return Ok("file".to_string());
    }
    match location.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_ascii_lowercase()),
        _ => Err(RepoError::InvalidRepositoryUrl {
            url: location.to_string(),
            reason: "URL must start with file://, http://, https:// or /".to_string(),
        }),
    }
}

/// Typed view of the settings of an HTTP repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpSettings {
    pub proxy: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Environment variable holding the user name
    pub username_env: Option<String>,
    /// Environment variable holding the password
    pub password_env: Option<String>,
}

impl HttpSettings {
    /// Read the known keys, rejecting unknown ones
    pub fn from_settings(settings: &BTreeMap<String, String>) -> Result<Self> {
        let mut typed = Self::default();
        for (key, value) in settings {
            let slot = match key.as_str() {
                "proxy" => &mut typed.proxy,
                "username" => &mut typed.username,
                "password" => &mut typed.password,
                "usernameEnv" => &mut typed.username_env,
                "passwordEnv" => &mut typed.password_env,
                other => {
                    return Err(RepoError::InvalidConfig {
                        message: format!("unknown HTTP repository setting '{}'", other),
                    });
                }
            };
            *slot = Some(value.clone());
        }
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scheme_detection() {
        assert_eq!(scheme_of("https://packages.example.test/").unwrap(), "https");
        assert_eq!(scheme_of("file:///srv/packages").unwrap(), "file");
        assert_eq!(scheme_of("/srv/packages").unwrap(), "file");
        assert_eq!(scheme_of(LOCAL_CACHE_URL).unwrap(), "file");
        assert!(scheme_of("packages").is_err());
    }

    #[test]
    fn test_default_config_has_cache_and_server() {
        let config = RepositoryConfig::default();
        assert_eq!(config.cache_index(), Some(0));
        assert!(config.find(DEFAULT_SERVER_URL).is_some());
        assert!(config.find("https://packages.appletpak.dev").is_some());
    }

    #[test]
    fn test_load_or_init_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("appletpak/repositories.yaml");

        let created = RepositoryConfig::load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, RepositoryConfig::default());

        let loaded = RepositoryConfig::load_or_init_at(&path).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn test_missing_cache_is_restored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        std::fs::write(
            &path,
            "cache: file:///var/cache/appletpak\nrepositories:\n  - path: https://mirror.example.test/\n",
        )
        .unwrap();

        let config = RepositoryConfig::load_or_init_at(&path).unwrap();
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].path, "file:///var/cache/appletpak");

        let saved = RepositoryConfig::load_from(&path).unwrap();
        assert_eq!(saved, config);
    }

    #[test]
    fn test_http_settings() {
        let descriptor = RepositoryDescriptor::new("https://mirror.example.test/")
            .with_setting("proxy", "http://proxy:3128")
            .with_setting("usernameEnv", "USER_VAR");
        let settings = HttpSettings::from_settings(&descriptor.settings).unwrap();
        assert_eq!(settings.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(settings.username_env.as_deref(), Some("USER_VAR"));
        assert_eq!(settings.username, None);

        let bad = RepositoryDescriptor::new("https://x.test/").with_setting("timeout", "5");
        assert!(HttpSettings::from_settings(&bad.settings).is_err());
    }
}
