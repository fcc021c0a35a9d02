//! Multi-repository orchestration
//!
//! The manager owns the configured repository list. The local cache is
//! consulted first on lookups and receives a copy of every package fetched
//! from elsewhere.

use tokio::sync::OnceCell;

use appletpak_core::{AppletInfo, Package};

use crate::backend::{RepositoryBackend, create_backend};
use crate::config::{RepositoryConfig, RepositoryDescriptor, same_location};
use crate::error::{RepoError, Result};
use crate::query::AppletQuery;

/// A configured repository and its lazily created backend
struct Slot {
    descriptor: RepositoryDescriptor,
    backend: OnceCell<Box<dyn RepositoryBackend>>,
}

impl Slot {
    fn new(descriptor: RepositoryDescriptor) -> Self {
        Self {
            descriptor,
            backend: OnceCell::new(),
        }
    }

    async fn backend(&self) -> Result<&dyn RepositoryBackend> {
        let backend = self
            .backend
            .get_or_try_init(|| create_backend(&self.descriptor))
            .await?;
        Ok(backend.as_ref())
    }

    fn location(&self) -> &str {
        &self.descriptor.path
    }
}

/// Resolves, searches and publishes packages across repositories
pub struct RepositoryManager {
    slots: Vec<Slot>,
    cache: usize,
}

impl std::fmt::Debug for RepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locations: Vec<_> = self.slots.iter().map(Slot::location).collect();
        f.debug_struct("RepositoryManager")
            .field("repositories", &locations)
            .field("cache", &self.slots[self.cache].location())
            .finish()
    }
}

impl RepositoryManager {
    /// Build a manager over a configuration
    ///
    /// The cache entry is added when the configuration lacks it.
    pub fn new(mut config: RepositoryConfig) -> Self {
        config.ensure_cache();
        let cache = config.cache_index().unwrap_or(0);
        Self {
            slots: config.repositories.into_iter().map(Slot::new).collect(),
            cache,
        }
    }

    /// Manager over the user's configuration file
    pub fn from_user_config() -> Result<Self> {
        Ok(Self::new(RepositoryConfig::load_or_init()?))
    }

    /// Configured repository locations, in lookup order
    pub fn locations(&self) -> Vec<&str> {
        self.slots.iter().map(Slot::location).collect()
    }

    fn cache_slot(&self) -> &Slot {
        &self.slots[self.cache]
    }

    /// Find a package in the cache or, failing that, in any repository
    ///
    /// The cache is tried for an exact match first, then every repository,
    /// the cache included, in configuration order with fuzzy matching. A
    /// package found elsewhere that satisfies the request is copied into the
    /// cache. Failing repositories are skipped.
    pub async fn get_from_any(&self, id: &str, version: Option<&str>) -> Option<Package> {
        match self.get_from(self.cache_slot(), id, version, true).await {
            Ok(Some(package)) => return Some(package),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(repository = self.cache_slot().location(), error = %e, "cache lookup failed");
            }
        }

        for (index, slot) in self.slots.iter().enumerate() {
            let package = match self.get_from(slot, id, version, false).await {
                Ok(Some(package)) => package,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(repository = slot.location(), error = %e, "lookup failed, trying next repository");
                    continue;
                }
            };

            let satisfies = version.is_none_or(|v| v == package.meta.version);
            if satisfies && index != self.cache {
                if let Err(e) = self.install_cache(&package).await {
                    tracing::warn!(id, error = %e, "could not copy package into the cache");
                }
            }
            return Some(package);
        }

        None
    }

    async fn get_from(&self, slot: &Slot, id: &str, version: Option<&str>, exact: bool) -> Result<Option<Package>> {
        slot.backend().await?.get(id, version, exact).await
    }

    /// Search every repository and concatenate the results
    ///
    /// Duplicates are kept. Failing repositories contribute nothing.
    pub async fn find_from_any(&self, query: &AppletQuery, offset: usize, count: usize) -> Vec<AppletInfo> {
        let mut results = Vec::new();
        for slot in &self.slots {
            let found = match slot.backend().await {
                Ok(backend) => backend.find(query, offset, count).await,
                Err(e) => Err(e),
            };
            match found {
                Ok((entries, _)) => results.extend(entries),
                Err(e) => {
                    tracing::warn!(repository = slot.location(), error = %e, "search failed, skipping repository");
                }
            }
        }
        results
    }

    /// Publish a package
    ///
    /// Without a target the package goes to every configured repository in
    /// order and the first failure aborts the rest. With a target only the
    /// matching repository is used.
    pub async fn publish(&self, target: Option<&str>, package: &Package) -> Result<Vec<AppletInfo>> {
        let slots: Vec<&Slot> = match target {
            Some(target) => {
                let slot = self
                    .slots
                    .iter()
                    .find(|s| same_location(s.location(), target))
                    .ok_or_else(|| RepoError::ConfigNotFound {
                        target: target.to_string(),
                    })?;
                vec![slot]
            }
            None => self.slots.iter().collect(),
        };

        let mut published = Vec::with_capacity(slots.len());
        for slot in slots {
            let info = slot.backend().await?.put(package).await?;
            tracing::info!(repository = slot.location(), id = %info.id, version = %info.version, "published");
            published.push(info);
        }
        Ok(published)
    }

    /// Store a package in the local cache
    pub async fn install_cache(&self, package: &Package) -> Result<AppletInfo> {
        let slot = self.cache_slot();
        let info = slot.backend().await?.put(package).await?;
        tracing::info!(id = %info.id, version = %info.version, "installed into cache");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appletpak_core::Manifest;
    use tempfile::TempDir;

    fn location(dir: &TempDir) -> String {
        format!("file://{}", dir.path().display())
    }

    fn package(id: &str, version: &str) -> Package {
        Package::seal(&Manifest::new(id, id, version)).unwrap()
    }

    #[test]
    fn test_cache_is_always_configured() {
        let cache = TempDir::new().unwrap();
        let manager = RepositoryManager::new(RepositoryConfig {
            cache: location(&cache),
            repositories: vec![RepositoryDescriptor::new("https://mirror.example.test/")],
        });
        assert_eq!(manager.locations(), [location(&cache).as_str(), "https://mirror.example.test/"]);
    }

    #[tokio::test]
    async fn test_install_cache_then_get() {
        let cache = TempDir::new().unwrap();
        let manager = RepositoryManager::new(RepositoryConfig::new(location(&cache), vec![]));

        manager.install_cache(&package("app", "1.0.0")).await.unwrap();
        let found = manager.get_from_any("app", Some("1.0.0")).await.unwrap();
        assert_eq!(found.meta.version, "1.0.0");
        assert!(manager.get_from_any("missing", None).await.is_none());
    }

    #[tokio::test]
    async fn test_publish_to_unknown_target() {
        let cache = TempDir::new().unwrap();
        let manager = RepositoryManager::new(RepositoryConfig::new(location(&cache), vec![]));
        let err = manager
            .publish(Some("https://unknown.example.test/"), &package("app", "1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ConfigNotFound { .. }));
    }
}
