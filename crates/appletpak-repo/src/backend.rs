//! Unified repository backend trait
//!
//! Provides a single interface for all repository types (file, HTTP)

use async_trait::async_trait;
use std::collections::BTreeMap;

use appletpak_core::{AppletInfo, Package};

use crate::config::{RepositoryDescriptor, scheme_of};
use crate::error::{RepoError, Result};
use crate::file::FileRepository;
use crate::http::HttpRepository;
use crate::query::AppletQuery;

/// Unified repository backend trait
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// URL schemes this backend serves
    fn schemes(&self) -> &'static [&'static str];

    /// Location the backend was initialized with
    fn location(&self) -> Option<&str>;

    /// One-time setup; fails with `AlreadyInitialized` when repeated
    async fn initialize(&mut self, location: &str, settings: &BTreeMap<String, String>) -> Result<()>;

    /// Fetch a package
    ///
    /// Without `exact`, a missing version falls back to the closest newer
    /// version of the same major. `Ok(None)` means nothing qualified.
    async fn get(&self, id: &str, version: Option<&str>, exact: bool) -> Result<Option<Package>>;

    /// A page of matching entries and the total number of matches
    async fn find(&self, query: &AppletQuery, offset: usize, count: usize) -> Result<(Vec<AppletInfo>, usize)>;

    /// Store a package
    async fn put(&self, package: &Package) -> Result<AppletInfo>;

    /// Like [`get`](Self::get), failing with `PackageNotFound` on a miss
    async fn get_required(&self, id: &str, version: Option<&str>, exact: bool) -> Result<Package> {
        self.get(id, version, exact)
            .await?
            .ok_or_else(|| RepoError::PackageNotFound {
                id: id.to_string(),
                version: version.map(str::to_string),
            })
    }
}

/// A fresh, uninitialized instance of every backend implementation
fn backend_implementations() -> Vec<Box<dyn RepositoryBackend>> {
    vec![
        Box::new(FileRepository::new()),
        Box::new(HttpRepository::new()),
    ]
}

/// Create and initialize the backend serving a configured repository
pub async fn create_backend(descriptor: &RepositoryDescriptor) -> Result<Box<dyn RepositoryBackend>> {
    let scheme = scheme_of(&descriptor.path)?;
    let mut backend = backend_implementations()
        .into_iter()
        .find(|b| b.schemes().contains(&scheme.as_str()))
        .ok_or(RepoError::UnsupportedScheme { scheme })?;

    backend.initialize(&descriptor.path, &descriptor.settings).await?;
    Ok(backend)
}

/// Sort entries by id then version, as returned by `find`
pub(crate) fn sort_entries(entries: &mut [AppletInfo]) {
    entries.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| {
                appletpak_core::AppletVersion::parse(&a.version)
                    .cmp(&appletpak_core::AppletVersion::parse(&b.version))
            })
            .then_with(|| a.version.cmp(&b.version))
    });
}

/// Slice one page out of a full result list
pub(crate) fn page(entries: Vec<AppletInfo>, offset: usize, count: usize) -> (Vec<AppletInfo>, usize) {
    let total = entries.len();
    let page = entries.into_iter().skip(offset).take(count).collect();
    (page, total)
}
