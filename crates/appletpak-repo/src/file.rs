//! Filesystem repository
//!
//! Packages are stored as `{id}-{version}.pak` files below a root directory.
//! The directory is scanned once on initialization; afterwards the in-memory
//! index is the source of truth for lookups.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use walkdir::WalkDir;

use appletpak_core::{AppletInfo, PACKAGE_EXTENSION, Package};

use crate::backend::{RepositoryBackend, page, sort_entries};
use crate::error::{RepoError, Result};
use crate::query::AppletQuery;
use crate::resolve::resolve_version;

/// Repository backed by a local directory
#[derive(Debug, Default)]
pub struct FileRepository {
    location: Option<String>,
    root: Option<PathBuf>,
    /// Metadata of every package file, keyed by path
    index: Mutex<BTreeMap<PathBuf, AppletInfo>>,
}

impl FileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root directory, once initialized
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn require_root(&self) -> Result<&Path> {
        self.root.as_deref().ok_or(RepoError::NotInitialized)
    }

    fn index(&self) -> MutexGuard<'_, BTreeMap<PathBuf, AppletInfo>> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Index every readable package below `root`
    fn scan(root: &Path) -> BTreeMap<PathBuf, AppletInfo> {
        let mut index = BTreeMap::new();
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match Package::read_info(entry.path()) {
                Ok(info) => {
                    index.insert(entry.into_path(), info);
                }
                Err(e) => {
                    tracing::warn!(
                        file = %entry.path().display(),
                        error = %e,
                        "skipping unreadable package"
                    );
                }
            }
        }
        index
    }
}

/// Directory named by a `file://` location
///
/// A leading `~` stands for the user's home directory.
pub fn resolve_root(location: &str) -> Result<PathBuf> {
    let path = location.strip_prefix("file://").unwrap_or(location);

    if let Some(rest) = path.strip_prefix('~') {
        let home = dirs::home_dir().ok_or_else(|| RepoError::InvalidRepositoryUrl {
            url: location.to_string(),
            reason: "Could not determine home directory".to_string(),
        })?;
        return Ok(home.join(rest.trim_start_matches(['/', '\\'])));
    }

    if path.is_empty() {
        return Err(RepoError::InvalidRepositoryUrl {
            url: location.to_string(),
            reason: "empty path".to_string(),
        });
    }
    Ok(PathBuf::from(path))
}

#[async_trait]
impl RepositoryBackend for FileRepository {
    fn schemes(&self) -> &'static [&'static str] {
        &["file"]
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    async fn initialize(&mut self, location: &str, _settings: &BTreeMap<String, String>) -> Result<()> {
        if self.root.is_some() {
            return Err(RepoError::AlreadyInitialized {
                location: location.to_string(),
            });
        }

        let root = resolve_root(location)?;
        std::fs::create_dir_all(&root).map_err(|e| RepoError::storage(root.display(), e))?;

        let index = Self::scan(&root);
        tracing::debug!(root = %root.display(), packages = index.len(), "indexed file repository");

        *self.index() = index;
        self.root = Some(root);
        self.location = Some(location.to_string());
        Ok(())
    }

    async fn get(&self, id: &str, version: Option<&str>, exact: bool) -> Result<Option<Package>> {
        self.require_root()?;

        let candidates: Vec<(PathBuf, AppletInfo)> = self
            .index()
            .iter()
            .filter(|(_, info)| info.id == id)
            .map(|(path, info)| (path.clone(), info.clone()))
            .collect();

        let Some(chosen) = resolve_version(candidates.iter().map(|(_, info)| info), id, version, exact)
        else {
            return Ok(None);
        };
        let Some((path, _)) = candidates.iter().find(|(_, info)| info == chosen) else {
            return Ok(None);
        };

        let package = Package::load(path).map_err(|e| RepoError::storage(path.display(), e))?;
        Ok(Some(package))
    }

    async fn find(&self, query: &AppletQuery, offset: usize, count: usize) -> Result<(Vec<AppletInfo>, usize)> {
        self.require_root()?;

        let mut matches: Vec<AppletInfo> = self
            .index()
            .values()
            .filter(|info| query.matches(info))
            .cloned()
            .collect();
        sort_entries(&mut matches);
        Ok(page(matches, offset, count))
    }

    async fn put(&self, package: &Package) -> Result<AppletInfo> {
        let root = self.require_root()?;

        let meta = &package.meta;
        let path = root.join(package_file_name(&meta.id, &meta.version)?);
        package
            .save(&path)
            .map_err(|e| RepoError::storage(path.display(), e))?;

        let info = package.info();
        self.index().insert(path, info.clone());
        tracing::info!(id = %info.id, version = %info.version, root = %root.display(), "stored package");
        Ok(info)
    }
}

/// `{id}-{version}.pak`
///
/// Id and version must each be a single plain path component so the file
/// stays inside the repository root.
fn package_file_name(id: &str, version: &str) -> Result<String> {
    if id.trim().is_empty() || version.trim().is_empty() {
        return Err(RepoError::InvalidPackage {
            message: "package id and version are required".to_string(),
        });
    }
    for (field, value) in [("id", id), ("version", version)] {
        let mut components = Path::new(value).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || value.contains(['/', '\\']) || value.contains("..") {
            return Err(RepoError::InvalidPackage {
                message: format!("package {} '{}' is not a valid file name", field, value),
            });
        }
    }
    Ok(format!("{}-{}.{}", id, version, PACKAGE_EXTENSION))
}
