//! Manifest compiler
//!
//! Turns a source tree into an unsigned [`Package`]: the manifest is loaded
//! from `manifest.xml`, every other file under the manifest's directory is
//! packed into an asset and the result is sealed.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{CoreError, Result};
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::package::Package;
use crate::packer::PackerRegistry;
use crate::version::{AppletVersion, apply_version, translate_path};

/// Compiles source trees into packages
#[derive(Debug, Clone, Copy)]
pub struct ManifestCompiler<'a> {
    registry: &'a PackerRegistry,
    optimize: bool,
    version: Option<&'a str>,
}

impl Default for ManifestCompiler<'static> {
    fn default() -> Self {
        Self::new(PackerRegistry::shared())
    }
}

impl<'a> ManifestCompiler<'a> {
    pub fn new(registry: &'a PackerRegistry) -> Self {
        Self {
            registry,
            optimize: true,
            version: None,
        }
    }

    /// Enable or disable minification in the packers
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Use `version` instead of the version declared in the manifest
    pub fn version(mut self, version: Option<&'a str>) -> Self {
        self.version = version;
        self
    }

    /// Compile the tree rooted at `source` into a sealed, unsigned package
    ///
    /// `source` is either a directory containing `manifest.xml` or the
    /// manifest file itself.
    pub fn compile(&self, source: &Path) -> Result<Package> {
        let manifest = self.compile_manifest(source)?;
        Package::seal(&manifest)
    }

    /// Compile the tree into a manifest without sealing it
    pub fn compile_manifest(&self, source: &Path) -> Result<Manifest> {
        let manifest_path = locate_manifest(source)?;
        let base = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut manifest = Manifest::load(&manifest_path)?;
        tracing::debug!(id = %manifest.id, base = %base.display(), "compiling manifest");

        for file in source_files(&base, &manifest_path)? {
            tracing::debug!(file = %file.display(), "packing");
            let mut asset = self.registry.process(&file, self.optimize)?;

            let relative = file.strip_prefix(&base).unwrap_or(&file);
            let name = translate_path(Some(&relative.to_string_lossy())).unwrap_or_default();
            asset.name = name.strip_prefix('/').unwrap_or(&name).to_string();
            manifest.assets.push(asset);
        }
        manifest.assets.sort_by(|a, b| a.name.cmp(&b.name));

        let declared = self.version.unwrap_or(manifest.version.as_str());
        let version = apply_version(declared);
        if AppletVersion::parse(&version).is_none() {
            return Err(CoreError::InvalidManifest {
                message: format!(
                    "version '{}' is not of the form major.minor.build[.revision]",
                    version
                ),
            });
        }
        manifest.version = version;

        tracing::debug!(
            id = %manifest.id,
            version = %manifest.version,
            assets = manifest.assets.len(),
            "compiled manifest"
        );
        Ok(manifest)
    }
}

/// Find the manifest file for a source path
fn locate_manifest(source: &Path) -> Result<PathBuf> {
    let source = std::path::absolute(source)?;
    let manifest = if source.is_dir() {
        source.join(MANIFEST_FILE)
    } else {
        source
    };

    if !manifest.is_file() {
        return Err(CoreError::ManifestNotFound { path: manifest });
    }
    Ok(manifest)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Every file below `base` except hidden ones and the manifest, sorted by path
fn source_files(base: &Path, manifest: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && entry.path() != manifest {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
