//! Asset packers
//!
//! A packer turns one source file into an [`Asset`]. Packers are selected by
//! file extension through a [`PackerRegistry`]; files whose extension no
//! packer claims fall through to the catch-all binary packer.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::asset::Asset;
use crate::error::Result;

mod binary;
mod css;
mod html;
mod javascript;
mod xml;

pub use binary::BinaryPacker;
pub use css::{CssPacker, minify_css};
pub use html::{APPLET_NS, HtmlPacker};
pub use javascript::JavascriptPacker;
pub use xml::XmlPacker;

/// Extension claimed by the fallback packer
pub const CATCH_ALL: &str = "*";

/// Converts a source file into a packaged asset
pub trait FilePacker: Send + Sync {
    /// Extensions handled, each with its leading dot (e.g. `.css`)
    fn extensions(&self) -> &'static [&'static str];

    /// Process a file into an asset
    ///
    /// The returned asset is named after the file; the compiler replaces the
    /// name with the file's logical path.
    fn process(&self, file: &Path, optimize: bool) -> Result<Asset>;
}

/// Every packer known at compile time
fn builtin_packers() -> Vec<Arc<dyn FilePacker>> {
    vec![
        Arc::new(BinaryPacker),
        Arc::new(CssPacker),
        Arc::new(XmlPacker),
        Arc::new(HtmlPacker),
        Arc::new(JavascriptPacker),
    ]
}

static SHARED: Lazy<PackerRegistry> = Lazy::new(PackerRegistry::builtin);

/// Extension to packer table
#[derive(Clone)]
pub struct PackerRegistry {
    by_extension: HashMap<&'static str, Arc<dyn FilePacker>>,
}

impl std::fmt::Debug for PackerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<_> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("PackerRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl PackerRegistry {
    /// Build a registry over the given packers
    ///
    /// Later packers win when two claim the same extension.
    pub fn new(packers: Vec<Arc<dyn FilePacker>>) -> Self {
        let mut by_extension = HashMap::new();
        for packer in packers {
            for ext in packer.extensions() {
                by_extension.insert(*ext, Arc::clone(&packer));
            }
        }
        Self { by_extension }
    }

    /// Registry over the builtin packers
    pub fn builtin() -> Self {
        Self::new(builtin_packers())
    }

    /// Process-wide builtin registry, built on first use
    pub fn shared() -> &'static PackerRegistry {
        &SHARED
    }

    /// Select the packer for a file
    ///
    /// The match is case-sensitive on the extension including its dot.
    pub fn packer_for(&self, file: &Path) -> Option<&Arc<dyn FilePacker>> {
        file.extension()
            .and_then(|ext| {
                let key = format!(".{}", ext.to_string_lossy());
                self.by_extension.get(key.as_str())
            })
            .or_else(|| self.by_extension.get(CATCH_ALL))
    }

    /// Pack a file with the packer selected for it
    ///
    /// Failures are tagged with the file path.
    pub fn process(&self, file: &Path, optimize: bool) -> Result<Asset> {
        let packer = self.packer_for(file).ok_or_else(|| crate::error::CoreError::Processing {
            file: file.to_path_buf(),
            message: "no packer registered for this file type".to_string(),
        })?;
        packer.process(file, optimize).map_err(|e| e.in_file(file))
    }
}

/// File name used as the provisional asset name
pub(crate) fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed(registry: &PackerRegistry, name: &str) -> &'static [&'static str] {
        registry.packer_for(Path::new(name)).unwrap().extensions()
    }

    #[test]
    fn test_dispatch_by_extension() {
        let registry = PackerRegistry::builtin();
        assert!(claimed(&registry, "a/style.css").contains(&".css"));
        assert!(claimed(&registry, "a/style.min.css").contains(&".css"));
        assert!(claimed(&registry, "data.xml").contains(&".xml"));
        assert!(claimed(&registry, "index.html").contains(&".html"));
        assert!(claimed(&registry, "app.js").contains(&".js"));
        assert_eq!(claimed(&registry, "logo.png"), &[CATCH_ALL]);
        assert_eq!(claimed(&registry, "README"), &[CATCH_ALL]);
    }

    #[test]
    fn test_dispatch_is_case_sensitive() {
        let registry = PackerRegistry::builtin();
        assert_eq!(claimed(&registry, "STYLE.CSS"), &[CATCH_ALL]);
    }

    #[test]
    fn test_shared_registry_is_reused() {
        assert!(std::ptr::eq(PackerRegistry::shared(), PackerRegistry::shared()));
    }
}
