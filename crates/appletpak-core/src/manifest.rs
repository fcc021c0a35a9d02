//! Applet manifest
//!
//! The manifest is the logical, unsealed description of a package: its
//! identity, version and the assets compiled from the source tree. It is read
//! from a `manifest.xml` file at the root of the source tree:
//!
//! ```xml
//! <manifest xmlns="urn:appletpak:manifest">
//!   <info id="org.example.patients" version="1.2.*">
//!     <name>Patients</name>
//!     <author>Example Org</author>
//!     <description>Patient registration screens</description>
//!   </info>
//!   <dependency id="org.example.core" version="1.0"/>
//! </manifest>
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::asset::Asset;
use crate::error::{CoreError, Result};
use crate::markup::{self, Element};

/// Default manifest file name inside a source directory
pub const MANIFEST_FILE: &str = "manifest.xml";

/// Logical description of a package prior to sealing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    /// Version string, possibly still carrying a `*` wildcard
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ManifestDependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Thumbprint of the signing certificate, `None` while unsigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_token: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Reference to another applet this one needs at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Manifest {
    /// Create an empty manifest
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            author: None,
            description: None,
            dependencies: Vec::new(),
            timestamp: None,
            public_key_token: None,
            assets: Vec::new(),
        }
    }

    /// Load a manifest from a `manifest.xml` file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CoreError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let root = markup::parse_document(&text, path)?;
        Self::from_element(&root)
    }

    /// Parse manifest XML text
    pub fn parse(text: &str) -> Result<Self> {
        let root = markup::parse_document(text, Path::new(MANIFEST_FILE))?;
        Self::from_element(&root)
    }

    fn from_element(root: &Element) -> Result<Self> {
        let info = root
            .elements()
            .find(|e| e.name == "info")
            .ok_or_else(|| CoreError::InvalidManifest {
                message: "missing <info> element".to_string(),
            })?;

        let required = |name: &str| {
            info.attribute(None, name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| CoreError::InvalidManifest {
                    message: format!("<info> is missing the '{}' attribute", name),
                })
        };
        let id = required("id")?;
        let version = required("version")?;

        let child_text = |name: &str| {
            info.elements()
                .find(|e| e.name == name)
                .map(|e| e.text().trim().to_string())
                .filter(|t| !t.is_empty())
        };
        let name = child_text("name").unwrap_or_else(|| id.clone());

        let dependencies = root
            .elements()
            .filter(|e| e.name == "dependency")
            .map(|e| {
                let id = e
                    .attribute(None, "id")
                    .ok_or_else(|| CoreError::InvalidManifest {
                        message: "<dependency> is missing the 'id' attribute".to_string(),
                    })?;
                Ok(ManifestDependency {
                    id: id.to_string(),
                    version: e.attribute(None, "version").map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            name,
            version,
            author: child_text("author"),
            description: child_text("description"),
            dependencies,
            timestamp: None,
            public_key_token: None,
            assets: Vec::new(),
        })
    }

    /// Find an asset by its logical name
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(
            r#"<manifest xmlns="urn:appletpak:manifest">
  <info id="org.example.app" version="1.0.*">
    <name>Example</name>
    <author>Example Org</author>
  </info>
  <dependency id="org.example.core" version="1.0"/>
</manifest>"#,
        )
        .unwrap();

        assert_eq!(manifest.id, "org.example.app");
        assert_eq!(manifest.name, "Example");
        assert_eq!(manifest.version, "1.0.*");
        assert_eq!(manifest.author.as_deref(), Some("Example Org"));
        assert_eq!(manifest.description, None);
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(manifest.dependencies[0].version.as_deref(), Some("1.0"));
        assert!(manifest.public_key_token.is_none());
    }

    #[test]
    fn test_missing_version() {
        let err = Manifest::parse(r#"<manifest><info id="a"/></manifest>"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest { .. }));
    }

    #[test]
    fn test_name_defaults_to_id() {
        let manifest = Manifest::parse(r#"<manifest><info id="a.b" version="1.0.0"/></manifest>"#).unwrap();
        assert_eq!(manifest.name, "a.b");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Manifest::load(Path::new("/nonexistent/manifest.xml")).unwrap_err();
        assert!(matches!(err, CoreError::ManifestNotFound { .. }));
    }
}
