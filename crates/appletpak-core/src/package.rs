//! Sealed package container
//!
//! A `.pak` file is a gzip compressed tar archive holding:
//! - `metadata.json` (always the first entry)
//! - `manifest.json`, the canonical manifest bytes
//! - `certificate.der` (optional X.509 signing certificate)
//!
//! Keeping the metadata first lets repositories index a package without
//! inflating its assets.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tar::{Archive, Builder, Header};

use crate::asset::base64_opt;
use crate::error::{CoreError, Result};
use crate::manifest::Manifest;

/// File extension of package archives
pub const PACKAGE_EXTENSION: &str = "pak";

const METADATA_ENTRY: &str = "metadata.json";
const MANIFEST_ENTRY: &str = "manifest.json";
const CERTIFICATE_ENTRY: &str = "certificate.der";

/// Metadata block of a sealed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
    /// Lower-case hex SHA-256 of the canonical manifest bytes
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_token: Option<String>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// Lightweight projection of a package used for queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppletInfo {
    pub id: String,
    pub version: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_token: Option<String>,
}

impl From<&PackageMetadata> for AppletInfo {
    fn from(meta: &PackageMetadata) -> Self {
        Self {
            id: meta.id.clone(),
            version: meta.version.clone(),
            hash: meta.hash.clone(),
            public_key_token: meta.public_key_token.clone(),
        }
    }
}

/// A sealed, transmissible package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Canonical manifest bytes, the input of hashing and signing
    pub manifest: Vec<u8>,
    pub meta: PackageMetadata,
    /// Embedded X.509 certificate (DER)
    pub certificate: Option<Vec<u8>>,
}

/// SHA-256 of `data` as lower-case hex
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

impl Package {
    /// Seal a manifest into canonical bytes and compute its hash
    pub fn seal(manifest: &Manifest) -> Result<Self> {
        let bytes = serde_json::to_vec(manifest)?;
        let hash = content_hash(&bytes);
        Ok(Self {
            manifest: bytes,
            meta: PackageMetadata {
                id: manifest.id.clone(),
                version: manifest.version.clone(),
                hash,
                public_key_token: manifest.public_key_token.clone(),
                signature: None,
            },
            certificate: None,
        })
    }

    /// Reconstruct the manifest from the canonical bytes
    pub fn unpack(&self) -> Result<Manifest> {
        Ok(serde_json::from_slice(&self.manifest)?)
    }

    /// Whether the recorded hash matches the manifest bytes
    pub fn verify_hash(&self) -> bool {
        content_hash(&self.manifest) == self.meta.hash
    }

    pub fn is_signed(&self) -> bool {
        self.meta.signature.is_some()
    }

    pub fn info(&self) -> AppletInfo {
        AppletInfo::from(&self.meta)
    }

    /// Serialize into the `.pak` container format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        let metadata = serde_json::to_vec(&self.meta)?;
        add_bytes_to_archive(&mut builder, METADATA_ENTRY, &metadata)?;
        add_bytes_to_archive(&mut builder, MANIFEST_ENTRY, &self.manifest)?;
        if let Some(certificate) = &self.certificate {
            add_bytes_to_archive(&mut builder, CERTIFICATE_ENTRY, certificate)?;
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }

    /// Parse the `.pak` container format
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from(data)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(reader));

        let mut meta = None;
        let mut manifest = None;
        let mut certificate = None;

        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;

            match path.as_str() {
                METADATA_ENTRY => meta = Some(serde_json::from_slice::<PackageMetadata>(&data)?),
                MANIFEST_ENTRY => manifest = Some(data),
                CERTIFICATE_ENTRY => certificate = Some(data),
                _ => {}
            }
        }

        let meta = meta.ok_or_else(|| CoreError::InvalidPackage {
            message: format!("missing {}", METADATA_ENTRY),
        })?;
        let manifest = manifest.ok_or_else(|| CoreError::InvalidPackage {
            message: format!("missing {}", MANIFEST_ENTRY),
        })?;

        Ok(Self {
            manifest,
            meta,
            certificate,
        })
    }

    /// Write the package to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Read only the metadata of a package file
    pub fn read_info(path: &Path) -> Result<AppletInfo> {
        let file = File::open(path)?;
        let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut entries = archive.entries()?;
        let mut first = entries.next().ok_or_else(|| CoreError::InvalidPackage {
            message: "empty archive".to_string(),
        })??;

        if first.path()?.to_string_lossy() != METADATA_ENTRY {
            return Err(CoreError::InvalidPackage {
                message: format!("first entry is not {}", METADATA_ENTRY),
            });
        }

        let mut data = Vec::new();
        first.read_to_end(&mut data)?;
        let meta: PackageMetadata = serde_json::from_slice(&data)?;
        Ok(AppletInfo::from(&meta))
    }
}

/// Helper to add bytes to an archive
fn add_bytes_to_archive<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, name, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, AssetContent, MIME_BINARY};
    use tempfile::TempDir;

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new("org.example.app", "Example", "1.0.0");
        manifest.assets.push(Asset {
            name: "img/logo.png".to_string(),
            mime_type: MIME_BINARY.to_string(),
            content: AssetContent::Raw {
                data: vec![1, 2, 3],
            },
            demands: vec![],
        });
        manifest
    }

    #[test]
    fn test_seal_hash_is_consistent() {
        let package = Package::seal(&sample_manifest()).unwrap();
        assert_eq!(package.meta.hash, content_hash(&package.manifest));
        assert!(package.verify_hash());
        assert!(!package.is_signed());
        assert_eq!(package.meta.id, "org.example.app");
        assert_eq!(package.meta.version, "1.0.0");
    }

    #[test]
    fn test_unpack_restores_manifest() {
        let manifest = sample_manifest();
        let package = Package::seal(&manifest).unwrap();
        assert_eq!(package.unpack().unwrap(), manifest);
    }

    #[test]
    fn test_tampered_manifest_fails_hash() {
        let mut package = Package::seal(&sample_manifest()).unwrap();
        package.manifest.push(b' ');
        assert!(!package.verify_hash());
    }

    #[test]
    fn test_container_round_trip() {
        let mut package = Package::seal(&sample_manifest()).unwrap();
        package.meta.signature = Some(vec![9; 128]);
        package.certificate = Some(vec![0x30, 0x82, 0x01, 0x0a]);

        let bytes = package.to_bytes().unwrap();
        assert_eq!(Package::from_bytes(&bytes).unwrap(), package);
    }

    #[test]
    fn test_save_load_and_read_info() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/org.example.app-1.0.0.pak");

        let package = Package::seal(&sample_manifest()).unwrap();
        package.save(&path).unwrap();

        assert_eq!(Package::load(&path).unwrap(), package);
        assert_eq!(Package::read_info(&path).unwrap(), package.info());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Package::from_bytes(b"not a package").is_err());
    }
}
