//! JavaScript packer

use std::path::Path;

use super::{FilePacker, file_name};
use crate::asset::{Asset, AssetContent, MIME_JAVASCRIPT, compress};
use crate::error::Result;

/// Stores scripts compressed; sources are never rewritten
#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptPacker;

impl FilePacker for JavascriptPacker {
    fn extensions(&self) -> &'static [&'static str] {
        &[".js"]
    }

    fn process(&self, file: &Path, _optimize: bool) -> Result<Asset> {
        let data = std::fs::read(file)?;
        Ok(Asset {
            name: file_name(file),
            mime_type: MIME_JAVASCRIPT.to_string(),
            content: AssetContent::Compressed {
                data: compress(&data)?,
            },
            demands: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.js");
        let source = "// keep me\nfunction main() { return 1; }\n";
        std::fs::write(&path, source).unwrap();

        let asset = JavascriptPacker.process(&path, true).unwrap();
        assert_eq!(asset.mime_type, MIME_JAVASCRIPT);
        assert!(matches!(asset.content, AssetContent::Compressed { .. }));
        assert_eq!(asset.content_bytes().unwrap(), source.as_bytes());
    }
}
