//! Catch-all packer for files no other packer claims

use std::path::Path;

use super::{CATCH_ALL, FilePacker, file_name};
use crate::asset::{Asset, AssetContent, MIME_BINARY};
use crate::error::Result;

/// Stores the raw file bytes unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryPacker;

impl FilePacker for BinaryPacker {
    fn extensions(&self) -> &'static [&'static str] {
        &[CATCH_ALL]
    }

    fn process(&self, file: &Path, _optimize: bool) -> Result<Asset> {
        let data = std::fs::read(file)?;
        Ok(Asset {
            name: file_name(file),
            mime_type: MIME_BINARY.to_string(),
            content: AssetContent::Raw { data },
            demands: Vec::new(),
        })
    }
}
