//! Generic XML packer

use std::path::Path;

use super::{FilePacker, file_name};
use crate::asset::{Asset, AssetContent, MIME_XML, compress};
use crate::error::Result;
use crate::markup;

/// Validates XML documents and stores them compressed
///
/// When optimizing, the document is re-serialized without its declaration
/// and without indentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlPacker;

impl FilePacker for XmlPacker {
    fn extensions(&self) -> &'static [&'static str] {
        &[".xml"]
    }

    fn process(&self, file: &Path, optimize: bool) -> Result<Asset> {
        let source = std::fs::read_to_string(file)?;
        let mut root = markup::parse_document(&source, file)?;

        let bytes = if optimize {
            root.strip_whitespace();
            root.to_markup().into_bytes()
        } else {
            source.into_bytes()
        };

        Ok(Asset {
            name: file_name(file),
            mime_type: MIME_XML.to_string(),
            content: AssetContent::Compressed {
                data: compress(&bytes)?,
            },
            demands: Vec::new(),
        })
    }
}
