//! Appletpak Core - build pipeline for applet packages
//!
//! This crate provides everything needed to turn a source tree into a signed
//! package:
//! - `packer`: per file type asset packers and the extension registry
//! - `ManifestCompiler`: walks a source tree and seals the manifest
//! - `Package`: the `.pak` container and its metadata
//! - `Signer`: RSA/SHA-1 signing and verification of packages

pub mod asset;
pub mod compiler;
pub mod error;
pub mod manifest;
pub mod markup;
pub mod package;
pub mod packer;
pub mod signing;
pub mod version;

pub use asset::{
    Asset, AssetContent, HtmlContent, HtmlKind, LocaleString, ScriptReference, View,
    ViewDefinition, ViewState, WidgetDescriptor, WidgetSize, WidgetType, WidgetView,
};
pub use compiler::ManifestCompiler;
pub use error::{CoreError, Result};
pub use manifest::{MANIFEST_FILE, Manifest, ManifestDependency};
pub use package::{AppletInfo, PACKAGE_EXTENSION, Package, PackageMetadata, content_hash};
pub use packer::{FilePacker, PackerRegistry};
pub use signing::{Signer, SigningCertificate};
pub use version::{AppletVersion, apply_version, translate_path};
