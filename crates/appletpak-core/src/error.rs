//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("{file}:{line}:{column}: {message}")]
    MalformedSource {
        file: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Failed to process {file}: {message}")]
    Processing { file: PathBuf, message: String },

    #[error("Certificate '{subject}' has no private key")]
    NoPrivateKey { subject: String },

    #[error("Security error: {message}")]
    Security { message: String },

    #[error("Invalid package: {message}")]
    InvalidPackage { message: String },

    #[error("Invalid version '{version}': expected major.minor.build[.revision]")]
    InvalidVersion { version: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Attach a file path to an error raised while packing that file
    ///
    /// Parse failures already carry their location and pass through untouched.
    pub fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            err @ CoreError::MalformedSource { .. } => err,
            err @ CoreError::Processing { .. } => err,
            other => CoreError::Processing {
                file: file.to_path_buf(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
