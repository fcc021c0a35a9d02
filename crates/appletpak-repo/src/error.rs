//! Error types for repository operations

use appletpak_core::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Lookup Errors ============
    #[error("Package not found: {id}{}", version.as_ref().map(|v| format!(" {}", v)).unwrap_or_default())]
    PackageNotFound { id: String, version: Option<String> },

    // ============ Storage Errors ============
    #[error("Invalid package: {message}")]
    InvalidPackage { message: String },

    #[error("Storage error at {location}: {message}")]
    Storage { location: String, message: String },

    // ============ Lifecycle Errors ============
    #[error("Repository {location} is already initialized")]
    AlreadyInitialized { location: String },

    #[error("Repository has not been initialized")]
    NotInitialized,

    // ============ Configuration Errors ============
    #[error("No configured repository matches {target}")]
    ConfigNotFound { target: String },

    #[error("No repository backend handles the '{scheme}' scheme")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid repository configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Network Errors ============
    #[error(transparent)]
    Rest(#[from] RestClientError),

    // ============ Wrapped Errors ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Wrap an I/O failure of a storage backend
    pub fn storage(location: impl fmt::Display, err: impl fmt::Display) -> Self {
        RepoError::Storage {
            location: location.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

/// Error body returned by a package server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Only sent by servers running a debug build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A failed call to a package server
#[derive(Debug, Clone, Error)]
pub struct RestClientError {
    pub verb: String,
    pub uri: String,
    /// `None` when no response was received
    pub status: Option<u16>,
    pub server: Option<ServerError>,
    pub message: String,
}

impl fmt::Display for RestClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed", self.verb, self.uri)?;
        if let Some(status) = self.status {
            write!(f, " with status {}", status)?;
        }
        match &self.server {
            Some(server) => {
                write!(f, ": {}", server.message)?;
                if let Some(cause) = &server.cause {
                    write!(f, " ({})", cause)?;
                }
                Ok(())
            }
            None => write!(f, ": {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_error_display() {
        let err = RestClientError {
            verb: "PUT".to_string(),
            uri: "https://example.test/pak".to_string(),
            status: Some(409),
            server: Some(ServerError {
                message: "Package already exists".to_string(),
                cause: Some("duplicate key".to_string()),
                stack: None,
            }),
            message: "conflict".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "PUT https://example.test/pak failed with status 409: Package already exists (duplicate key)"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = RepoError::PackageNotFound {
            id: "org.example".to_string(),
            version: Some("1.0.0".to_string()),
        };
        assert_eq!(err.to_string(), "Package not found: org.example 1.0.0");
    }
}
