//! CLI error types with exit code handling

use appletpak_core::CoreError;
use appletpak_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Compiling the source tree failed
    #[error("Build failed: {message}")]
    #[diagnostic(code(appletpak::cli::build))]
    Build {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Certificate missing, unusable or without a private key
    #[error("Signing failed: {message}")]
    #[diagnostic(code(appletpak::cli::signing))]
    Signing {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Installing into the cache or publishing failed
    #[error("Repository error: {message}")]
    #[diagnostic(code(appletpak::cli::repository))]
    Repository { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(appletpak::cli::input))]
    Input { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(appletpak::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(appletpak::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Build { .. } => exit_codes::BUILD_ERROR,
            CliError::Signing { .. } => exit_codes::SIGNING_ERROR,
            CliError::Repository { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::Input { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn build(err: CoreError) -> Self {
        let help = match &err {
            CoreError::ManifestNotFound { .. } => {
                Some("Run the command from a directory containing manifest.xml".to_string())
            }
            CoreError::MalformedSource { .. } => Some("Fix the markup at the reported location".to_string()),
            _ => None,
        };
        Self::Build {
            message: err.to_string(),
            help,
        }
    }

    pub fn signing(err: CoreError) -> Self {
        let help = match &err {
            CoreError::NoPrivateKey { .. } => {
                Some("Use the private certificate written by `appletpak keygen`".to_string())
            }
            _ => None,
        };
        Self::Signing {
            message: err.to_string(),
            help,
        }
    }

    pub fn repository(err: RepoError) -> Self {
        Self::Repository {
            message: err.to_string(),
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_signing_errors_exit_negative() {
        let err = CliError::signing(CoreError::NoPrivateKey {
            subject: "CN=test".to_string(),
        });
        assert_eq!(err.exit_code(), -1);
        assert!(err.to_string().contains("CN=test"));
    }

    #[test]
    fn test_missing_manifest_has_help() {
        let err = CliError::build(CoreError::ManifestNotFound {
            path: PathBuf::from("/tmp/x/manifest.xml"),
        });
        assert_eq!(err.exit_code(), exit_codes::BUILD_ERROR);
        match err {
            CliError::Build { help, .. } => assert!(help.is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_repository_error_code() {
        let err = CliError::repository(RepoError::ConfigNotFound {
            target: "https://example.org/".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::REPOSITORY_ERROR);
        assert_ne!(err.exit_code(), exit_codes::SUCCESS);
    }
}
