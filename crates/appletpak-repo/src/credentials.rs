//! Credentials for HTTP repositories
//!
//! Credentials come from the repository settings, either inline or as
//! references to environment variables (CI/CD friendly).

use serde::{Deserialize, Serialize};

use crate::config::HttpSettings;
use crate::error::{RepoError, Result};

/// Credential types supported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Basic authentication (username/password)
    Basic { username: String, password: String },

    /// Environment variable references
    Env {
        username_var: String,
        password_var: String,
    },
}

impl Credentials {
    /// Create basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create environment variable credentials
    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Credentials configured in the repository settings, if any
    ///
    /// Environment references take precedence over inline values.
    pub fn from_settings(settings: &HttpSettings) -> Option<Self> {
        match (&settings.username_env, &settings.password_env) {
            (Some(user), Some(pass)) => return Some(Self::from_env(user, pass)),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("usernameEnv and passwordEnv must be set together, ignoring them");
            }
            (None, None) => {}
        }
        settings.username.as_ref().map(|user| {
            Self::basic(user, settings.password.clone().unwrap_or_default())
        })
    }

    /// Resolve credentials to actual values
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        match self {
            Credentials::Basic { username, password } => Ok(ResolvedCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::Env {
                username_var,
                password_var,
            } => {
                let read = |var: &str| {
                    std::env::var(var).map_err(|_| RepoError::InvalidConfig {
                        message: format!("Environment variable {} not set", var),
                    })
                };
                Ok(ResolvedCredentials {
                    username: read(username_var)?,
                    password: read(password_var)?,
                })
            }
        }
    }
}

/// Resolved credentials ready for use
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
