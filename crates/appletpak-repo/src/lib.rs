//! Appletpak Repository Management
//!
//! This crate stores and retrieves applet packages, including:
//!
//! - **File repositories**: `{id}-{version}.pak` files in a local directory
//! - **HTTP repositories**: package servers speaking the `pak` REST surface
//! - **Local cache**: a file repository consulted before anything else
//!
//! ## Example
//!
//! ```rust,no_run
//! use appletpak_repo::{AppletQuery, RepositoryConfig, RepositoryManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = RepositoryManager::new(RepositoryConfig::load_or_init()?);
//!
//! // Cache first, then every configured repository
//! if let Some(package) = manager.get_from_any("org.example.patients", Some("1.2.0")).await {
//!     println!("found {}", package.meta.hash);
//! }
//!
//! // Union of all repositories
//! let entries = manager.find_from_any(&AppletQuery::all(), 0, 50).await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod file;
pub mod http;
pub mod manager;
pub mod query;
pub mod resolve;

// Re-exports for convenience
pub use backend::{RepositoryBackend, create_backend};
pub use config::{HttpSettings, RepositoryConfig, RepositoryDescriptor};
pub use credentials::{Credentials, ResolvedCredentials};
pub use error::{RepoError, RestClientError, Result, ServerError};
pub use file::FileRepository;
pub use http::HttpRepository;
pub use manager::RepositoryManager;
pub use query::{AppletQuery, FieldMatch};
pub use resolve::resolve_version;
