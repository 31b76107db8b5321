//! Atlas Discovery: CI pipeline discovery for the Atlas catalog
//!
//! This crate crawls a Jenkins-style CI server's folder tree, upserts every
//! discovered pipeline job into the catalog store, and triggers builds of
//! known jobs.

pub mod ci;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for discovery operations
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CI server '{server}' has no usable credential")]
    MissingCredential { server: String },

    #[error("CI request to '{server}' failed for {url}: {source}")]
    CiRequest {
        server: String,
        url: String,
        source: RequestFailure,
    },

    #[error("Unexpected response from '{server}' for {url}: {message}")]
    CiResponse {
        server: String,
        url: String,
        message: String,
    },

    #[error("Unknown CI server: {0}")]
    UnknownServer(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Cannot start sync of '{server}' at {folder}: {reason}")]
    InvalidStart {
        server: String,
        folder: String,
        reason: String,
    },

    #[error("Crawl unit aborted: {0}")]
    UnitAborted(String),

    #[error("URL error: {0}")]
    Url(#[from] crate::url::UrlError),
}

/// Underlying cause of a failed CI request
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: u16 },
}

impl RequestFailure {
    /// Returns true if the request is worth repeating
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Status { status } => *status == 429 || (500..600).contains(status),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use ci::{CiClient, CiItem, CiServer, Credential, ItemKind};
pub use config::Config;
pub use crawler::{Coordinator, CrawlTask};
pub use state::UnitState;
