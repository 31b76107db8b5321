//! Configuration module for atlas-discovery
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use atlas_discovery::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("discovery.toml")).unwrap();
//! println!("Crawling with {} workers", config.discovery.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CredentialEntry, DiscoveryConfig, OutputConfig, ServerEntry, UserAgentConfig,
    DEFAULT_TREE_PROJECTION,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
