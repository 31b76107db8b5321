use serde::Deserialize;

/// Default field projection requested from folder listings
pub const DEFAULT_TREE_PROJECTION: &str =
    "jobs[name,url,description,displayName,fullDisplayName,_class]";

/// Main configuration structure for atlas-discovery
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(rename = "credential", default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(rename = "server", default)]
    pub servers: Vec<ServerEntry>,
}

impl Config {
    /// Looks up a configured server by name
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Looks up a configured credential by name
    pub fn credential(&self, name: &str) -> Option<&CredentialEntry> {
        self.credentials.iter().find(|c| c.name == name)
    }
}

/// Crawl and client behavior
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Field projection passed as the `tree` query parameter
    #[serde(rename = "tree-projection", default = "default_tree_projection")]
    pub tree_projection: String,

    /// Maximum number of crawl units in flight
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Folders nested deeper than this are not crawled
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Attempts per CI request, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            tree_projection: default_tree_projection(),
            workers: default_workers(),
            max_depth: default_max_depth(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_tree_projection() -> String {
    DEFAULT_TREE_PROJECTION.to_string()
}

fn default_workers() -> u32 {
    4
}

fn default_max_depth() -> u32 {
    32
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Named basic-auth identity for CI servers
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub name: String,
    pub username: String,

    /// Inline secret (password or API token)
    #[serde(default)]
    pub secret: Option<String>,

    /// Environment variable holding the secret
    #[serde(rename = "secret-env", default)]
    pub secret_env: Option<String>,
}

impl CredentialEntry {
    /// Resolves the secret, preferring the inline value over the environment
    pub fn resolve_secret(&self) -> Option<String> {
        self.secret
            .clone()
            .or_else(|| self.secret_env.as_ref().and_then(|var| std::env::var(var).ok()))
            .filter(|s| !s.is_empty())
    }
}

/// One CI server to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub name: String,

    /// Base URL of the CI server
    pub url: String,

    /// Name of a `[[credential]]` entry
    #[serde(default)]
    pub credential: Option<String>,
}
