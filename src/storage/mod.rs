//! Storage module for persisting catalog CI data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - CI server records and their last-synced timestamps
//! - Workflow job upserts keyed by `(ci_server_id, url)`
//! - Sync run and crawl unit history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::UnitState;

/// Tag stored on workflow jobs created or refreshed by the crawler
pub const DISCOVERY_SOURCE: &str = "jenkins_sync";

/// Represents a CI server in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub credential_ref: Option<String>,
    pub last_synced_at: Option<String>,
}

/// Represents a discovered workflow job in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowJobRecord {
    pub id: i64,
    pub ci_server_id: i64,
    pub url: String,
    pub name: String,
    pub display_name: String,
    pub full_display_name: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub discovery_source: String,
    pub last_synced_at: String,
    /// Catalog component link; only ever set by hand
    pub component_id: Option<i64>,
    pub created_at: String,
}

/// Values written by a workflow job upsert
#[derive(Debug, Clone)]
pub struct WorkflowJobUpsert {
    pub ci_server_id: i64,
    pub url: String,
    pub name: String,
    pub display_name: String,
    pub full_display_name: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub discovery_source: String,
    pub last_synced_at: String,
}

/// Represents a sync run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub ci_server_id: i64,
    /// Starting folder; `None` for a root sync
    pub root_folder: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Aggregate unit outcomes of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub units_succeeded: u32,
    pub units_failed: u32,
    pub units_skipped: u32,
    pub jobs_upserted: u32,
}

/// Represents one executed crawl unit
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub run_id: i64,
    /// Folder that was listed; `None` for the server root
    pub folder_url: Option<String>,
    pub depth: u32,
    pub state: UnitState,
    pub jobs_upserted: u32,
    pub folders_enqueued: u32,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

/// Status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every unit succeeded or was skipped
    Completed,
    /// The root unit succeeded but some descendants failed
    Partial,
    /// The root unit failed
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
