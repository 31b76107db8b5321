//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::UnitState;
use crate::storage::{
    RunRecord, RunStatus, RunTotals, ServerRecord, UnitRecord, WorkflowJobRecord,
    WorkflowJobUpsert,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("CI server not found: {0}")]
    ServerNotFound(String),

    #[error("Workflow job not found: {0}")]
    JobNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler and the
/// trigger command. Writes take `&mut self`; callers sharing a backend wrap it
/// in a mutex.
pub trait Storage {
    // ===== CI Servers =====

    /// Inserts a server or updates its URL and credential reference by name
    ///
    /// `last_synced_at` is preserved on update.
    ///
    /// # Returns
    ///
    /// The server ID (either newly created or existing)
    fn sync_server(
        &mut self,
        name: &str,
        url: &str,
        credential_ref: Option<&str>,
    ) -> StorageResult<i64>;

    /// Gets a server by ID
    fn get_server(&self, server_id: i64) -> StorageResult<ServerRecord>;

    /// Gets a server by its unique name
    fn get_server_by_name(&self, name: &str) -> StorageResult<Option<ServerRecord>>;

    /// Lists all servers ordered by name
    fn list_servers(&self) -> StorageResult<Vec<ServerRecord>>;

    /// Sets the server's `last_synced_at`
    fn touch_server_synced(&mut self, server_id: i64, synced_at: &str) -> StorageResult<()>;

    // ===== Workflow Jobs =====

    /// Inserts or updates a workflow job keyed by `(ci_server_id, url)`
    ///
    /// The catalog component link is never written by an upsert.
    ///
    /// # Returns
    ///
    /// The job ID (either newly created or existing)
    fn upsert_workflow_job(&mut self, job: &WorkflowJobUpsert) -> StorageResult<i64>;

    /// Gets a workflow job by its natural key
    fn get_workflow_job(
        &self,
        server_id: i64,
        url: &str,
    ) -> StorageResult<Option<WorkflowJobRecord>>;

    /// Lists all workflow jobs of a server ordered by URL
    fn list_workflow_jobs(&self, server_id: i64) -> StorageResult<Vec<WorkflowJobRecord>>;

    /// Counts workflow jobs, optionally restricted to one server
    fn count_workflow_jobs(&self, server_id: Option<i64>) -> StorageResult<u64>;

    /// Runs `f` as one transaction
    ///
    /// Everything `f` wrote is rolled back when it returns an error.
    fn in_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> StorageResult<T>;

    /// Sets or clears the catalog component link of a job
    fn link_component(&mut self, job_id: i64, component_id: Option<i64>) -> StorageResult<()>;

    // ===== Sync Runs =====

    /// Creates a new run in `running` status
    fn create_run(
        &mut self,
        server_id: i64,
        root_folder: Option<&str>,
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a server
    fn get_latest_run(&self, server_id: i64) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with its final status and totals
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()>;

    // ===== Crawl Units =====

    /// Records the outcome of a crawl unit
    fn record_unit(&mut self, unit: &UnitRecord) -> StorageResult<i64>;

    /// Gets the failed units of a run
    fn get_failed_units(&self, run_id: i64) -> StorageResult<Vec<UnitRecord>>;

    /// Counts units of a run by state
    fn count_units_by_state(&self, run_id: i64) -> StorageResult<HashMap<UnitState, u64>>;
}
