//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::UnitState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    RunRecord, RunStatus, RunTotals, ServerRecord, UnitRecord, WorkflowJobRecord,
    WorkflowJobUpsert,
};
use crate::DiscoveryError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const SERVER_COLUMNS: &str = "id, name, url, credential_ref, last_synced_at";

const JOB_COLUMNS: &str = "id, ci_server_id, url, name, display_name, full_display_name,
     description, enabled, discovery_source, last_synced_at, component_id, created_at";

const RUN_COLUMNS: &str = "id, ci_server_id, root_folder, started_at, finished_at, config_hash,
     status, units_succeeded, units_failed, units_skipped, jobs_upserted";

const UNIT_COLUMNS: &str = "run_id, folder_url, depth, state, jobs_upserted, folders_enqueued,
     error_message, started_at, finished_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and initializes the schema
    pub fn new(path: &Path) -> Result<Self, DiscoveryError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, DiscoveryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs raw SQL against the database
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }
}

fn server_from_row(row: &Row<'_>) -> rusqlite::Result<ServerRecord> {
    Ok(ServerRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        credential_ref: row.get(3)?,
        last_synced_at: row.get(4)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<WorkflowJobRecord> {
    Ok(WorkflowJobRecord {
        id: row.get(0)?,
        ci_server_id: row.get(1)?,
        url: row.get(2)?,
        name: row.get(3)?,
        display_name: row.get(4)?,
        full_display_name: row.get(5)?,
        description: row.get(6)?,
        enabled: row.get(7)?,
        discovery_source: row.get(8)?,
        last_synced_at: row.get(9)?,
        component_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        ci_server_id: row.get(1)?,
        root_folder: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Failed),
        totals: RunTotals {
            units_succeeded: row.get(7)?,
            units_failed: row.get(8)?,
            units_skipped: row.get(9)?,
            jobs_upserted: row.get(10)?,
        },
    })
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<UnitRecord> {
    Ok(UnitRecord {
        run_id: row.get(0)?,
        folder_url: row.get(1)?,
        depth: row.get(2)?,
        state: UnitState::from_db_string(&row.get::<_, String>(3)?).unwrap_or(UnitState::Failed),
        jobs_upserted: row.get(4)?,
        folders_enqueued: row.get(5)?,
        error_message: row.get(6)?,
        started_at: row.get(7)?,
        finished_at: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== CI Servers =====

    fn sync_server(
        &mut self,
        name: &str,
        url: &str,
        credential_ref: Option<&str>,
    ) -> StorageResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO ci_servers (name, url, credential_ref) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET url = excluded.url, credential_ref = excluded.credential_ref
             RETURNING id",
            params![name, url, credential_ref],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_server(&self, server_id: i64) -> StorageResult<ServerRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM ci_servers WHERE id = ?1", SERVER_COLUMNS),
                params![server_id],
                server_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::ServerNotFound(format!("Server ID {}", server_id)))
    }

    fn get_server_by_name(&self, name: &str) -> StorageResult<Option<ServerRecord>> {
        let server = self
            .conn
            .query_row(
                &format!("SELECT {} FROM ci_servers WHERE name = ?1", SERVER_COLUMNS),
                params![name],
                server_from_row,
            )
            .optional()?;
        Ok(server)
    }

    fn list_servers(&self) -> StorageResult<Vec<ServerRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM ci_servers ORDER BY name", SERVER_COLUMNS))?;

        let servers = stmt
            .query_map([], server_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(servers)
    }

    fn touch_server_synced(&mut self, server_id: i64, synced_at: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE ci_servers SET last_synced_at = ?1 WHERE id = ?2",
            params![synced_at, server_id],
        )?;

        if updated == 0 {
            return Err(StorageError::ServerNotFound(format!("Server ID {}", server_id)));
        }
        Ok(())
    }

    // ===== Workflow Jobs =====

    fn upsert_workflow_job(&mut self, job: &WorkflowJobUpsert) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let id = self.conn.query_row(
            "INSERT INTO workflow_jobs
             (ci_server_id, url, name, display_name, full_display_name, description, enabled,
              discovery_source, last_synced_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(ci_server_id, url) DO UPDATE SET
                name = excluded.name,
                display_name = excluded.display_name,
                full_display_name = excluded.full_display_name,
                description = excluded.description,
                enabled = excluded.enabled,
                discovery_source = excluded.discovery_source,
                last_synced_at = excluded.last_synced_at
             RETURNING id",
            params![
                job.ci_server_id,
                job.url,
                job.name,
                job.display_name,
                job.full_display_name,
                job.description,
                job.enabled,
                job.discovery_source,
                job.last_synced_at,
                now,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_workflow_job(
        &self,
        server_id: i64,
        url: &str,
    ) -> StorageResult<Option<WorkflowJobRecord>> {
        let job = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM workflow_jobs WHERE ci_server_id = ?1 AND url = ?2",
                    JOB_COLUMNS
                ),
                params![server_id, url],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn list_workflow_jobs(&self, server_id: i64) -> StorageResult<Vec<WorkflowJobRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM workflow_jobs WHERE ci_server_id = ?1 ORDER BY url",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![server_id], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn count_workflow_jobs(&self, server_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match server_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM workflow_jobs WHERE ci_server_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM workflow_jobs", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn in_transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> StorageResult<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });

        if result.is_err() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!("Failed to roll back transaction: {}", e);
            }
        }
        result
    }

    fn link_component(&mut self, job_id: i64, component_id: Option<i64>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE workflow_jobs SET component_id = ?1 WHERE id = ?2",
            params![component_id, job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    // ===== Sync Runs =====

    fn create_run(
        &mut self,
        server_id: i64,
        root_folder: Option<&str>,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sync_runs (ci_server_id, root_folder, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                server_id,
                root_folder,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM sync_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, server_id: i64) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sync_runs WHERE ci_server_id = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![server_id],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE sync_runs SET status = ?1, finished_at = ?2, units_succeeded = ?3,
             units_failed = ?4, units_skipped = ?5, jobs_upserted = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.units_succeeded,
                totals.units_failed,
                totals.units_skipped,
                totals.jobs_upserted,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Crawl Units =====

    fn record_unit(&mut self, unit: &UnitRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_units
             (run_id, folder_url, depth, state, jobs_upserted, folders_enqueued, error_message,
              started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                unit.run_id,
                unit.folder_url,
                unit.depth,
                unit.state.to_db_string(),
                unit.jobs_upserted,
                unit.folders_enqueued,
                unit.error_message,
                unit.started_at,
                unit.finished_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_failed_units(&self, run_id: i64) -> StorageResult<Vec<UnitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_units WHERE run_id = ?1 AND state = ?2 ORDER BY id",
            UNIT_COLUMNS
        ))?;

        let units = stmt
            .query_map(
                params![run_id, UnitState::Failed.to_db_string()],
                unit_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    fn count_units_by_state(&self, run_id: i64) -> StorageResult<HashMap<UnitState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM crawl_units WHERE run_id = ?1 GROUP BY state")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (state_str, count) = row?;
            if let Some(state) = UnitState::from_db_string(&state_str) {
                counts.insert(state, count as u64);
            }
        }

        Ok(counts)
    }
}
