//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the discovery database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- CI endpoints known to the catalog
CREATE TABLE IF NOT EXISTS ci_servers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    credential_ref TEXT,
    last_synced_at TEXT
);

-- Discovered pipeline jobs
CREATE TABLE IF NOT EXISTS workflow_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ci_server_id INTEGER NOT NULL REFERENCES ci_servers(id),
    url TEXT NOT NULL,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    full_display_name TEXT,
    description TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    discovery_source TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,
    component_id INTEGER,
    created_at TEXT NOT NULL,
    UNIQUE(ci_server_id, url)
);

CREATE INDEX IF NOT EXISTS idx_workflow_jobs_server ON workflow_jobs(ci_server_id);

-- Track sync runs
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ci_server_id INTEGER NOT NULL REFERENCES ci_servers(id),
    root_folder TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    units_succeeded INTEGER NOT NULL DEFAULT 0,
    units_failed INTEGER NOT NULL DEFAULT 0,
    units_skipped INTEGER NOT NULL DEFAULT 0,
    jobs_upserted INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_server ON sync_runs(ci_server_id);

-- One row per executed crawl unit
CREATE TABLE IF NOT EXISTS crawl_units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES sync_runs(id),
    folder_url TEXT,
    depth INTEGER NOT NULL,
    state TEXT NOT NULL,
    jobs_upserted INTEGER NOT NULL DEFAULT 0,
    folders_enqueued INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_units_run ON crawl_units(run_id);
CREATE INDEX IF NOT EXISTS idx_crawl_units_state ON crawl_units(state);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
