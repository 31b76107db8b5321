//! A single crawl unit: list one folder, persist its pipelines, report its
//! sub-folders.

use crate::ci::{CiClient, CiItem, CiServer, ItemKind};
use crate::crawler::scheduler::CrawlTask;
use crate::storage::{SqliteStorage, Storage, StorageError, WorkflowJobUpsert, DISCOVERY_SOURCE};
use crate::url::normalize_ci_url;
use crate::Result;
use chrono::Utc;
use std::sync::Mutex;

/// What one successful unit produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    /// Number of workflow jobs upserted
    pub jobs_upserted: u32,

    /// Sub-folders to crawl next, one task per folder item
    pub children: Vec<CrawlTask>,

    /// Items that were neither folders nor pipelines
    pub ignored: u32,
}

/// Runs one crawl unit
///
/// 1. Lists the task's folder (or the server root)
/// 2. Turns every folder item into a child task
/// 3. Upserts every pipeline item keyed by `(server, url)`
/// 4. For the root task, stamps the server's `last_synced_at`
///
/// Children are returned, not awaited. Any listing or persistence error
/// fails the whole unit and no children are returned.
pub async fn run_unit(
    client: &CiClient,
    storage: &Mutex<SqliteStorage>,
    server: &CiServer,
    task: &CrawlTask,
) -> Result<UnitOutcome> {
    let items = client
        .list_children(server, task.folder_url.as_deref())
        .await?;

    let synced_at = Utc::now().to_rfc3339();
    let mut outcome = UnitOutcome::default();
    let mut jobs = Vec::new();

    for item in &items {
        match item.kind() {
            ItemKind::Folder => {
                if let Some(url) = item_url(item) {
                    outcome.children.push(task.child(url));
                }
            }
            ItemKind::Pipeline => {
                if let Some(url) = item_url(item) {
                    jobs.push(to_upsert(server, item, url, &synced_at));
                }
            }
            ItemKind::Other => {
                tracing::trace!("Ignoring {} ({:?})", item.name, item.class);
                outcome.ignored += 1;
            }
        }
    }

    outcome.jobs_upserted = persist_level(storage, server, task, &jobs, &synced_at)?;
    Ok(outcome)
}

/// Writes one level's jobs and, for the root, the server timestamp
///
/// The level is one transaction: either every job and the timestamp are
/// written or nothing is.
fn persist_level(
    storage: &Mutex<SqliteStorage>,
    server: &CiServer,
    task: &CrawlTask,
    jobs: &[WorkflowJobUpsert],
    synced_at: &str,
) -> Result<u32> {
    let mut storage = storage.lock().map_err(|_| StorageError::LockPoisoned)?;

    let written = storage.in_transaction(|tx| {
        for job in jobs {
            tx.upsert_workflow_job(job)?;
        }
        if task.is_root() {
            tx.touch_server_synced(server.id, synced_at)?;
        }
        Ok(jobs.len() as u32)
    })?;

    Ok(written)
}

/// Normalized URL of a listed item, if it has a usable one
fn item_url(item: &CiItem) -> Option<String> {
    let raw = item.url.as_deref()?;
    match normalize_ci_url(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!("Skipping {} with unusable url {}: {}", item.name, raw, e);
            None
        }
    }
}

fn to_upsert(server: &CiServer, item: &CiItem, url: String, synced_at: &str) -> WorkflowJobUpsert {
    WorkflowJobUpsert {
        ci_server_id: server.id,
        url,
        name: item.name.clone(),
        display_name: item.display_name_or_name().to_string(),
        full_display_name: item.full_display_name.clone(),
        description: item.description.clone().filter(|d| !d.is_empty()),
        enabled: true,
        discovery_source: DISCOVERY_SOURCE.to_string(),
        last_synced_at: synced_at.to_string(),
    }
}
