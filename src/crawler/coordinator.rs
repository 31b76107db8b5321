//! Crawler coordinator - sync run orchestration
//!
//! This module contains the work-queue consumer that drains crawl units for
//! one server, including:
//! - Registering configured servers in storage
//! - Resolving server credentials
//! - Running units on a bounded worker pool
//! - Feeding discovered sub-folders back into the queue
//! - Recording unit and run outcomes

use crate::ci::{CiClient, CiServer, Credential};
use crate::config::Config;
use crate::crawler::scheduler::{Admission, CrawlTask, Scheduler};
use crate::crawler::unit::{run_unit, UnitOutcome};
use crate::state::UnitState;
use crate::storage::{
    RunStatus, RunTotals, SqliteStorage, Storage, StorageError, UnitRecord,
};
use crate::url::normalize_ci_url;
use crate::{DiscoveryError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;

/// Summary of one finished sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub server: String,
    pub run_id: i64,
    pub status: RunStatus,
    pub totals: RunTotals,
    /// Folders whose unit failed (`<root>` for the server root)
    pub failed_folders: Vec<String>,
}

/// Result of one spawned unit, tagged with its task
struct FinishedUnit {
    task: CrawlTask,
    started_at: String,
    result: Result<UnitOutcome>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Arc<CiClient>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database
    ///
    /// Configured servers are registered (or updated) in storage.
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let client = CiClient::new(&config.discovery, &config.user_agent)?;
        Self::with_parts(config, storage, client, config_hash)
    }

    /// Creates a coordinator from an already opened storage and client
    pub fn with_parts(
        config: Config,
        storage: SqliteStorage,
        client: CiClient,
        config_hash: impl Into<String>,
    ) -> Result<Self> {
        let coordinator = Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client: Arc::new(client),
            config_hash: config_hash.into(),
        };
        coordinator.register_servers()?;
        Ok(coordinator)
    }

    /// Shared handle to the underlying storage
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>> {
        self.storage
            .lock()
            .map_err(|_| DiscoveryError::Storage(StorageError::LockPoisoned))
    }

    /// Writes every configured server into storage
    fn register_servers(&self) -> Result<()> {
        let mut storage = self.lock_storage()?;
        for entry in &self.config.servers {
            let url = normalize_ci_url(&entry.url)?;
            storage.sync_server(&entry.name, &url, entry.credential.as_deref())?;
        }
        tracing::debug!("Registered {} CI servers", self.config.servers.len());
        Ok(())
    }

    /// Loads a server record and resolves its credential
    ///
    /// An unresolvable credential is not an error here; requests against the
    /// server fail with `MissingCredential` instead.
    pub fn load_server(&self, name: &str) -> Result<CiServer> {
        let record = self
            .lock_storage()?
            .get_server_by_name(name)?
            .ok_or_else(|| DiscoveryError::UnknownServer(name.to_string()))?;

        let credential = record
            .credential_ref
            .as_deref()
            .and_then(|reference| self.config.credential(reference))
            .and_then(|entry| {
                entry
                    .resolve_secret()
                    .map(|secret| Credential::new(entry.username.clone(), secret))
            });

        if credential.is_none() {
            tracing::warn!("CI server '{}' has no usable credential", record.name);
        }

        Ok(CiServer {
            id: record.id,
            name: record.name,
            url: record.url,
            last_synced_at: record.last_synced_at,
            credential_ref: record.credential_ref,
            credential,
        })
    }

    /// Syncs every configured server, one run per server
    ///
    /// Returns one result per configured server, in configuration order. An
    /// error syncing one server does not stop the others.
    pub async fn sync_all(&self) -> Vec<(String, Result<SyncReport>)> {
        let mut results = Vec::with_capacity(self.config.servers.len());
        for entry in &self.config.servers {
            let result = self.sync(&entry.name, None).await;
            if let Err(e) = &result {
                tracing::error!("Sync of {} could not run: {}", entry.name, e);
            }
            results.push((entry.name.clone(), result));
        }
        results
    }

    /// Runs a sync of one server, starting at its root or at `folder`
    ///
    /// Only a root sync updates the server's `last_synced_at`.
    pub async fn sync(&self, server_name: &str, folder: Option<&str>) -> Result<SyncReport> {
        let server = Arc::new(self.load_server(server_name)?);
        let start = match folder {
            Some(url) => {
                let url = normalize_ci_url(url)?;
                if url == server.url {
                    CrawlTask::root()
                } else {
                    CrawlTask::folder(url)
                }
            }
            None => CrawlTask::root(),
        };

        let mut scheduler = Scheduler::new(&server.url, self.config.discovery.max_depth);
        let admission = scheduler.offer(start.clone());
        if admission != Admission::Queued {
            return Err(DiscoveryError::InvalidStart {
                server: server.name.clone(),
                folder: start.label().to_string(),
                reason: format!("{:?}", admission),
            });
        }

        let run_id = self.lock_storage()?.create_run(
            server.id,
            start.folder_url.as_deref(),
            &self.config_hash,
        )?;

        tracing::info!(
            "Starting sync run {} for {} at {}",
            run_id,
            server.name,
            start.label()
        );
        let started = std::time::Instant::now();

        let workers = self.config.discovery.workers.max(1) as usize;
        let mut in_flight: JoinSet<FinishedUnit> = JoinSet::new();
        let mut totals = RunTotals::default();
        let mut failed_folders = Vec::new();
        let mut start_failed = false;

        loop {
            while in_flight.len() < workers {
                let Some(task) = scheduler.next_task() else {
                    break;
                };
                self.spawn_unit(&mut in_flight, Arc::clone(&server), task);
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            let finished = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!("Crawl unit task for {} was lost: {}", server.name, e);
                    totals.units_failed += 1;
                    continue;
                }
            };

            let FinishedUnit {
                task,
                started_at,
                result,
            } = finished;

            match result {
                Ok(outcome) => {
                    tracing::debug!(
                        "Unit {} done: {} jobs, {} folders, {} ignored",
                        task.label(),
                        outcome.jobs_upserted,
                        outcome.children.len(),
                        outcome.ignored
                    );
                    totals.units_succeeded += 1;
                    totals.jobs_upserted += outcome.jobs_upserted;
                    self.record(run_id, &task, UnitState::Succeeded, &outcome, None, &started_at);

                    for child in outcome.children {
                        match scheduler.offer(child.clone()) {
                            Admission::Queued => {}
                            Admission::AlreadyVisited => {
                                tracing::debug!("Folder {} already visited", child.label());
                            }
                            Admission::TooDeep => {
                                tracing::warn!(
                                    "Not crawling {}: depth {} exceeds {}",
                                    child.label(),
                                    child.depth,
                                    self.config.discovery.max_depth
                                );
                                totals.units_skipped += 1;
                                let now = Utc::now().to_rfc3339();
                                self.record(
                                    run_id,
                                    &child,
                                    UnitState::Skipped,
                                    &UnitOutcome::default(),
                                    Some("depth limit exceeded"),
                                    &now,
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Crawl unit failed on {} at {}: {}",
                        server.name,
                        task.label(),
                        e
                    );
                    totals.units_failed += 1;
                    start_failed |= task.depth == 0;
                    failed_folders.push(task.label().to_string());
                    self.record(
                        run_id,
                        &task,
                        UnitState::Failed,
                        &UnitOutcome::default(),
                        Some(&e.to_string()),
                        &started_at,
                    );
                }
            }
        }

        let status = if start_failed {
            RunStatus::Failed
        } else if totals.units_failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        };

        self.lock_storage()?.finish_run(run_id, status, &totals)?;

        tracing::info!(
            "Sync run {} for {} finished ({}): {} units ok, {} failed, {} jobs upserted in {:?}",
            run_id,
            server.name,
            status.to_db_string(),
            totals.units_succeeded,
            totals.units_failed,
            totals.jobs_upserted,
            started.elapsed()
        );

        Ok(SyncReport {
            server: server.name.clone(),
            run_id,
            status,
            totals,
            failed_folders,
        })
    }

    fn spawn_unit(&self, in_flight: &mut JoinSet<FinishedUnit>, server: Arc<CiServer>, task: CrawlTask) {
        let client = Arc::clone(&self.client);
        let storage = Arc::clone(&self.storage);

        in_flight.spawn(async move {
            let started_at = Utc::now().to_rfc3339();
            tracing::debug!("Unit started: {} at {}", server.name, task.label());
            let unit_task = task.clone();
            let result = isolate(async move {
                run_unit(&client, &storage, &server, &unit_task).await
            })
            .await;
            FinishedUnit {
                task,
                started_at,
                result,
            }
        });
    }

    /// Records a unit outcome
    ///
    /// A failed write is logged and does not end the run; the run totals
    /// still count the unit.
    fn record(
        &self,
        run_id: i64,
        task: &CrawlTask,
        state: UnitState,
        outcome: &UnitOutcome,
        error_message: Option<&str>,
        started_at: &str,
    ) {
        let unit = UnitRecord {
            run_id,
            folder_url: task.folder_url.clone(),
            depth: task.depth,
            state,
            jobs_upserted: outcome.jobs_upserted,
            folders_enqueued: outcome.children.len() as u32,
            error_message: error_message.map(str::to_string),
            started_at: started_at.to_string(),
            finished_at: Utc::now().to_rfc3339(),
        };
        let written = self
            .lock_storage()
            .and_then(|mut storage| Ok(storage.record_unit(&unit)?));
        if let Err(e) = written {
            tracing::error!(
                "Failed to record {} unit {} of run {}: {}",
                state,
                task.label(),
                run_id,
                e
            );
        }
    }

    /// Triggers a build of the job at `job_url` on the named server
    pub async fn trigger(
        &self,
        server_name: &str,
        job_url: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Option<serde_json::Value>> {
        let server = self.load_server(server_name)?;

        let known = self
            .lock_storage()?
            .get_workflow_job(server.id, &normalize_ci_url(job_url)?)?;
        if known.is_none() {
            tracing::warn!("{} has not been discovered on {}", job_url, server.name);
        }

        self.client.trigger_build(&server, job_url, parameters).await
    }
}

/// Runs a unit on its own task so a panic fails only that unit
async fn isolate<F, T>(unit: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(unit).await {
        Ok(result) => result,
        Err(e) => Err(DiscoveryError::UnitAborted(e.to_string())),
    }
}

/// Runs a sync of every configured server
///
/// # Example
///
/// ```no_run
/// use atlas_discovery::config::load_config_with_hash;
/// use atlas_discovery::crawler::run_sync;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("discovery.toml"))?;
/// run_sync(config, hash).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_sync(
    config: Config,
    config_hash: String,
) -> Result<Vec<(String, Result<SyncReport>)>> {
    let coordinator = Coordinator::new(config, config_hash)?;
    Ok(coordinator.sync_all().await)
}
