//! Statistics generation from the discovery database
//!
//! This module provides functionality for extracting and displaying
//! per-server discovery statistics from the storage layer.

use crate::state::UnitState;
use crate::storage::{RunRecord, Storage};
use crate::DiscoveryError;
use std::collections::HashMap;

/// Statistics for one CI server
#[derive(Debug, Clone)]
pub struct ServerStatistics {
    pub name: String,
    pub url: String,
    pub last_synced_at: Option<String>,

    /// Number of workflow jobs discovered on this server
    pub workflow_jobs: u64,

    /// Most recent sync run, if any
    pub latest_run: Option<RunRecord>,

    /// Unit counts of the latest run by state
    pub units_by_state: HashMap<UnitState, u64>,

    /// Folders whose unit failed in the latest run
    pub failed_folders: Vec<String>,
}

/// Catalog-wide discovery statistics
#[derive(Debug, Clone)]
pub struct DiscoveryStatistics {
    pub total_workflow_jobs: u64,
    pub servers: Vec<ServerStatistics>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<DiscoveryStatistics, DiscoveryError> {
    let total_workflow_jobs = storage.count_workflow_jobs(None)?;

    let mut servers = Vec::new();
    for server in storage.list_servers()? {
        let workflow_jobs = storage.count_workflow_jobs(Some(server.id))?;
        let latest_run = storage.get_latest_run(server.id)?;

        let (units_by_state, failed_folders) = match &latest_run {
            Some(run) => (
                storage.count_units_by_state(run.id)?,
                storage
                    .get_failed_units(run.id)?
                    .into_iter()
                    .map(|u| u.folder_url.unwrap_or_else(|| "<root>".to_string()))
                    .collect(),
            ),
            None => (HashMap::new(), Vec::new()),
        };

        servers.push(ServerStatistics {
            name: server.name,
            url: server.url,
            last_synced_at: server.last_synced_at,
            workflow_jobs,
            latest_run,
            units_by_state,
            failed_folders,
        });
    }

    Ok(DiscoveryStatistics {
        total_workflow_jobs,
        servers,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DiscoveryStatistics) {
    println!("=== Discovery Statistics ===\n");

    println!("Overview:");
    println!("  CI servers: {}", stats.servers.len());
    println!("  Workflow jobs: {}", stats.total_workflow_jobs);
    println!();

    for server in &stats.servers {
        println!("{} ({})", server.name, server.url);
        println!(
            "  Last synced: {}",
            server.last_synced_at.as_deref().unwrap_or("never")
        );
        println!("  Workflow jobs: {}", server.workflow_jobs);

        let Some(run) = &server.latest_run else {
            println!("  No sync runs recorded");
            println!();
            continue;
        };

        println!(
            "  Latest run #{}: {} (started {}, {} jobs upserted)",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.totals.jobs_upserted
        );

        let mut states: Vec<_> = server.units_by_state.iter().collect();
        states.sort_by(|a, b| b.1.cmp(a.1));
        for (state, count) in states {
            println!("    {}: {}", state, count);
        }

        if !server.failed_folders.is_empty() {
            println!("  Failed folders ({}):", server.failed_folders.len());
            for folder in &server.failed_folders {
                println!("    - {}", folder);
            }
        }
        println!();
    }
}
