//! Output module for reporting discovery results
//!
//! This module handles:
//! - Loading per-server statistics from storage
//! - Printing statistics and sync run reports

pub mod stats;

pub use stats::{load_statistics, print_statistics, DiscoveryStatistics, ServerStatistics};

use crate::crawler::SyncReport;

/// Prints a one-block summary of finished sync runs
pub fn print_sync_reports(reports: &[SyncReport]) {
    for report in reports {
        println!(
            "{}: run #{} {} ({} units ok, {} failed, {} skipped, {} jobs upserted)",
            report.server,
            report.run_id,
            report.status.to_db_string(),
            report.totals.units_succeeded,
            report.totals.units_failed,
            report.totals.units_skipped,
            report.totals.jobs_upserted
        );
        for folder in &report.failed_folders {
            println!("  failed: {}", folder);
        }
    }
}
