//! Crawler module for CI folder discovery
//!
//! This module contains the core crawling logic, including:
//! - The crawl unit (list one folder, upsert its pipelines)
//! - The breadth-first unit queue with per-run deduplication
//! - Sync run coordination on a bounded worker pool

mod coordinator;
mod scheduler;
mod unit;

pub use coordinator::{run_sync, Coordinator, SyncReport};
pub use scheduler::{Admission, CrawlTask, Scheduler};
pub use unit::{run_unit, UnitOutcome};
