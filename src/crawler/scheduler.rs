//! Scheduler for crawl units
//!
//! This module handles:
//! - The FIFO queue of folders waiting to be listed (breadth-first order)
//! - Per-run deduplication of folder URLs, which also breaks folder cycles
//! - The folder depth bound

use std::collections::{HashSet, VecDeque};

/// One folder waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized folder URL; `None` lists the server root
    pub folder_url: Option<String>,

    /// Number of folders between the run's starting point and this one
    pub depth: u32,
}

impl CrawlTask {
    /// Task for the server's root listing
    pub fn root() -> Self {
        Self {
            folder_url: None,
            depth: 0,
        }
    }

    /// Task for an explicitly chosen starting folder
    pub fn folder(url: impl Into<String>) -> Self {
        Self {
            folder_url: Some(url.into()),
            depth: 0,
        }
    }

    /// Task for a sub-folder discovered by this task
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            folder_url: Some(url.into()),
            depth: self.depth + 1,
        }
    }

    /// Root tasks stamp the server's `last_synced_at` when they succeed
    pub fn is_root(&self) -> bool {
        self.folder_url.is_none()
    }

    /// Human-readable folder label for logs
    pub fn label(&self) -> &str {
        self.folder_url.as_deref().unwrap_or("<root>")
    }
}

/// Outcome of offering a task to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// The folder was already queued or listed during this run
    AlreadyVisited,
    /// The folder is deeper than the configured bound
    TooDeep,
}

/// Scheduler manages the queue of pending crawl units for one run
pub struct Scheduler {
    queue: VecDeque<CrawlTask>,
    visited: HashSet<String>,
    max_depth: u32,
}

impl Scheduler {
    /// Creates a scheduler for a run against the server at `root_url`
    ///
    /// The root URL is marked visited up front so a folder linking back to
    /// the server root is not listed twice.
    pub fn new(root_url: &str, max_depth: u32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(root_url.to_string());

        Self {
            queue: VecDeque::new(),
            visited,
            max_depth,
        }
    }

    /// Offers a task to the queue
    pub fn offer(&mut self, task: CrawlTask) -> Admission {
        if task.depth > self.max_depth {
            return Admission::TooDeep;
        }

        if let Some(url) = &task.folder_url {
            if !self.visited.insert(url.clone()) {
                return Admission::AlreadyVisited;
            }
        }

        self.queue.push_back(task);
        Admission::Queued
    }

    /// Takes the next task in breadth-first order
    pub fn next_task(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }
}
