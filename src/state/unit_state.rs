//! Crawl unit state definitions
//!
//! A crawl unit is one independently scheduled listing of a single folder.
use std::fmt;

/// Recorded outcome of one crawl unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Folder was listed and all pipeline jobs were upserted
    Succeeded,

    /// Listing or persistence failed; the folder's subtree was not expanded
    Failed,

    /// Folder was not crawled because it exceeds the depth bound
    Skipped,
}

impl UnitState {
    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
