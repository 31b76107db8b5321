//! State module for tracking crawl progress
//!
//! - `UnitState`: lifecycle of a single crawl unit (one folder listing)

mod unit_state;

pub use unit_state::UnitState;
