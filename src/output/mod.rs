//! Output module for run reports and stored-run statistics
//!
//! This module handles:
//! - The counters a run collects and their printed report
//! - Summaries of runs already stored in the database

mod report;
pub mod stats;

pub use report::{print_report, CrawlReport};
pub use stats::{load_statistics, print_statistics, RunStatistics};
