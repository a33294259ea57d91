//! Statistics over stored runs
//!
//! This module reads finished runs back from the harvest database and
//! prints a per-run summary for `--stats`.

use crate::storage::{RecordStore, RunRecord, SinkResult};

/// Summary of one stored run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Distinct articles with at least one record
    pub articles: u64,

    /// Wall-clock duration, when the run finished
    pub duration_seconds: Option<u64>,
}

/// Loads statistics for every run in the store
///
/// # Arguments
///
/// * `store` - The database to query
pub fn load_statistics(store: &RecordStore) -> SinkResult<Vec<RunStatistics>> {
    store
        .list_runs()?
        .into_iter()
        .map(|run| -> SinkResult<RunStatistics> {
            let articles = store.count_articles(run.id)?;
            let duration_seconds = run_duration(&run);
            Ok(RunStatistics {
                run,
                articles,
                duration_seconds,
            })
        })
        .collect()
}

fn run_duration(run: &RunRecord) -> Option<u64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    u64::try_from((finished - started).num_seconds()).ok()
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[RunStatistics]) {
    println!("=== Stored Runs ===\n");

    if stats.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for entry in stats {
        let run = &entry.run;
        println!("Run {} ({})", run.id, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        if let Some(secs) = entry.duration_seconds {
            println!("  Duration: {}s", secs);
        }
        println!("  Records: {}", run.record_count);
        println!("  Articles: {}", entry.articles);
        println!("  Config hash: {}", run.config_hash);
        println!();
    }

    let total: u64 = stats.iter().map(|s| s.run.record_count).sum();
    println!("Total records across {} runs: {}", stats.len(), total);
}
