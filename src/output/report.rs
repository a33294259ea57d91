//! End-of-run report

use std::time::Duration;

/// Counters collected by the frontier over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Listing tasks that completed, fetched or failed
    pub seeds_processed: u64,

    /// Fetches started
    pub tasks_dispatched: u64,

    /// Tasks whose fetch ended in a terminal failure
    pub tasks_failed: u64,

    pub articles_fetched: u64,

    pub authors_fetched: u64,

    /// Records durably accepted by the sink
    pub records_sunk: u64,

    /// Records the sink rejected or lost
    pub sink_failures: u64,

    /// Tasks discarded after shutdown was requested
    pub tasks_abandoned: u64,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Percentage of dispatched tasks that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.tasks_dispatched == 0 {
            return 0.0;
        }
        let ok = self.tasks_dispatched.saturating_sub(self.tasks_failed);
        (ok as f64 / self.tasks_dispatched as f64) * 100.0
    }

    pub fn records_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records_sunk as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Harvest Report ===\n");

    println!("Tasks:");
    println!("  Seeds processed: {}", report.seeds_processed);
    println!("  Dispatched: {}", report.tasks_dispatched);
    println!("  Articles fetched: {}", report.articles_fetched);
    println!("  Authors fetched: {}", report.authors_fetched);
    println!("  Failed: {}", report.tasks_failed);
    if report.tasks_abandoned > 0 {
        println!("  Abandoned at shutdown: {}", report.tasks_abandoned);
    }
    println!();

    println!("Records:");
    println!("  Sunk: {}", report.records_sunk);
    println!("  Sink failures: {}", report.sink_failures);
    println!();

    println!(
        "Finished in {:.1}s ({:.2} records/sec), {:.1}% of tasks succeeded",
        report.elapsed.as_secs_f64(),
        report.records_per_sec(),
        report.success_rate()
    );
}
