//! Frontier: drives tasks from seed to record
//!
//! The frontier owns the pending queue and a bounded set of in-flight
//! fetches. Each completed fetch is handed to the stage handler for its
//! task, on the frontier's own task, and whatever the handler emits is
//! queued or sunk before the next completion is looked at. Children are
//! therefore never dispatched before their parent's handler returned.
//!
//! Articles with contributors register a join: their author records are
//! held until every author task has finished, then released to the sink
//! together. The crawl ends when nothing is pending or in flight.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::handlers::StageHandlers;
use crate::crawler::parser::Document;
use crate::crawler::shutdown::ShutdownHandle;
use crate::crawler::task::{FollowUp, JoinId, StageOutput, Task, TaskContext, TaskId};
use crate::crawler::Record;
use crate::output::CrawlReport;
use crate::state::Stage;
use crate::storage::{RecordSink, RunStatus};
use crate::HarvestError;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

const PROGRESS_EVERY: u64 = 25;

type FetchOutcome = (Task, Result<Document, FetchError>);

/// Author fan-in of one article
#[derive(Debug)]
struct ArticleJoin {
    article_url: String,
    outstanding: usize,
    ready: Vec<Record>,
}

/// Bounded concurrent crawl over a task graph
pub struct Frontier<S: RecordSink> {
    fetcher: Arc<dyn Fetcher>,
    handlers: StageHandlers,
    sink: S,
    max_in_flight: usize,
    shutdown: ShutdownHandle,
    pending: VecDeque<Task>,
    joins: HashMap<JoinId, ArticleJoin>,
    next_task: u64,
    next_join: u64,
    accepted: u64,
    report: CrawlReport,
}

impl<S: RecordSink> Frontier<S> {
    /// Creates a frontier
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Source of documents
    /// * `handlers` - Compiled stage handlers
    /// * `sink` - Destination for completed records
    /// * `max_in_flight` - Upper bound on concurrent fetches (at least 1)
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        handlers: StageHandlers,
        sink: S,
        max_in_flight: usize,
    ) -> Self {
        Self {
            fetcher,
            handlers,
            sink,
            max_in_flight: max_in_flight.max(1),
            shutdown: ShutdownHandle::new(),
            pending: VecDeque::new(),
            joins: HashMap::new(),
            next_task: 0,
            next_join: 0,
            accepted: 0,
            report: CrawlReport::default(),
        }
    }

    /// Uses an externally owned shutdown flag
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Crawls from `seeds` until the task graph is exhausted
    ///
    /// Returns the run's counters and the sink, closed. Only a failure to
    /// open the sink aborts the run; every other failure is counted.
    pub async fn run(mut self, seeds: Vec<Url>) -> Result<(CrawlReport, S), HarvestError> {
        let start = Instant::now();
        self.sink.open()?;

        for url in seeds {
            let id = self.next_task_id();
            self.pending.push_back(Task {
                id,
                lineage: id,
                url,
                context: TaskContext::Listing,
                join: None,
            });
        }
        tracing::info!("Starting harvest with {} seeds", self.pending.len());

        let mut in_flight: JoinSet<FetchOutcome> = JoinSet::new();
        let mut completed: u64 = 0;

        loop {
            if self.shutdown.is_requested() {
                self.abandon_pending();
            } else {
                while in_flight.len() < self.max_in_flight {
                    let Some(task) = self.pending.pop_front() else {
                        break;
                    };
                    self.spawn_fetch(&mut in_flight, task);
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((task, result)) => self.complete(task, result),
                Err(e) => {
                    tracing::error!("Fetch task did not complete: {}", e);
                    self.report.tasks_failed += 1;
                }
            }

            completed += 1;
            if completed % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {} tasks completed, {} pending, {} in flight, {} records accepted",
                    completed,
                    self.pending.len(),
                    in_flight.len(),
                    self.accepted
                );
            }
        }

        self.release_stranded_joins();

        let status = if self.shutdown.is_requested() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        match self.sink.close(status) {
            Ok(summary) => {
                self.report.records_sunk = summary.records_written;
                self.report.sink_failures += summary.records_failed;
            }
            Err(e) => {
                // Buffered records may not have been written; nothing is reported as sunk
                tracing::error!(
                    "Failed to close sink: {}; {} records were accepted before",
                    e,
                    self.accepted
                );
                self.report.records_sunk = 0;
            }
        }

        self.report.elapsed = start.elapsed();
        tracing::info!(
            "Harvest {}: {} records sunk, {} tasks failed, {} sink failures in {:.1}s",
            status.to_db_string(),
            self.report.records_sunk,
            self.report.tasks_failed,
            self.report.sink_failures,
            self.report.elapsed.as_secs_f64()
        );

        Ok((self.report, self.sink))
    }

    fn next_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    fn spawn_fetch(&mut self, in_flight: &mut JoinSet<FetchOutcome>, task: Task) {
        tracing::trace!("Dispatching {} [{}] {}", task.id, task.stage(), task.url);
        self.report.tasks_dispatched += 1;

        let fetcher = Arc::clone(&self.fetcher);
        in_flight.spawn(async move {
            let result = fetcher.fetch(&task.url).await;
            (task, result)
        });
    }

    /// Handles one finished fetch
    fn complete(&mut self, task: Task, result: Result<Document, FetchError>) {
        let Task {
            id,
            lineage,
            url,
            context,
            join,
        } = task;
        let stage = context.stage();

        match result {
            Ok(document) => {
                tracing::debug!(
                    "Fetched {} [{}] {} ({}) from seed {}",
                    id,
                    stage,
                    document.url,
                    document.status_code,
                    lineage
                );
                if document.final_url != document.url {
                    tracing::debug!("{} redirected to {}", document.url, document.final_url);
                }
                match stage {
                    Stage::Article => self.report.articles_fetched += 1,
                    Stage::Author => self.report.authors_fetched += 1,
                    _ => {}
                }
                let output = self.handlers.dispatch(&url, context, &document);
                self.route(stage, lineage, join, output);
            }
            Err(e) => {
                tracing::warn!("Task {} [{}] from seed {} failed: {}", id, stage, lineage, e);
                self.report.tasks_failed += 1;
                if let Some(join) = join {
                    self.settle(join, None);
                }
            }
        }

        if stage == Stage::Listing {
            self.report.seeds_processed += 1;
        }
    }

    /// Sends a handler's record on its way and queues its follow-ups
    fn route(&mut self, stage: Stage, lineage: TaskId, join: Option<JoinId>, output: StageOutput) {
        match (join, output.record) {
            (Some(join), record) => self.settle(join, record),
            (None, Some(record)) => self.sink_record(record),
            (None, None) => {}
        }

        let (forward, backward): (Vec<FollowUp>, Vec<FollowUp>) = output
            .follow_ups
            .into_iter()
            .partition(|f| stage.can_transition_to(f.context.stage()));
        for follow_up in backward {
            tracing::warn!(
                "Dropping {} follow-up {} from {} task",
                follow_up.context.stage(),
                follow_up.url,
                stage
            );
        }
        self.schedule(lineage, forward);
    }

    fn schedule(&mut self, lineage: TaskId, follow_ups: Vec<FollowUp>) {
        let authors: Vec<&FollowUp> = follow_ups
            .iter()
            .filter(|f| f.context.stage() == Stage::Author)
            .collect();

        let join = match authors.first().map(|f| &f.context) {
            Some(TaskContext::Author(ctx)) => {
                let id = JoinId(self.next_join);
                self.next_join += 1;
                self.joins.insert(
                    id,
                    ArticleJoin {
                        article_url: ctx.article.url.clone(),
                        outstanding: authors.len(),
                        ready: Vec::new(),
                    },
                );
                Some(id)
            }
            _ => None,
        };

        for follow_up in follow_ups {
            let id = self.next_task_id();
            let task_join = match follow_up.context.stage() {
                Stage::Author => join,
                _ => None,
            };
            self.pending.push_back(Task {
                id,
                lineage,
                url: follow_up.url,
                context: follow_up.context,
                join: task_join,
            });
        }
    }

    /// Marks one author task of `join` finished; releases the article's
    /// records once none are outstanding
    fn settle(&mut self, join: JoinId, record: Option<Record>) {
        let done = match self.joins.get_mut(&join) {
            Some(entry) => {
                entry.ready.extend(record);
                entry.outstanding = entry.outstanding.saturating_sub(1);
                entry.outstanding == 0
            }
            None => {
                tracing::warn!("Author completed for unknown join {:?}", join);
                return;
            }
        };

        if !done {
            return;
        }
        if let Some(entry) = self.joins.remove(&join) {
            if entry.ready.is_empty() {
                tracing::debug!("No author of {} completed, no record", entry.article_url);
            }
            for record in entry.ready {
                self.sink_record(record);
            }
        }
    }

    fn sink_record(&mut self, record: Record) {
        match self.sink.accept(&record) {
            Ok(()) => self.accepted += 1,
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    "Sink unavailable at {}: {}; shutting down",
                    record.article.url,
                    e
                );
                self.report.sink_failures += 1;
                self.shutdown.request();
            }
            Err(e) => {
                tracing::warn!("Sink rejected record for {}: {}", record.article.url, e);
                self.report.sink_failures += 1;
            }
        }
    }

    /// Drops every queued task after shutdown
    fn abandon_pending(&mut self) {
        while let Some(task) = self.pending.pop_front() {
            tracing::debug!(
                "Abandoning {} [{}] {} from seed {}",
                task.id,
                task.stage(),
                task.url,
                task.lineage
            );
            self.report.tasks_abandoned += 1;
            if let Some(join) = task.join {
                self.settle(join, None);
            }
        }
    }

    /// Joins can only remain if a fetch task was lost without reporting back
    fn release_stranded_joins(&mut self) {
        let stranded: Vec<JoinId> = self.joins.keys().copied().collect();
        for id in stranded {
            if let Some(entry) = self.joins.remove(&id) {
                tracing::warn!(
                    "Releasing {} with {} authors outstanding",
                    entry.article_url,
                    entry.outstanding
                );
                for record in entry.ready {
                    self.sink_record(record);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemorySink, SinkError, SinkResult, SinkSummary};
    use crate::url::ArticlePattern;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    const LISTING: &str = "https://www.forbes.com/money/";
    const SOLO: &str = "https://www.forbes.com/sites/jane/2024/03/07/solo/";
    const DUO: &str = "https://www.forbes.com/sites/bob/2024/03/08/duo/";
    const JANE: &str = "https://www.forbes.com/sites/jane/";
    const BOB: &str = "https://www.forbes.com/sites/bob/";

    /// Serves canned pages; anything else is a 404
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, String>,
        fetched: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn page(mut self, url: &str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<Document, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());
            match self.pages.get(url.as_str()) {
                Some(body) => Ok(Document::new(url.clone(), body.clone())),
                None => Err(FetchError::Http {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    type EventLog = Arc<Mutex<Vec<String>>>;

    /// Holds back one URL; logs each fetch as it returns
    struct SlowFetcher {
        inner: MapFetcher,
        slow: String,
        delay: Duration,
        events: EventLog,
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch(&self, url: &Url) -> Result<Document, FetchError> {
            if url.as_str() == self.slow {
                tokio::time::sleep(self.delay).await;
            }
            let result = self.inner.fetch(url).await;
            self.events.lock().unwrap().push(format!("fetched {}", url));
            result
        }
    }

    /// Logs each accepted record into the shared event log
    #[derive(Default)]
    struct RecordingSink {
        events: EventLog,
        fail_close: bool,
        accepted: u64,
    }

    impl RecordSink for RecordingSink {
        fn open(&mut self) -> SinkResult<()> {
            Ok(())
        }

        fn accept(&mut self, record: &Record) -> SinkResult<()> {
            let author = record.author.as_ref().map(|a| a.profile_url.as_str());
            self.events.lock().unwrap().push(format!(
                "sunk {} {}",
                record.article.url,
                author.unwrap_or("-")
            ));
            self.accepted += 1;
            Ok(())
        }

        fn close(&mut self, _status: RunStatus) -> SinkResult<SinkSummary> {
            if self.fail_close {
                return Err(SinkError::Rejected("flush failed".to_string()));
            }
            Ok(SinkSummary {
                run_id: None,
                records_written: self.accepted,
                records_failed: 0,
            })
        }
    }

    fn listing_html(links: &[&str]) -> String {
        let cards: String = links
            .iter()
            .map(|l| format!(r#"<div class="card"><a href="{}">x</a></div>"#, l))
            .collect();
        format!(
            r#"<html><body>
                 <h1 class="chansec-header"><div class="fs-content">Money</div></h1>
                 {}
                 <div class="card"><a href="https://elsewhere.com/sites/x/2024/01/01/y/">away</a></div>
               </body></html>"#,
            cards
        )
    }

    fn article_html(title: &str, authors: &[&str]) -> String {
        let blocks: String = authors
            .iter()
            .map(|a| {
                format!(
                    r#"<div class="contribs"><div class="contrib-container">
                         <a class="fs-author-avatar" href="{}">a</a>
                       </div></div>"#,
                    a
                )
            })
            .collect();
        format!(
            r#"<html><body>
                 <div class="article-headline-container"><h1 class="fs-headline">{}</h1></div>
                 <div class="top-contrib-block">{}</div>
                 <div class="article-body"><h2>Lead</h2><p>Body text.</p></div>
               </body></html>"#,
            title, blocks
        )
    }

    fn author_html(name: &str) -> String {
        format!(
            r#"<html><body>
                 <h1 class="contributor-details__name"><span>{}</span></h1>
                 <div class="contributor-about__full-description"><p>Bio.</p></div>
               </body></html>"#,
            name
        )
    }

    fn site() -> MapFetcher {
        MapFetcher::default()
            .page(LISTING, listing_html(&[SOLO, DUO, SOLO]))
            .page(SOLO, article_html("Solo", &[]))
            .page(DUO, article_html("Duo", &[JANE, BOB]))
            .page(JANE, author_html("Jane"))
            .page(BOB, author_html("Bob"))
    }

    fn frontier<S: RecordSink>(fetcher: Arc<MapFetcher>, sink: S, max: usize) -> Frontier<S> {
        frontier_with(fetcher, sink, max)
    }

    fn frontier_with<S: RecordSink>(fetcher: Arc<dyn Fetcher>, sink: S, max: usize) -> Frontier<S> {
        let handlers =
            StageHandlers::new(ArticlePattern::for_host("www.forbes.com").unwrap()).unwrap();
        Frontier::new(fetcher, handlers, sink, max)
    }

    fn seeds() -> Vec<Url> {
        vec![Url::parse(LISTING).unwrap()]
    }

    #[tokio::test]
    async fn test_fan_out_and_fan_in_cardinality() {
        let fetcher = Arc::new(site());
        let (report, sink) = frontier(fetcher.clone(), MemorySink::new(), 4)
            .run(seeds())
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 3);

        let solo: Vec<&Record> = records.iter().filter(|r| r.article.url == SOLO).collect();
        assert_eq!(solo.len(), 1);
        assert!(solo[0].author.is_none());

        let duo: Vec<&Record> = records.iter().filter(|r| r.article.url == DUO).collect();
        assert_eq!(duo.len(), 2);
        assert_eq!(duo[0].article, duo[1].article);
        assert_eq!(duo[0].listing, duo[1].listing);
        let authors: HashSet<String> = duo
            .iter()
            .map(|r| r.author.as_ref().unwrap().profile_url.clone())
            .collect();
        assert_eq!(authors, HashSet::from([JANE.to_string(), BOB.to_string()]));

        for record in records {
            assert_eq!(record.listing.context_header.as_deref(), Some("Money"));
        }

        assert_eq!(report.seeds_processed, 1);
        assert_eq!(report.articles_fetched, 2);
        assert_eq!(report.authors_fetched, 2);
        assert_eq!(report.tasks_dispatched, 5);
        assert_eq!(report.tasks_failed, 0);
        assert_eq!(report.records_sunk, 3);
        assert_eq!(sink.final_status(), Some(RunStatus::Completed));

        // SOLO appears twice on the listing but is fetched once
        let fetched = fetcher.fetched();
        assert_eq!(fetched.iter().filter(|u| u.as_str() == SOLO).count(), 1);
    }

    #[tokio::test]
    async fn test_parents_fetched_before_children() {
        let fetcher = Arc::new(site());
        frontier(fetcher.clone(), MemorySink::new(), 1)
            .run(seeds())
            .await
            .unwrap();

        let fetched = fetcher.fetched();
        let position = |u: &str| fetched.iter().position(|f| f == u).unwrap();
        assert!(position(LISTING) < position(DUO));
        assert!(position(DUO) < position(JANE));
        assert!(position(DUO) < position(BOB));
    }

    #[tokio::test]
    async fn test_author_records_carry_article_fields() {
        let (_, sink) = frontier(Arc::new(site()), MemorySink::new(), 8)
            .run(seeds())
            .await
            .unwrap();

        for record in sink.records().iter().filter(|r| r.author.is_some()) {
            assert_eq!(record.article.title.as_deref(), Some("Duo"));
            assert_eq!(record.article.content_parts, vec!["Lead", "Body text."]);
        }
    }

    #[tokio::test]
    async fn test_failed_author_only_drops_its_record() {
        let fetcher = MapFetcher::default()
            .page(LISTING, listing_html(&[DUO]))
            .page(DUO, article_html("Duo", &[JANE, BOB]))
            .page(JANE, author_html("Jane"));

        let (report, sink) = frontier(Arc::new(fetcher), MemorySink::new(), 4)
            .run(seeds())
            .await
            .unwrap();

        assert_eq!(report.tasks_failed, 1);
        assert_eq!(sink.records().len(), 1);
        let author = sink.records()[0].author.as_ref().unwrap();
        assert_eq!(author.profile_url, JANE);
    }

    #[tokio::test]
    async fn test_all_authors_failing_yields_no_record() {
        let fetcher = MapFetcher::default()
            .page(LISTING, listing_html(&[SOLO, DUO]))
            .page(SOLO, article_html("Solo", &[]))
            .page(DUO, article_html("Duo", &[JANE, BOB]));

        let (report, sink) = frontier(Arc::new(fetcher), MemorySink::new(), 4)
            .run(seeds())
            .await
            .unwrap();

        assert_eq!(report.tasks_failed, 2);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].article.url, SOLO);
    }

    #[tokio::test]
    async fn test_failed_seed_does_not_stop_others() {
        let other = "https://www.forbes.com/leadership/";
        let fetcher = site();

        let (report, sink) = frontier(Arc::new(fetcher), MemorySink::new(), 2)
            .run(vec![Url::parse(other).unwrap(), Url::parse(LISTING).unwrap()])
            .await
            .unwrap();

        assert_eq!(report.seeds_processed, 2);
        assert_eq!(report.tasks_failed, 1);
        assert_eq!(sink.records().len(), 3);
    }

    #[tokio::test]
    async fn test_sink_rejection_is_fail_open() {
        let sink = MemorySink::new().failing_on(SOLO);
        let (report, sink) = frontier(Arc::new(site()), sink, 4)
            .run(seeds())
            .await
            .unwrap();

        assert_eq!(report.sink_failures, 1);
        assert_eq!(report.records_sunk, 2);
        assert!(sink.records().iter().all(|r| r.article.url == DUO));
        assert_eq!(sink.final_status(), Some(RunStatus::Completed));
    }

    #[tokio::test]
    async fn test_fatal_sink_error_interrupts_run() {
        let sink = MemorySink::new().fatal_after(0);
        let (report, sink) = frontier(Arc::new(site()), sink, 1)
            .run(seeds())
            .await
            .unwrap();

        assert!(report.sink_failures >= 1);
        assert!(sink.records().is_empty());
        assert_eq!(sink.final_status(), Some(RunStatus::Interrupted));
        assert!(report.tasks_dispatched < 5);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_dispatches_nothing() {
        let fetcher = Arc::new(site());
        let frontier = frontier(fetcher.clone(), MemorySink::new(), 4);
        frontier.shutdown_handle().request();

        let (report, sink) = frontier.run(seeds()).await.unwrap();

        assert_eq!(report.tasks_dispatched, 0);
        assert_eq!(report.tasks_abandoned, 1);
        assert!(fetcher.fetched().is_empty());
        assert_eq!(sink.final_status(), Some(RunStatus::Interrupted));
    }

    #[tokio::test]
    async fn test_article_records_wait_for_slowest_author() {
        let events: EventLog = Arc::default();
        let fetcher = SlowFetcher {
            inner: MapFetcher::default()
                .page(LISTING, listing_html(&[DUO]))
                .page(DUO, article_html("Duo", &[JANE, BOB]))
                .page(JANE, author_html("Jane"))
                .page(BOB, author_html("Bob")),
            slow: BOB.to_string(),
            delay: Duration::from_millis(200),
            events: events.clone(),
        };
        let sink = RecordingSink {
            events: events.clone(),
            ..RecordingSink::default()
        };

        let (report, _) = frontier_with(Arc::new(fetcher), sink, 4)
            .run(seeds())
            .await
            .unwrap();
        assert_eq!(report.records_sunk, 2);

        let log = events.lock().unwrap().clone();
        let position = |event: String| log.iter().position(|e| *e == event).unwrap();
        let jane_done = position(format!("fetched {}", JANE));
        let bob_done = position(format!("fetched {}", BOB));
        let first_sunk = log.iter().position(|e| e.starts_with("sunk ")).unwrap();

        // JANE finishes first, yet nothing is sunk until BOB returns
        assert!(jane_done < bob_done);
        assert!(bob_done < first_sunk);
        assert_eq!(log.iter().filter(|e| e.starts_with("sunk ")).count(), 2);
    }

    #[tokio::test]
    async fn test_failed_close_reports_nothing_sunk() {
        let sink = RecordingSink {
            fail_close: true,
            ..RecordingSink::default()
        };

        let (report, sink) = frontier_with(Arc::new(site()), sink, 4)
            .run(seeds())
            .await
            .unwrap();

        assert_eq!(sink.accepted, 3);
        assert_eq!(report.records_sunk, 0);
    }
}
