use crate::crawler::Record;
use crate::storage::traits::{RecordSink, SinkError, SinkResult, SinkSummary};
use crate::storage::RunStatus;
use std::collections::HashSet;

/// Record sink that keeps everything in memory
///
/// Used by tests and by library callers that want the records back
/// directly. It can be told to reject particular articles or to go away
/// after a number of records, to exercise the frontier's failure policy.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<Record>,
    failing: HashSet<String>,
    fatal_after: Option<usize>,
    opened: bool,
    closed: bool,
    rejected: u64,
    status: Option<RunStatus>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every record of `article_url`
    pub fn failing_on(mut self, article_url: impl Into<String>) -> Self {
        self.failing.insert(article_url.into());
        self
    }

    /// Reports itself closed once `limit` records are stored
    pub fn fatal_after(mut self, limit: usize) -> Self {
        self.fatal_after = Some(limit);
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Status passed to `close`, if it was called
    pub fn final_status(&self) -> Option<RunStatus> {
        self.status
    }
}

impl RecordSink for MemorySink {
    fn open(&mut self) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.opened = true;
        Ok(())
    }

    fn accept(&mut self, record: &Record) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if !self.opened {
            return Err(SinkError::NotOpen);
        }
        if matches!(self.fatal_after, Some(limit) if self.records.len() >= limit) {
            self.rejected += 1;
            return Err(SinkError::Closed);
        }
        if self.failing.contains(&record.article.url) {
            self.rejected += 1;
            return Err(SinkError::Rejected(record.article.url.clone()));
        }

        self.records.push(record.clone());
        Ok(())
    }

    fn close(&mut self, status: RunStatus) -> SinkResult<SinkSummary> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if !self.opened {
            return Err(SinkError::NotOpen);
        }
        self.closed = true;
        self.status = Some(status);

        Ok(SinkSummary {
            run_id: None,
            records_written: self.records.len() as u64,
            records_failed: 0,
        })
    }
}
