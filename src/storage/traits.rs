//! Sink trait and error types
//!
//! This module defines the interface the frontier hands completed records
//! to, and the errors a sink may report.

use crate::crawler::Record;
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink used before open")]
    NotOpen,

    #[error("Sink already closed")]
    Closed,

    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    /// True when the sink can accept nothing further
    ///
    /// A fatal error stops the crawl; anything else only loses one record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotOpen | Self::Closed)
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Totals reported by a sink when it closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Run row the records were written under, if the sink keeps runs
    pub run_id: Option<i64>,

    /// Records durably written
    pub records_written: u64,

    /// Records accepted but lost while writing
    pub records_failed: u64,
}

/// Destination for completed records
///
/// `open` is called once before the first record and `close` once after the
/// frontier drains. A failed `accept` loses that record only; the sink must
/// stay usable unless the error is fatal.
pub trait RecordSink {
    fn open(&mut self) -> SinkResult<()>;

    /// Accepts one record; may buffer
    fn accept(&mut self, record: &Record) -> SinkResult<()>;

    /// Flushes anything buffered and finishes the run with `status`
    fn close(&mut self, status: RunStatus) -> SinkResult<SinkSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SinkError::NotOpen.is_fatal());
        assert!(SinkError::Closed.is_fatal());
        assert!(!SinkError::Rejected("x".to_string()).is_fatal());

        let sqlite = SinkError::from(rusqlite::Error::InvalidQuery);
        assert!(!sqlite.is_fatal());
    }
}
