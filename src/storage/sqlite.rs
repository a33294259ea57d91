//! SQLite sink and read-side store
//!
//! `SqliteSink` is the write side used by a running crawl; `RecordStore`
//! reads finished runs back for `--stats` and tests.

use crate::crawler::Record;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, SinkError, SinkResult, SinkSummary};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Opens a database file and applies pragmas and schema
fn open_connection(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;
    Ok(conn)
}

/// A record serialized and waiting for the next flush
struct PendingRow {
    listing_url: String,
    article_url: String,
    author_url: Option<String>,
    context_header: Option<String>,
    title: Option<String>,
    payload: String,
}

impl PendingRow {
    fn from_record(record: &Record) -> SinkResult<Self> {
        Ok(Self {
            listing_url: record.listing.listing_url.clone(),
            article_url: record.article.url.clone(),
            author_url: record.author.as_ref().map(|a| a.profile_url.clone()),
            context_header: record.listing.context_header.clone(),
            title: record.article.title.clone(),
            payload: serde_json::to_string(record)?,
        })
    }
}

/// Record sink writing to a SQLite database
///
/// Records are buffered and written `flush_every` at a time inside one
/// transaction. A failed flush loses that batch only.
pub struct SqliteSink {
    path: PathBuf,
    config_hash: String,
    flush_every: usize,
    conn: Option<Connection>,
    run_id: Option<i64>,
    buffer: Vec<PendingRow>,
    closed: bool,
    records_written: u64,
    records_failed: u64,
}

impl SqliteSink {
    /// Creates an unopened sink
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Fingerprint of the configuration, stored with the run
    /// * `flush_every` - Records buffered per transaction
    pub fn new(path: impl Into<PathBuf>, config_hash: impl Into<String>, flush_every: usize) -> Self {
        Self {
            path: path.into(),
            config_hash: config_hash.into(),
            flush_every: flush_every.max(1),
            conn: None,
            run_id: None,
            buffer: Vec::new(),
            closed: false,
            records_written: 0,
            records_failed: 0,
        }
    }

    /// Run row created by `open`
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    /// Writes buffered rows in one transaction
    fn flush(&mut self) -> SinkResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let (Some(conn), Some(run_id)) = (self.conn.as_mut(), self.run_id) else {
            return Err(SinkError::NotOpen);
        };

        let rows = std::mem::take(&mut self.buffer);
        let batch = rows.len() as u64;
        let now = Utc::now().to_rfc3339();

        let result = (|| -> Result<u64, rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO records
                     (run_id, listing_url, article_url, author_url, context_header, title, payload, sunk_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        run_id,
                        row.listing_url,
                        row.article_url,
                        row.author_url,
                        row.context_header,
                        row.title,
                        row.payload,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(batch)
        })();

        match result {
            Ok(written) => {
                self.records_written += written;
                tracing::debug!("Flushed {} records to run {}", written, run_id);
                Ok(())
            }
            Err(e) => {
                self.records_failed += batch;
                Err(e.into())
            }
        }
    }
}

impl RecordSink for SqliteSink {
    fn open(&mut self) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = open_connection(&self.path)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                self.config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();

        tracing::info!("Opened {} as run {}", self.path.display(), run_id);
        self.run_id = Some(run_id);
        self.conn = Some(conn);
        Ok(())
    }

    fn accept(&mut self, record: &Record) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.conn.is_none() {
            return Err(SinkError::NotOpen);
        }

        self.buffer.push(PendingRow::from_record(record)?);

        if self.buffer.len() >= self.flush_every {
            // The record is already counted; a failed batch shows up in records_failed
            if let Err(e) = self.flush() {
                tracing::warn!("Failed to flush records: {}", e);
            }
        }
        Ok(())
    }

    fn close(&mut self, status: RunStatus) -> SinkResult<SinkSummary> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.conn.is_none() {
            return Err(SinkError::NotOpen);
        }

        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush final records: {}", e);
        }

        if let (Some(conn), Some(run_id)) = (self.conn.as_ref(), self.run_id) {
            conn.execute(
                "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
                params![status.to_db_string(), Utc::now().to_rfc3339(), run_id],
            )?;
        }

        self.closed = true;
        self.conn = None;

        Ok(SinkSummary {
            run_id: self.run_id,
            records_written: self.records_written,
            records_failed: self.records_failed,
        })
    }
}

/// Read access to a harvest database
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(path: &Path) -> SinkResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    /// All runs, oldest first, with their record counts
    pub fn list_runs(&self) -> SinkResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.started_at, r.finished_at, r.config_hash, r.status,
                    (SELECT COUNT(*) FROM records WHERE run_id = r.id)
             FROM runs r ORDER BY r.id",
        )?;

        let runs = stmt
            .query_map([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    record_count: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    pub fn count_records(&self, run_id: i64) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Distinct articles with at least one record in the run
    pub fn count_articles(&self, run_id: i64) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT article_url) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Records of one run in insertion order
    pub fn load_records(&self, run_id: i64) -> SinkResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM records WHERE run_id = ?1 ORDER BY id")?;

        let payloads = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(SinkError::from))
            .collect()
    }
}
