//! Units of work travelling through the frontier

use crate::crawler::context::{ArticleContext, AuthorContext, Record};
use crate::state::Stage;
use std::fmt;
use url::Url;

/// Identifier assigned to every task when it is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Identifier of an article's author fan-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinId(pub u64);

/// Stage-specific context carried by a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskContext {
    /// Seed listing page, nothing accumulated yet
    Listing,
    Article(ArticleContext),
    Author(AuthorContext),
}

impl TaskContext {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Listing => Stage::Listing,
            Self::Article(_) => Stage::Article,
            Self::Author(_) => Stage::Author,
        }
    }
}

/// Fetch `url` at the stage given by `context`
///
/// Immutable once enqueued; the frontier consumes it exactly once.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,

    /// Seed task this task descends from
    pub lineage: TaskId,

    pub url: Url,

    pub context: TaskContext,

    /// Author fan-in this task reports to
    pub join: Option<JoinId>,
}

impl Task {
    pub fn stage(&self) -> Stage {
        self.context.stage()
    }
}

/// A task requested by a stage handler, before the frontier assigns ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub url: Url,
    pub context: TaskContext,
}

/// What a stage handler produced for one document
#[derive(Debug, Default)]
pub struct StageOutput {
    pub follow_ups: Vec<FollowUp>,
    pub record: Option<Record>,
}

impl StageOutput {
    pub fn follow_ups(follow_ups: Vec<FollowUp>) -> Self {
        Self {
            follow_ups,
            record: None,
        }
    }

    pub fn record(record: Record) -> Self {
        Self {
            follow_ups: Vec::new(),
            record: Some(record),
        }
    }
}
