//! Crawl stage definitions
//!
//! A lineage moves through the stages in a fixed order and never returns
//! to an earlier one.

use std::fmt;

/// Position of a task in the fixed traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Section listing page: discovers article links
    Listing,

    /// Article page: extracts the body and discovers contributor links
    Article,

    /// Contributor profile page: completes the record
    Author,

    /// Lineage has produced its record (or ended early)
    Done,
}

impl Stage {
    /// Returns true if no further fetches happen in this stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the stage a follow-up task spawned from this one belongs to
    pub fn child(&self) -> Option<Self> {
        match self {
            Self::Listing => Some(Self::Article),
            Self::Article => Some(Self::Author),
            Self::Author | Self::Done => None,
        }
    }

    /// Checks a forward-only transition
    ///
    /// Any stage may finish early (`Done`), otherwise only the next stage
    /// in order is reachable.
    pub fn can_transition_to(&self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Done || self.child() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Article => "article",
            Self::Author => "author",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
