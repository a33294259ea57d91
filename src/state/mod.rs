//! State module for tracking crawl progress
//!
//! `Stage` is the position of a task in the listing → article → author
//! traversal, with forward-only transitions.

mod stage;

pub use stage::Stage;
