//! Crawler module: the listing → article → author pipeline
//!
//! This module contains the core crawling logic, including:
//! - Typed per-stage context and the records it completes into
//! - Document queries and the three stage handlers
//! - HTTP fetching with retry logic behind the `Fetcher` trait
//! - The frontier that schedules fetches and joins author fan-out
//! - Coordination from configuration to a finished run

pub mod context;
mod coordinator;
mod fetcher;
mod frontier;
mod handlers;
mod parser;
mod shutdown;
mod task;
mod visited;

pub use context::{ArticleContext, ArticleFields, AuthorContext, AuthorFields, ListingFields, Record};
pub use coordinator::{run_harvest, seed_urls};
pub use fetcher::{build_http_client, is_retryable_status, FetchError, Fetcher, HttpFetcher};
pub use frontier::Frontier;
pub use handlers::StageHandlers;
pub use parser::{compile_selector, Document, Page, TextMode, TextZone};
pub use shutdown::ShutdownHandle;
pub use task::{FollowUp, JoinId, StageOutput, Task, TaskContext, TaskId};
pub use visited::VisitedSet;
