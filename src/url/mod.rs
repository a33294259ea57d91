//! URL handling module for Byline-Harvest
//!
//! This module provides URL normalization, href resolution, and the
//! article link filter used on listing pages.

mod matcher;
mod normalize;

pub use matcher::{filter_article_links, ArticlePattern};
pub use normalize::{normalize_url, resolve_link};
