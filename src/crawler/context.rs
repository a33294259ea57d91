//! Context carried across crawl hops
//!
//! Each stage owns a typed context that embeds everything written by its
//! ancestors. Moving to the next stage consumes the context and adds one
//! group of fields, so a later stage can never observe a missing ancestor
//! field and nothing is ever removed. Fan-out clones the context, so
//! siblings never share mutable state.

use serde::{Deserialize, Serialize};

/// Fields written by the listing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFields {
    /// Listing page the article was discovered on
    pub listing_url: String,

    /// Section header of the listing page, if present
    pub context_header: Option<String>,
}

/// Fields written by the article stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFields {
    #[serde(rename = "article_url")]
    pub url: String,

    #[serde(rename = "corpus_title")]
    pub title: Option<String>,

    /// Coarse publish date as shown on the page
    #[serde(rename = "corpus_date_ymd")]
    pub date_ymd: Option<String>,

    /// Fine-grained publish time as shown on the page
    #[serde(rename = "corpus_date_hm")]
    pub date_hm: Option<String>,

    /// Body text fragments in document order
    #[serde(rename = "corpus_content_parts")]
    pub content_parts: Vec<String>,
}

/// Fields written by the author stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorFields {
    #[serde(rename = "author_forbes_url")]
    pub profile_url: String,

    #[serde(rename = "author_name")]
    pub name: Option<String>,

    #[serde(rename = "author_contrib_type")]
    pub contributor_type: Option<String>,

    #[serde(rename = "author_subcontext_header")]
    pub channel: Option<String>,

    #[serde(rename = "author_about")]
    pub about: String,

    #[serde(rename = "author_social_links")]
    pub social_links: Vec<String>,
}

/// Context of an article task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContext {
    pub listing: ListingFields,
}

impl ArticleContext {
    pub fn new(listing: ListingFields) -> Self {
        Self { listing }
    }

    /// Adds the article fields, producing the context for author tasks
    pub fn with_article(self, article: ArticleFields) -> AuthorContext {
        AuthorContext {
            listing: self.listing,
            article,
        }
    }
}

/// Context of an author task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorContext {
    pub listing: ListingFields,
    pub article: ArticleFields,
}

impl AuthorContext {
    /// Completes the record with one contributor's profile
    pub fn into_record(self, author: AuthorFields) -> Record {
        Record {
            listing: self.listing,
            article: self.article,
            author: Some(author),
        }
    }

    /// Completes the record for an article without contributor links
    pub fn into_article_record(self) -> Record {
        Record {
            listing: self.listing,
            article: self.article,
            author: None,
        }
    }
}

/// Terminal aggregate handed to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub listing: ListingFields,

    #[serde(flatten)]
    pub article: ArticleFields,

    #[serde(
        rename = "author_var_dict",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<AuthorFields>,
}
