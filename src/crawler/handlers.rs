//! Stage handlers: listing, article, author
//!
//! Each handler is a synchronous transformation of one fetched document
//! plus the incoming context into follow-up tasks and/or a record. They
//! never block and never touch the network.

use crate::crawler::context::{
    ArticleContext, ArticleFields, AuthorContext, AuthorFields, ListingFields,
};
use crate::crawler::parser::{compile_selector, Document, Page, TextMode, TextZone};
use crate::crawler::task::{FollowUp, StageOutput, TaskContext};
use crate::crawler::visited::VisitedSet;
use crate::url::{filter_article_links, resolve_link, ArticlePattern};
use crate::HarvestError;
use scraper::Selector;
use url::Url;

const LISTING_HEADER: &str = "h1.chansec-header div.fs-content";
const LISTING_LINK_SOURCES: &[&str] = &[
    "div.card a[href]",
    "article.stream-item a.stream-item__title[href]",
];

const ARTICLE_TITLE: &str = "div.article-headline-container h1.fs-headline";
const ARTICLE_DATE_YMD: &str = "div.header-content-container div.content-data time";
const ARTICLE_DATE_HM: &str = "div.header-content-container div.content-data span.time time";
const ARTICLE_CONTRIB_BLOCK: &str = "div.top-contrib-block div.contribs";
const ARTICLE_CONTRIB_LINK: &str = "div.contrib-container a.fs-author-avatar";
const ARTICLE_BODY_ZONES: &[(&str, TextMode)] = &[
    ("div.article-body > p", TextMode::Descendant),
    ("div.article-body div > p", TextMode::Descendant),
    ("div.article-body > p > a", TextMode::Descendant),
    ("div.article-body > ol > li", TextMode::Nested),
    ("div.article-body ul > li", TextMode::Nested),
    ("div.article-body > h1", TextMode::Descendant),
    ("div.article-body > h2", TextMode::Descendant),
    ("div.article-body > h3", TextMode::Descendant),
    ("div.article-body > h4", TextMode::Descendant),
    ("div.article-body > h5", TextMode::Descendant),
];

const AUTHOR_NAME: &str = "h1.contributor-details__name span";
const AUTHOR_TYPE: &str = "div.contributor-details__type span";
const AUTHOR_CHANNEL: &str = "a.contributor-details__display-channel";
const AUTHOR_ABOUT: &str = "div.contributor-about__full-description p";
const AUTHOR_SOCIAL: &str = "div.contributor-social a";

/// Compiled queries for every stage, plus the article link filter
#[derive(Debug, Clone)]
pub struct StageHandlers {
    pattern: ArticlePattern,

    listing_header: Selector,
    listing_links: Vec<Selector>,

    article_title: Selector,
    article_date_ymd: Selector,
    article_date_hm: Selector,
    contrib_block: Selector,
    contrib_link: Selector,
    body_zones: Vec<TextZone>,

    author_name: Selector,
    author_type: Selector,
    author_channel: Selector,
    author_about: Selector,
    author_social: Selector,
}

impl StageHandlers {
    /// Compiles all stage queries
    ///
    /// # Returns
    ///
    /// * `Ok(StageHandlers)` - All selectors compiled
    /// * `Err(HarvestError::Selector)` - A selector failed to parse
    pub fn new(pattern: ArticlePattern) -> Result<Self, HarvestError> {
        let listing_links = LISTING_LINK_SOURCES
            .iter()
            .map(|s| compile_selector(s))
            .collect::<Result<Vec<_>, _>>()?;

        let body_zones = ARTICLE_BODY_ZONES
            .iter()
            .map(|(s, mode)| {
                Ok(TextZone {
                    selector: compile_selector(s)?,
                    mode: *mode,
                })
            })
            .collect::<Result<Vec<_>, HarvestError>>()?;

        Ok(Self {
            pattern,
            listing_header: compile_selector(LISTING_HEADER)?,
            listing_links,
            article_title: compile_selector(ARTICLE_TITLE)?,
            article_date_ymd: compile_selector(ARTICLE_DATE_YMD)?,
            article_date_hm: compile_selector(ARTICLE_DATE_HM)?,
            contrib_block: compile_selector(ARTICLE_CONTRIB_BLOCK)?,
            contrib_link: compile_selector(ARTICLE_CONTRIB_LINK)?,
            body_zones,
            author_name: compile_selector(AUTHOR_NAME)?,
            author_type: compile_selector(AUTHOR_TYPE)?,
            author_channel: compile_selector(AUTHOR_CHANNEL)?,
            author_about: compile_selector(AUTHOR_ABOUT)?,
            author_social: compile_selector(AUTHOR_SOCIAL)?,
        })
    }

    /// Runs the handler matching the task's stage
    ///
    /// `url` is the URL the task requested; relative links resolve against
    /// the URL the response actually came from.
    pub fn dispatch(&self, url: &Url, context: TaskContext, document: &Document) -> StageOutput {
        let page = Page::parse(&document.body);
        let base = &document.final_url;

        match context {
            TaskContext::Listing => self.handle_listing(url, base, &page),
            TaskContext::Article(ctx) => self.handle_article(url, base, &page, ctx),
            TaskContext::Author(ctx) => self.handle_author(url, base, &page, ctx),
        }
    }

    /// Listing page: store the header and emit one article task per link
    ///
    /// Each link source is resolved and filtered on its own; the filtered
    /// sources are unioned in source order.
    pub fn handle_listing(&self, url: &Url, base: &Url, page: &Page) -> StageOutput {
        let listing = ListingFields {
            listing_url: url.to_string(),
            context_header: page.first_own_text(&self.listing_header),
        };

        let mut visited = VisitedSet::new();
        for source in &self.listing_links {
            let resolved: Vec<String> = page
                .attrs(source, "href")
                .iter()
                .filter_map(|href| resolve_link(href, base))
                .map(String::from)
                .collect();
            for link in filter_article_links(&resolved, &self.pattern) {
                if let Ok(link) = Url::parse(&link) {
                    visited.insert(link);
                }
            }
        }

        if visited.is_empty() {
            tracing::debug!("Listing {} has no article links", url);
            return StageOutput::default();
        }

        tracing::debug!(
            "Listing {} ({:?}): {} article links",
            url,
            listing.context_header,
            visited.len()
        );

        let context = ArticleContext::new(listing);
        StageOutput::follow_ups(
            visited
                .into_urls()
                .into_iter()
                .map(|link| FollowUp {
                    url: link,
                    context: TaskContext::Article(context.clone()),
                })
                .collect(),
        )
    }

    /// Article page: extract the body, then finish or fan out to authors
    pub fn handle_article(
        &self,
        url: &Url,
        base: &Url,
        page: &Page,
        context: ArticleContext,
    ) -> StageOutput {
        let article = ArticleFields {
            url: url.to_string(),
            title: page.first_text(&self.article_title),
            date_ymd: page.first_own_text(&self.article_date_ymd),
            date_hm: page.first_own_text(&self.article_date_hm),
            content_parts: page.zone_texts(&self.body_zones),
        };

        let author_links: Vec<Url> = page
            .select(&self.contrib_block)
            .filter_map(|block| {
                block
                    .select(&self.contrib_link)
                    .find_map(|a| a.value().attr("href"))
                    .and_then(|href| resolve_link(href, base))
            })
            .collect();

        tracing::debug!(
            "Article {}: {} body fragments, {} contributors",
            url,
            article.content_parts.len(),
            author_links.len()
        );

        let context = context.with_article(article);

        if author_links.is_empty() {
            return StageOutput::record(context.into_article_record());
        }

        StageOutput::follow_ups(
            author_links
                .into_iter()
                .map(|link| FollowUp {
                    url: link,
                    context: TaskContext::Author(context.clone()),
                })
                .collect(),
        )
    }

    /// Author profile page: attach the profile and complete the record
    pub fn handle_author(
        &self,
        url: &Url,
        base: &Url,
        page: &Page,
        context: AuthorContext,
    ) -> StageOutput {
        let author = AuthorFields {
            profile_url: url.to_string(),
            name: page.first_own_text(&self.author_name),
            contributor_type: page.first_own_text(&self.author_type),
            channel: page.first_own_text(&self.author_channel),
            about: page.own_texts(&self.author_about).join(" "),
            social_links: page
                .attrs(&self.author_social, "href")
                .iter()
                .map(|href| match resolve_link(href, base) {
                    Some(link) => link.to_string(),
                    None => href.clone(),
                })
                .collect(),
        };

        tracing::debug!("Author {}: {:?}", url, author.name);

        StageOutput::record(context.into_record(author))
    }
}
