//! Document queries over fetched HTML
//!
//! Handlers describe which CSS queries to run; this module evaluates them
//! against a parsed page and returns text or attribute values in document
//! order. Three text flavours are supported:
//!
//! - **own text**: text nodes that are direct children of the matched element
//! - **descendant text**: every text node below the matched element
//! - **nested text**: text nodes below the matched element whose parent is
//!   another element (the element's own text is skipped)

use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fetched page ready for querying
#[derive(Debug, Clone)]
pub struct Document {
    /// URL the task asked for
    pub url: Url,

    /// URL the response came from after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Raw HTML body
    pub body: String,
}

impl Document {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status_code: 200,
            body: body.into(),
        }
    }
}

/// How text is collected from an element matched by a [`TextZone`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Descendant,
    Nested,
}

/// One structural zone contributing body text
#[derive(Debug, Clone)]
pub struct TextZone {
    pub selector: Selector,
    pub mode: TextMode,
}

/// Compiles a CSS selector, surfacing the offending expression on failure
pub fn compile_selector(source: &str) -> Result<Selector, HarvestError> {
    Selector::parse(source).map_err(|e| HarvestError::Selector {
        selector: source.to_string(),
        message: format!("{:?}", e),
    })
}

/// Parsed HTML page
pub struct Page {
    html: Html,
}

impl Page {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// Elements matching `selector` in document order
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.html.select(selector)
    }

    /// First non-blank own text across all matches, trimmed
    pub fn first_own_text(&self, selector: &Selector) -> Option<String> {
        self.select(selector)
            .flat_map(own_text)
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Every non-blank own text across all matches, trimmed
    pub fn own_texts(&self, selector: &Selector) -> Vec<String> {
        self.select(selector)
            .flat_map(own_text)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// First non-blank descendant text across all matches, trimmed
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.select(selector)
            .flat_map(|el| el.text())
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Attribute values of all matches that carry `attr`
    pub fn attrs(&self, selector: &Selector, attr: &str) -> Vec<String> {
        self.select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::to_string)
            .collect()
    }

    /// Text fragments from every zone, in document order
    ///
    /// Elements are visited in document order; an element matching several
    /// zones contributes once per zone, so nested zones repeat text rather
    /// than dropping it. Whitespace-only fragments are skipped.
    pub fn zone_texts(&self, zones: &[TextZone]) -> Vec<String> {
        let mut fragments = Vec::new();

        for node in self.html.root_element().descendants() {
            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };

            for zone in zones {
                if !zone.selector.matches(&element) {
                    continue;
                }
                let texts: Vec<&str> = match zone.mode {
                    TextMode::Descendant => element.text().collect(),
                    TextMode::Nested => nested_text(element),
                };
                fragments.extend(
                    texts
                        .into_iter()
                        .filter(|t| !t.trim().is_empty())
                        .map(str::to_string),
                );
            }
        }

        fragments
    }
}

/// Text nodes that are direct children of `element`
fn own_text(element: ElementRef<'_>) -> Vec<&str> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect()
}

/// Text nodes below `element` that are not its direct children
fn nested_text(element: ElementRef<'_>) -> Vec<&str> {
    element
        .descendants()
        .filter(|node| {
            node.parent()
                .map(|parent| parent.id() != element.id())
                .unwrap_or(false)
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect()
}
