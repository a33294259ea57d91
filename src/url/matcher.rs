use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;

/// Shape of an in-scope article URL:
/// `<scheme>://<host>/sites/<slug>/<yyyy>/<mm>/<dd>/<anything>`
#[derive(Debug, Clone)]
pub struct ArticlePattern {
    regex: Regex,
}

impl ArticlePattern {
    /// Builds the article pattern for a host (optionally `host:port`)
    ///
    /// # Examples
    ///
    /// ```
    /// use byline_harvest::url::ArticlePattern;
    ///
    /// let pattern = ArticlePattern::for_host("www.forbes.com").unwrap();
    /// assert!(pattern.is_match("https://www.forbes.com/sites/jane/2024/03/07/rates-rise/"));
    /// assert!(!pattern.is_match("https://www.forbes.com/money/"));
    /// assert!(!pattern.is_match("https://other.com/sites/jane/2024/03/07/rates-rise/"));
    /// ```
    pub fn for_host(host: &str) -> Result<Self, ConfigError> {
        let source = format!(
            r"^https?://{}/sites/\w*/\d{{4}}/\d{{2}}/\d{{2}}/.*",
            regex::escape(host)
        );
        Self::from_regex(&source)
    }

    /// Builds a pattern from a raw regular expression
    pub fn from_regex(source: &str) -> Result<Self, ConfigError> {
        let regex =
            Regex::new(source).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }

    /// Checks whether a single absolute URL is an article link
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The underlying expression, for logging
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Keeps the candidates that look like article links, deduplicated
///
/// Pure and idempotent: filtering an already filtered list returns the same
/// list. First-seen order is kept.
pub fn filter_article_links<I, S>(links: I, pattern: &ArticlePattern) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| pattern.is_match(link.as_ref()))
        .filter_map(|link| {
            let link = link.as_ref();
            seen.insert(link.to_string()).then(|| link.to_string())
        })
        .collect()
}
