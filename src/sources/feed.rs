//! RSS 2.0 and Atom feed adapter.
//!
//! Both formats are parsed by `feed-rs` into one entry model; this module only
//! picks the fields it needs from it.
//!
//! | Field       | RSS 2.0                     | Atom                         |
//! |-------------|-----------------------------|------------------------------|
//! | title       | `<title>`                   | `<title>`                    |
//! | link        | `<link>` text               | `<link href=…>` (alternate)  |
//! | description | `<description>`             | `<summary>` then `<content>` |
//! | date        | `<pubDate>`                 | `<published>` / `<updated>`  |

use crate::error::ProviderError;
use crate::models::{RawArticle, Source};
use crate::utils::{collapse_whitespace, strip_html, truncate_for_log};
use chrono::{DateTime, NaiveDateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Parse an RSS or Atom document into its entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<Entry>, ProviderError> {
    let feed = parser::parse(xml.as_bytes()).map_err(|e| ProviderError::Feed(e.to_string()))?;
    Ok(feed.entries)
}

/// The link that points at the article itself: `rel="alternate"` or no `rel`.
fn article_link(entry: &Entry) -> Option<&str> {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
        .map(|l| l.href.trim())
        .filter(|href| !href.is_empty())
}

/// Parse a feed timestamp: RFC 2822 (RSS), then RFC 3339 (Atom), then a bare
/// ISO date-time taken as UTC. Anything else yields `fallback`.
pub fn parse_date(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let s = raw.trim();
    if s.is_empty() {
        return fallback;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return naive.and_utc();
        }
    }
    debug!(value = %s, "Unparseable feed date; using run start time");
    fallback
}

/// Turn a feed entry into a [`RawArticle`]. Relative links are resolved
/// against the feed URL; entries without a usable title or link yield `None`.
/// A missing or unreadable date becomes `now`.
pub fn to_raw_article(
    entry: Entry,
    source: Source,
    feed_url: &Url,
    now: DateTime<Utc>,
) -> Option<RawArticle> {
    let title = entry
        .title
        .as_ref()
        .map(|t| collapse_whitespace(&strip_html(&t.content)))
        .unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    let url = feed_url.join(article_link(&entry)?).ok()?.to_string();
    let summary = entry.summary.map(|t| t.content).unwrap_or_default();
    let body = if summary.trim().is_empty() {
        entry.content.and_then(|c| c.body).unwrap_or_default()
    } else {
        summary
    };
    Some(RawArticle {
        title,
        url,
        source,
        published_at: entry.published.or(entry.updated).unwrap_or(now),
        description: strip_html(&body),
    })
}

/// Adapter for one RSS or Atom feed.
#[derive(Debug, Clone)]
pub struct FeedAdapter {
    client: reqwest::Client,
    source: Source,
    url: String,
}

impl FeedAdapter {
    pub fn new(client: reqwest::Client, source: Source, url: &str) -> Self {
        Self {
            client,
            source,
            url: url.to_string(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    #[instrument(level = "info", skip_all, fields(source = %self.source, url = %self.url))]
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<RawArticle>, ProviderError> {
        let t0 = Instant::now();
        let feed_url = Url::parse(&self.url)
            .map_err(|e| ProviderError::Feed(format!("invalid feed URL {}: {e}", self.url)))?;

        let response = self.client.get(feed_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        let body = response.text().await?;
        let entries = parse_feed(&body).inspect_err(|e| {
            warn!(error = %e, head = %truncate_for_log(&body, 200), "Feed did not parse");
        })?;

        let total = entries.len();
        let articles: Vec<RawArticle> = entries
            .into_iter()
            .filter_map(|entry| to_raw_article(entry, self.source, &feed_url, now))
            .collect();
        info!(
            entries = total,
            count = articles.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Parsed feed"
        );
        Ok(articles)
    }
}
