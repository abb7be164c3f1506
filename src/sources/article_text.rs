//! Full-text enrichment: download an article page and keep its paragraphs.
//!
//! Only `<p>` elements outside page chrome are kept, which is enough to give
//! the model the body of a typical news page.

use crate::error::ProviderError;
use crate::models::RawArticle;
use crate::utils::collapse_whitespace;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

const CHROME: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];

/// Shorter paragraphs are bylines, captions and share prompts.
const MIN_PARAGRAPH_CHARS: usize = 40;

fn inside_chrome(p: &ElementRef<'_>) -> bool {
    p.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CHROME.contains(&a.value().name()))
}

/// Extract the readable paragraphs of an HTML page, one per line.
pub fn extract_paragraphs(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&PARAGRAPHS)
        .filter(|p| !inside_chrome(p))
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|t| t.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect::<Vec<_>>()
        .join("\n")
}

async fn download(client: &reqwest::Client, url: &str) -> Result<String, ProviderError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

/// Fetch `url` and return its paragraph text.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `url` - Article page to download
/// * `timeout` - Bound on the whole request, body included
///
/// # Returns
///
/// `Ok(None)` when the page has no usable paragraphs, and
/// [`ProviderError::Timeout`] when the page does not arrive in time.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_article_text(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Option<String>, ProviderError> {
    let html = tokio::time::timeout(timeout, download(client, url))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;
    let text = extract_paragraphs(&html);
    debug!(bytes = text.len(), "Extracted article text");
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Fetch the page text of every article, `concurrency` pages at a time,
/// each bounded by `timeout`.
/// The result is aligned with `articles`; failures become `None`.
#[instrument(level = "info", skip_all, fields(count = articles.len()))]
pub async fn fetch_all_texts(
    client: &reqwest::Client,
    articles: &[RawArticle],
    concurrency: usize,
    timeout: Duration,
) -> Vec<Option<String>> {
    let texts: Vec<Option<String>> = stream::iter(articles)
        .map(|article| async move {
            match fetch_article_text(client, &article.url, timeout).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        url = %article.url,
                        error = %e,
                        "Full-text fetch failed; using description"
                    );
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;
    info!(
        enriched = texts.iter().filter(|t| t.is_some()).count(),
        "Fetched article text"
    );
    texts
}
