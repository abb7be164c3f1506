//! Guardian adapter, backed by the Content API search endpoint.
//!
//! Results are requested newest first with the `trailText` field, one page at
//! a time, until `max_pages` or the last page reported by the API. A failure
//! after the first page ends pagination but keeps what was already read.

use crate::config::GuardianConfig;
use crate::error::ProviderError;
use crate::models::{RawArticle, Source};
use crate::sources::feed::parse_date;
use crate::utils::{collapse_whitespace, strip_html};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    pages: u32,
    #[serde(default)]
    results: Vec<SearchResult>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    web_title: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    web_publication_date: String,
    #[serde(default)]
    fields: ResultFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultFields {
    #[serde(default)]
    trail_text: String,
}

pub struct GuardianAdapter {
    client: reqwest::Client,
    config: GuardianConfig,
    api_key: String,
}

impl fmt::Debug for GuardianAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardianAdapter")
            .field("base_url", &self.config.base_url)
            .field("section", &self.config.section)
            .field("max_pages", &self.config.max_pages)
            .finish_non_exhaustive()
    }
}

impl GuardianAdapter {
    pub fn new(client: reqwest::Client, config: GuardianConfig, api_key: String) -> Self {
        Self {
            client,
            config,
            api_key,
        }
    }

    /// Search URL for `page`, without the key.
    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/search?section={}&order-by=newest&show-fields=trailText&page-size={}&page={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.section),
            self.config.page_size,
            page,
        )
    }

    async fn fetch_page(&self, page: u32) -> Result<SearchResponse, ProviderError> {
        let url = self.page_url(page);
        let response = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let envelope: SearchEnvelope = serde_json::from_str(&response.text().await?)?;
        let body = envelope.response;
        if !body.status.is_empty() && body.status != "ok" {
            return Err(ProviderError::Api(
                body.message.unwrap_or_else(|| format!("search status {}", body.status)),
            ));
        }
        Ok(body)
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(source = %Source::Guardian, section = %self.config.section)
    )]
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<RawArticle>, ProviderError> {
        let t0 = Instant::now();
        let mut articles = Vec::new();
        let mut page = 1;
        loop {
            let body = match self.fetch_page(page).await {
                Ok(body) => body,
                Err(e) if page > 1 => {
                    warn!(page, error = %e, "Guardian page failed; keeping earlier pages");
                    break;
                }
                Err(e) => return Err(e),
            };
            debug!(
                page,
                pages = body.pages,
                results = body.results.len(),
                "Fetched Guardian page"
            );
            let empty = body.results.is_empty();
            articles.extend(
                body.results
                    .into_iter()
                    .map(|r| RawArticle {
                        title: collapse_whitespace(&r.web_title),
                        url: r.web_url.trim().to_string(),
                        source: Source::Guardian,
                        published_at: parse_date(&r.web_publication_date, now),
                        description: strip_html(&r.fields.trail_text),
                    })
                    .filter(|a| !a.title.is_empty() && !a.url.is_empty()),
            );
            if empty || page >= body.pages || page >= self.config.max_pages {
                break;
            }
            page += 1;
        }
        info!(
            count = articles.len(),
            pages = page,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched Guardian search results"
        );
        Ok(articles)
    }
}
