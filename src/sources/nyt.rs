//! New York Times adapter, backed by the Top Stories API.
//!
//! `GET {base}/svc/topstories/v2/{section}.json?api-key=…` returns the
//! current front of one section. Only `title`, `abstract`, `url` and
//! `published_date` are used.

use crate::config::NytConfig;
use crate::error::ProviderError;
use crate::models::{RawArticle, Source};
use crate::sources::feed::parse_date;
use crate::utils::{collapse_whitespace, strip_html};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct TopStoriesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<TopStory>,
}

#[derive(Debug, Deserialize)]
struct TopStory {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "abstract")]
    summary: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    published_date: String,
}

pub struct NytAdapter {
    client: reqwest::Client,
    config: NytConfig,
    api_key: String,
}

impl fmt::Debug for NytAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NytAdapter")
            .field("base_url", &self.config.base_url)
            .field("section", &self.config.section)
            .finish_non_exhaustive()
    }
}

impl NytAdapter {
    pub fn new(client: reqwest::Client, config: NytConfig, api_key: String) -> Self {
        Self {
            client,
            config,
            api_key,
        }
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(source = %Source::NYT, section = %self.config.section)
    )]
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<RawArticle>, ProviderError> {
        let t0 = Instant::now();
        let url = format!(
            "{}/svc/topstories/v2/{}.json",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.section)
        );

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
        let body: TopStoriesResponse = serde_json::from_str(&response.text().await?)?;
        if !body.status.is_empty() && body.status != "OK" {
            return Err(ProviderError::Api(format!("Top Stories status {}", body.status)));
        }

        let total = body.results.len();
        let articles: Vec<RawArticle> = body
            .results
            .into_iter()
            .map(|story| RawArticle {
                title: collapse_whitespace(&story.title),
                url: story.url.trim().to_string(),
                source: Source::NYT,
                published_at: parse_date(&story.published_date, now),
                description: strip_html(&story.summary),
            })
            .filter(|a| !a.title.is_empty() && !a.url.is_empty())
            .collect();
        if articles.len() < total {
            debug!(dropped = total - articles.len(), "Skipped stories without title or URL");
        }
        info!(
            count = articles.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched NYT top stories"
        );
        Ok(articles)
    }
}
