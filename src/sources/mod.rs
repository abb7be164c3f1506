//! Source adapters and the concurrent fetch stage.
//!
//! # Supported Sources
//!
//! | Source     | Module         | Method               | Notes                         |
//! |------------|----------------|----------------------|-------------------------------|
//! | Reuters    | [`feed`]       | RSS (openrss mirror) |                               |
//! | AP         | [`feed`]       | RSS (openrss mirror) |                               |
//! | BBC        | [`feed`]       | RSS                  |                               |
//! | Al Jazeera | [`feed`]       | RSS                  |                               |
//! | France24   | [`feed`]       | RSS                  |                               |
//! | NYT        | [`nyt`]        | Top Stories API      | Needs `NYT_API_KEY`           |
//! | Guardian   | [`guardian`]   | Content API search   | Needs `GUARDIAN_API_KEY`      |
//!
//! Every adapter runs concurrently under the same timeout. A provider that
//! errors or times out contributes nothing and is recorded as failed; it
//! never fails the run.

pub mod article_text;
pub mod feed;
pub mod guardian;
pub mod nyt;

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::{RawArticle, Source};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

pub use feed::FeedAdapter;
pub use guardian::GuardianAdapter;
pub use nyt::NytAdapter;

/// Credentials for the keyed providers. A missing key disables the provider.
#[derive(Default, Clone)]
pub struct ApiKeys {
    pub nyt: Option<String>,
    pub guardian: Option<String>,
}

/// One configured provider.
#[derive(Debug)]
pub enum Adapter {
    Feed(FeedAdapter),
    Nyt(NytAdapter),
    Guardian(GuardianAdapter),
}

impl Adapter {
    pub fn source(&self) -> Source {
        match self {
            Adapter::Feed(a) => a.source(),
            Adapter::Nyt(_) => Source::NYT,
            Adapter::Guardian(_) => Source::Guardian,
        }
    }

    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<RawArticle>, ProviderError> {
        match self {
            Adapter::Feed(a) => a.fetch(now).await,
            Adapter::Nyt(a) => a.fetch(now).await,
            Adapter::Guardian(a) => a.fetch(now).await,
        }
    }
}

fn usable_key(key: Option<&String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// Build the adapter list from configuration. Keyed providers without a key
/// are skipped with a warning.
pub fn build_adapters(client: &reqwest::Client, config: &Config, keys: &ApiKeys) -> Vec<Adapter> {
    let mut adapters: Vec<Adapter> = config
        .feeds
        .iter()
        .map(|f| Adapter::Feed(FeedAdapter::new(client.clone(), f.source, &f.url)))
        .collect();

    match usable_key(keys.nyt.as_ref()) {
        Some(key) => adapters.push(Adapter::Nyt(NytAdapter::new(
            client.clone(),
            config.nyt.clone(),
            key,
        ))),
        None => warn!(source = %Source::NYT, "NYT_API_KEY not set; provider disabled"),
    }
    match usable_key(keys.guardian.as_ref()) {
        Some(key) => adapters.push(Adapter::Guardian(GuardianAdapter::new(
            client.clone(),
            config.guardian.clone(),
            key,
        ))),
        None => warn!(source = %Source::Guardian, "GUARDIAN_API_KEY not set; provider disabled"),
    }

    info!(count = adapters.len(), "Configured source adapters");
    adapters
}

/// Merged output of the fetch stage.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// In source priority order, then provider order.
    pub articles: Vec<RawArticle>,
    /// Articles kept per provider after boundary checks.
    pub per_source: BTreeMap<Source, usize>,
    /// Providers that errored or timed out.
    pub failed: Vec<Source>,
}

/// Drop entries without a title or URL, repeated URLs, and anything beyond
/// `max_per_source`.
fn sanitize(articles: Vec<RawArticle>, max_per_source: usize) -> Vec<RawArticle> {
    let mut seen = HashSet::new();
    let total = articles.len();
    let kept: Vec<RawArticle> = articles
        .into_iter()
        .filter(|a| !a.title.trim().is_empty() && !a.url.trim().is_empty())
        .filter(|a| seen.insert(a.url.clone()))
        .take(max_per_source)
        .collect();
    if kept.len() < total {
        debug!(dropped = total - kept.len(), "Dropped unusable or excess entries");
    }
    kept
}

/// Run every adapter concurrently, each under `limit`, and merge the results.
///
/// # Arguments
///
/// * `adapters` - Configured providers, in any order
/// * `limit` - Timeout applied to each provider's whole fetch
/// * `max_per_source` - Cap on entries kept from a single provider
/// * `now` - Run start, used for entries without a usable date
///
/// # Returns
///
/// A [`FetchOutcome`] whose articles are grouped by source priority. A
/// provider that errors or times out contributes nothing and is listed in
/// `failed`; this function itself never fails.
#[instrument(level = "info", skip_all, fields(adapters = adapters.len()))]
pub async fn fetch_all(
    adapters: &[Adapter],
    limit: Duration,
    max_per_source: usize,
    now: DateTime<Utc>,
) -> FetchOutcome {
    let results = join_all(adapters.iter().map(|adapter| async move {
        let source = adapter.source();
        let result = match timeout(limit, adapter.fetch(now)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(limit)),
        };
        (source, result)
    }))
    .await;

    let mut outcome = FetchOutcome::default();
    let mut batches: Vec<(Source, Vec<RawArticle>)> = Vec::with_capacity(results.len());
    for (source, result) in results {
        match result {
            Ok(articles) => {
                let articles = sanitize(articles, max_per_source);
                *outcome.per_source.entry(source).or_default() += articles.len();
                batches.push((source, articles));
            }
            Err(e) => {
                warn!(%source, error = %e, "Provider failed; continuing without it");
                outcome.per_source.entry(source).or_default();
                if !outcome.failed.contains(&source) {
                    outcome.failed.push(source);
                }
            }
        }
    }

    // Stable: providers of equal priority keep their configured order.
    batches.sort_by_key(|(source, _)| source.priority());
    let mut seen = HashSet::new();
    for (source, articles) in batches {
        outcome
            .articles
            .extend(articles.into_iter().filter(|a| seen.insert((source, a.url.clone()))));
    }
    outcome.failed.sort();

    info!(
        fetched = outcome.articles.len(),
        failed = outcome.failed.len(),
        "Fetch stage complete"
    );
    outcome
}
