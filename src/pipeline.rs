//! Run orchestration.
//!
//! ```text
//! INIT → FETCHING → FILTERING → DEDUPING → SUMMARIZING → WRITING → DONE
//!            │                                              │
//!            └──────────── nothing fetched ─────────────────┴──→ FAILED
//! ```
//!
//! Each stage consumes the whole output of the previous one. The previous
//! snapshot is an explicit input: articles whose URL and source text are
//! unchanged reuse their earlier headline and summary, and recent articles
//! that were not refetched are carried over.
//!
//! A run fails only when no provider returned anything or the snapshot cannot
//! be written. In both cases the previous output file is left as it was.

use crate::api::LanguageModel;
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::ConfigError;
use crate::filter::RuleTable;
use crate::models::{ClassifiedArticle, NewsSnapshot, PublishedArticle, RawArticle, Source};
use crate::outputs::json;
use crate::sources::article_text::fetch_all_texts;
use crate::sources::{Adapter, fetch_all};
use crate::summarizer::{SummaryOutcome, Summarizer};
use crate::utils::content_hash;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Pages downloaded at once when full-text enrichment is on.
const FULL_TEXT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Fetching,
    Filtering,
    Deduping,
    Summarizing,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Fetching => "FETCHING",
            Stage::Filtering => "FILTERING",
            Stage::Deduping => "DEDUPING",
            Stage::Summarizing => "SUMMARIZING",
            Stage::Writing => "WRITING",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Counts collected over one run. Written to `report_path` when configured.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub final_stage: Stage,
    pub fetched: usize,
    pub per_source: BTreeMap<String, usize>,
    pub failed_sources: Vec<String>,
    pub relevant: usize,
    pub irrelevant: usize,
    pub clusters: usize,
    /// Articles with a model-written headline and summary this run.
    pub summarized: usize,
    /// Articles whose previous headline and summary were kept.
    pub reused: usize,
    pub fallbacks: usize,
    pub carried_over: usize,
    pub published: usize,
}

impl RunReport {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            final_stage: Stage::Init,
            fetched: 0,
            per_source: BTreeMap::new(),
            failed_sources: Vec::new(),
            relevant: 0,
            irrelevant: 0,
            clusters: 0,
            summarized: 0,
            reused: 0,
            fallbacks: 0,
            carried_over: 0,
            published: 0,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(from = %self.final_stage, to = %stage, "Stage transition");
        self.final_stage = stage;
    }

    pub fn failed(&self) -> bool {
        self.final_stage == Stage::Failed
    }
}

/// Output ordering: newest first, then source priority, then URL.
fn publish_order(a: &PublishedArticle, b: &PublishedArticle) -> std::cmp::Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
        .then_with(|| a.url.cmp(&b.url))
}

fn prior_as_raw(p: &PublishedArticle) -> RawArticle {
    RawArticle {
        title: p.original_title.clone(),
        url: p.url.clone(),
        source: p.source,
        published_at: p.published_at,
        description: String::new(),
    }
}

fn publish(article: &RawArticle, outcome: SummaryOutcome, hash: String) -> PublishedArticle {
    PublishedArticle {
        title: outcome.headline,
        original_title: article.title.clone(),
        summary: outcome.summary,
        source: article.source,
        url: article.url.clone(),
        published_at: article.published_at,
        content_hash: hash,
        fallback: outcome.fallback,
    }
}

pub struct Pipeline<M> {
    config: Config,
    client: reqwest::Client,
    adapters: Vec<Adapter>,
    rules: RuleTable,
    dedup: Deduplicator,
    summarizer: Summarizer<M>,
}

impl<M> Pipeline<M>
where
    M: LanguageModel,
{
    pub fn new(
        config: Config,
        client: reqwest::Client,
        adapters: Vec<Adapter>,
        summarizer: Summarizer<M>,
    ) -> Result<Self, ConfigError> {
        let rules = RuleTable::new(&config.rules)?;
        let dedup = Deduplicator::new(config.dedup.similarity_threshold);
        Ok(Self {
            config,
            client,
            adapters,
            rules,
            dedup,
            summarizer,
        })
    }

    /// Execute one full run and return its report. The report is also
    /// written to `report_path` when one is configured.
    #[instrument(level = "info", skip_all, fields(output = %self.config.output_path.display()))]
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport::new(now);

        report.enter(Stage::Fetching);
        let fetched = fetch_all(
            &self.adapters,
            self.config.fetch_timeout(),
            self.config.max_per_source,
            now,
        )
        .await;
        report.fetched = fetched.articles.len();
        report.per_source = fetched
            .per_source
            .iter()
            .map(|(source, n)| (source.to_string(), *n))
            .collect();
        report.failed_sources = fetched.failed.iter().map(Source::to_string).collect();

        if fetched.articles.is_empty() {
            error!(
                failed = report.failed_sources.len(),
                "No articles fetched from any provider; keeping previous snapshot"
            );
            report.enter(Stage::Failed);
            self.finish(&report, t0).await;
            return report;
        }

        let prior = json::read_prior(&self.config.output_path, now).await;
        let snapshot = self.build_snapshot(fetched.articles, &prior, now, &mut report).await;

        report.enter(Stage::Writing);
        match json::write_snapshot(&snapshot, &self.config.output_path).await {
            Ok(()) => {
                report.published = snapshot.articles.len();
                report.enter(Stage::Done);
            }
            Err(e) => {
                error!(error = %e, "Snapshot write failed");
                report.enter(Stage::Failed);
            }
        }
        self.finish(&report, t0).await;
        report
    }

    async fn finish(&self, report: &RunReport, t0: Instant) {
        if let Some(path) = &self.config.report_path {
            if let Err(e) = json::write_report(report, path).await {
                warn!(error = %e, "Failed to write run report");
            }
        }
        info!(
            stage = %report.final_stage,
            fetched = report.fetched,
            published = report.published,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Run finished"
        );
    }

    /// Filter, deduplicate and summarize `raw`, then merge with `prior`.
    ///
    /// Only the summarizer touches the network (and the page fetches when
    /// full-text enrichment is on); everything else is a function of the
    /// inputs and configuration.
    ///
    /// # Arguments
    ///
    /// * `raw` - Everything the providers returned this run
    /// * `prior` - The previous snapshot; its model-written entries are reused
    ///   when URL and source text are unchanged
    /// * `now` - Run start, for retention of carried-over entries
    /// * `report` - Receives stage transitions and per-stage counts
    ///
    /// # Returns
    ///
    /// The new snapshot, newest first and capped at `max_articles`.
    #[instrument(level = "info", skip_all, fields(raw = raw.len(), prior = prior.articles.len()))]
    pub async fn build_snapshot(
        &self,
        raw: Vec<RawArticle>,
        prior: &NewsSnapshot,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> NewsSnapshot {
        report.enter(Stage::Filtering);
        let (relevant, irrelevant): (Vec<ClassifiedArticle>, Vec<ClassifiedArticle>) = raw
            .iter()
            .map(|a| self.rules.classify(a))
            .partition(ClassifiedArticle::is_relevant);
        report.relevant = relevant.len();
        report.irrelevant = irrelevant.len();
        info!(
            relevant = report.relevant,
            irrelevant = report.irrelevant,
            domestic = irrelevant.iter().filter(|c| c.is_domestic).count(),
            "Filtered articles"
        );

        report.enter(Stage::Deduping);
        let clusters = self.dedup.cluster(relevant);
        report.clusters = clusters.len();
        for c in clusters.iter().filter(|c| c.len() > 1) {
            debug!(canonical = %c.canonical().article.url, members = c.len(), "Merged duplicates");
        }
        let canonicals: Vec<RawArticle> = clusters
            .into_iter()
            .map(|c| c.into_canonical().article)
            .collect();
        info!(clusters = canonicals.len(), "Clustered duplicates");

        report.enter(Stage::Summarizing);
        let mut articles: Vec<PublishedArticle> = Vec::with_capacity(canonicals.len());
        let mut pending: Vec<(RawArticle, String)> = Vec::new();
        for article in &canonicals {
            let hash = content_hash(&article.description);
            // Fallback text is never reused, so a recovered model gets another try.
            let reusable = prior
                .find(&article.url)
                .filter(|p| p.content_hash == hash && !p.fallback);
            match reusable {
                Some(previous) => {
                    let kept = SummaryOutcome {
                        headline: previous.title.clone(),
                        summary: previous.summary.clone(),
                        fallback: false,
                    };
                    articles.push(publish(article, kept, hash));
                    report.reused += 1;
                }
                None => pending.push((article.clone(), hash)),
            }
        }

        let enrich = self.config.full_text && self.summarizer.has_model();
        let contexts: Vec<Option<String>> = if enrich {
            let to_fetch: Vec<RawArticle> = pending.iter().map(|(a, _)| a.clone()).collect();
            fetch_all_texts(
                &self.client,
                &to_fetch,
                FULL_TEXT_CONCURRENCY,
                self.config.page_timeout(),
            )
            .await
        } else {
            vec![None; pending.len()]
        };
        let items: Vec<(RawArticle, Option<String>)> = pending
            .iter()
            .map(|(a, _)| a.clone())
            .zip(contexts)
            .collect();
        let outcomes = self.summarizer.summarize_all(&items).await;
        for ((article, hash), outcome) in pending.into_iter().zip(outcomes) {
            if outcome.fallback {
                report.fallbacks += 1;
            } else {
                report.summarized += 1;
            }
            articles.push(publish(&article, outcome, hash));
        }
        info!(
            summarized = report.summarized,
            reused = report.reused,
            fallbacks = report.fallbacks,
            "Summarized articles"
        );

        let fresh_urls: HashSet<&str> = canonicals.iter().map(|a| a.url.as_str()).collect();
        let retention = ChronoDuration::hours(self.config.retention_hours);
        let carried: Vec<PublishedArticle> = prior
            .articles
            .iter()
            .filter(|p| !fresh_urls.contains(p.url.as_str()))
            .filter(|p| now.signed_duration_since(p.published_at) <= retention)
            .filter(|p| {
                let old = prior_as_raw(p);
                !canonicals.iter().any(|c| self.dedup.is_duplicate(c, &old))
            })
            .cloned()
            .collect();
        report.carried_over = carried.len();
        articles.extend(carried);

        articles.sort_by(publish_order);
        articles.truncate(self.config.max_articles);
        NewsSnapshot {
            generated_at: now,
            articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RetryModel;
    use crate::config::FeedConfig;
    use crate::error::ModelError;
    use chrono::TimeZone;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Deterministic model: prefixes the title and counts calls.
    struct Stub {
        calls: AtomicUsize,
    }

    impl LanguageModel for Stub {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let title = user.lines().next().unwrap_or("").trim_start_matches("Title: ");
            let reply = serde_json::json!({
                "headline": format!("Rewritten: {title}"),
                "summary": "Model summary.",
            });
            Ok(reply.to_string())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn raw(source: Source, title: &str, url: &str, hour: u32, description: &str) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            url: url.to_string(),
            source,
            published_at: Utc.with_ymd_and_hms(2025, 5, 6, hour, 0, 0).unwrap(),
            description: description.to_string(),
        }
    }

    fn config(output: &Path) -> Config {
        let mut config = Config {
            output_path: output.to_path_buf(),
            feeds: Vec::new(),
            ..Config::default()
        };
        config.summarizer.min_interval_ms = 0;
        config
    }

    fn pipeline(config: Config, adapters: Vec<Adapter>, with_model: bool) -> Pipeline<Stub> {
        let model = with_model.then(|| {
            RetryModel::new(
                Stub {
                    calls: AtomicUsize::new(0),
                },
                1,
                Duration::from_millis(1),
                Duration::from_secs(1),
            )
            .with_max_jitter(Duration::ZERO)
        });
        let summarizer = Summarizer::new(model, &config.summarizer);
        Pipeline::new(config, reqwest::Client::new(), adapters, summarizer).unwrap()
    }

    fn model_calls(p: &Pipeline<Stub>) -> usize {
        p.summarizer
            .model()
            .map(|m| m.inner().calls.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_duplicate_live_variant_publishes_bbc_once() {
        let dir = tempdir().unwrap();
        let p = pipeline(config(&dir.path().join("out.json")), Vec::new(), true);
        let mut report = RunReport::new(now());
        let snapshot = p
            .build_snapshot(
                vec![
                    raw(
                        Source::France24,
                        "Ceasefire talks collapse in region X — live",
                        "https://www.france24.com/en/live/2025/ceasefire-talks-collapse-region-x",
                        9,
                        "Live coverage as ceasefire talks collapse.",
                    ),
                    raw(
                        Source::BBC,
                        "Ceasefire talks collapse in region X",
                        "https://www.bbc.co.uk/news/ceasefire-talks-collapse-region-x",
                        10,
                        "Negotiations ended without agreement.",
                    ),
                ],
                &NewsSnapshot::empty(now()),
                now(),
                &mut report,
            )
            .await;

        assert_eq!(report.clusters, 1);
        assert_eq!(snapshot.articles.len(), 1);
        let a = &snapshot.articles[0];
        assert_eq!(a.source, Source::BBC);
        assert_eq!(a.original_title, "Ceasefire talks collapse in region X");
        assert_eq!(a.title, "Rewritten: Ceasefire talks collapse in region X");
        assert_eq!(a.content_hash, content_hash("Negotiations ended without agreement."));
        assert_eq!(model_calls(&p), 1);
    }

    #[tokio::test]
    async fn test_local_budget_story_is_excluded() {
        let dir = tempdir().unwrap();
        let p = pipeline(config(&dir.path().join("out.json")), Vec::new(), true);
        let mut report = RunReport::new(now());
        let snapshot = p
            .build_snapshot(
                vec![raw(
                    Source::AP,
                    "Local city council approves new budget",
                    "https://apnews.com/article/city-council-budget",
                    8,
                    "",
                )],
                &NewsSnapshot::empty(now()),
                now(),
                &mut report,
            )
            .await;
        assert!(snapshot.articles.is_empty());
        assert_eq!(report.irrelevant, 1);
        assert_eq!(model_calls(&p), 0);
    }

    #[tokio::test]
    async fn test_unchanged_prior_articles_are_not_resummarized() {
        let dir = tempdir().unwrap();
        let p = pipeline(config(&dir.path().join("out.json")), Vec::new(), true);
        let article = raw(
            Source::Reuters,
            "Airstrikes hit capital overnight",
            "https://reuters.example/world/airstrikes-hit-capital",
            7,
            "Explosions were heard across the city.",
        );
        let prior = NewsSnapshot {
            generated_at: now(),
            articles: vec![PublishedArticle {
                title: "Capital struck from the air".to_string(),
                original_title: article.title.clone(),
                summary: "Earlier summary.".to_string(),
                source: Source::Reuters,
                url: article.url.clone(),
                published_at: article.published_at,
                content_hash: content_hash(&article.description),
                fallback: false,
            }],
        };

        let mut report = RunReport::new(now());
        let snapshot = p.build_snapshot(vec![article.clone()], &prior, now(), &mut report).await;
        assert_eq!(report.reused, 1);
        assert_eq!(model_calls(&p), 0);
        assert_eq!(snapshot.articles[0].summary, "Earlier summary.");

        // A changed body is summarized again.
        let mut changed = article;
        changed.description = "Updated: dozens wounded.".to_string();
        let mut report = RunReport::new(now());
        let snapshot = p.build_snapshot(vec![changed], &prior, now(), &mut report).await;
        assert_eq!(report.reused, 0);
        assert_eq!(model_calls(&p), 1);
        assert_eq!(snapshot.articles[0].summary, "Model summary.");
    }

    #[tokio::test]
    async fn test_prior_fallback_is_resummarized_once_model_is_back() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let article = raw(
            Source::Reuters,
            "Airstrikes hit capital overnight",
            "https://reuters.example/world/airstrikes-hit-capital",
            7,
            "Explosions were heard across the city.",
        );

        // First run without a model publishes the fallback.
        let offline = pipeline(config(&output), Vec::new(), false);
        let mut report = RunReport::new(now());
        let first = offline
            .build_snapshot(vec![article.clone()], &NewsSnapshot::empty(now()), now(), &mut report)
            .await;
        assert_eq!(report.fallbacks, 1);
        assert!(first.articles[0].fallback);
        json::write_snapshot(&first, &output).await.unwrap();

        // The marker survives the file, and the next run asks the model.
        let prior = json::read_prior(&output, now()).await;
        assert!(prior.articles[0].fallback);
        let online = pipeline(config(&output), Vec::new(), true);
        let mut report = RunReport::new(now());
        let second = online
            .build_snapshot(vec![article], &prior, now(), &mut report)
            .await;
        assert_eq!(model_calls(&online), 1);
        assert_eq!(report.reused, 0);
        assert_eq!(report.summarized, 1);
        assert_eq!(second.articles[0].title, "Rewritten: Airstrikes hit capital overnight");
        assert!(!second.articles[0].fallback);
    }

    #[tokio::test]
    async fn test_carry_over_respects_retention_and_duplicates() {
        let dir = tempdir().unwrap();
        let p = pipeline(config(&dir.path().join("out.json")), Vec::new(), false);
        let prior_article = |title: &str, url: &str, age_hours: i64| PublishedArticle {
            title: title.to_string(),
            original_title: title.to_string(),
            summary: "s".to_string(),
            source: Source::BBC,
            url: url.to_string(),
            published_at: now() - ChronoDuration::hours(age_hours),
            content_hash: String::new(),
            fallback: false,
        };
        let prior = NewsSnapshot {
            generated_at: now(),
            articles: vec![
                prior_article(
                    "Rebels seize airport",
                    "https://bbc.example/rebels-seize-airport",
                    5,
                ),
                prior_article(
                    "Militia clashes in north",
                    "https://bbc.example/militia-clashes",
                    72,
                ),
                prior_article(
                    "Hostage exchange agreed by parties",
                    "https://bbc.example/hostages-1",
                    3,
                ),
            ],
        };
        let mut report = RunReport::new(now());
        let snapshot = p
            .build_snapshot(
                vec![raw(
                    Source::AP,
                    "Hostage exchange agreed by parties",
                    "https://apnews.com/hostage-exchange",
                    11,
                    "",
                )],
                &prior,
                now(),
                &mut report,
            )
            .await;

        assert_eq!(report.carried_over, 1);
        assert_eq!(report.fallbacks, 1);
        let urls: Vec<&str> = snapshot.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://apnews.com/hostage-exchange",
                "https://bbc.example/rebels-seize-airport"
            ]
        );
    }

    #[tokio::test]
    async fn test_ordering_and_truncation() {
        let dir = tempdir().unwrap();
        let mut cfg = config(&dir.path().join("out.json"));
        cfg.max_articles = 2;
        let p = pipeline(cfg, Vec::new(), false);
        let mut report = RunReport::new(now());
        let snapshot = p
            .build_snapshot(
                vec![
                    raw(
                        Source::France24,
                        "Troops mass at border",
                        "https://f24.example/troops-mass-border",
                        10,
                        "",
                    ),
                    raw(
                        Source::Reuters,
                        "Missile strike on depot",
                        "https://reuters.example/missile-strike-depot",
                        10,
                        "",
                    ),
                    raw(
                        Source::AP,
                        "Refugees flee shelling",
                        "https://ap.example/refugees-flee-shelling",
                        6,
                        "",
                    ),
                ],
                &NewsSnapshot::empty(now()),
                now(),
                &mut report,
            )
            .await;
        let sources: Vec<Source> = snapshot.articles.iter().map(|a| a.source).collect();
        assert_eq!(sources, vec![Source::Reuters, Source::France24]);
    }

    #[tokio::test]
    async fn test_nothing_fetched_fails_and_keeps_previous_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<rss version="2.0"><channel></channel></rss>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down.xml"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        std::fs::write(&output, "[\"previous\"]").unwrap();
        let mut cfg = config(&output);
        cfg.report_path = Some(dir.path().join("report.json"));
        cfg.feeds = vec![
            FeedConfig {
                source: Source::BBC,
                url: format!("{}/empty.xml", server.uri()),
            },
            FeedConfig {
                source: Source::Reuters,
                url: format!("{}/down.xml", server.uri()),
            },
        ];
        let client = reqwest::Client::new();
        let adapters = crate::sources::build_adapters(&client, &cfg, &Default::default());
        let p = pipeline(cfg, adapters, true);

        let report = p.run(now()).await;
        assert!(report.failed());
        assert_eq!(report.fetched, 0);
        assert_eq!(report.failed_sources, vec!["Reuters"]);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "[\"previous\"]");

        let report_text = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        let written: serde_json::Value = serde_json::from_str(&report_text).unwrap();
        assert_eq!(written["final_stage"], "FAILED");
    }

    #[tokio::test]
    async fn test_full_run_writes_snapshot() {
        let server = MockServer::start().await;
        let rss = r#"<rss version="2.0"><channel>
<item><title>Shelling intensifies near the front line</title>
<link>https://bbc.example/news/shelling-intensifies-front</link>
<description>Artillery fire continued overnight.</description>
<pubDate>Tue, 06 May 2025 09:30:00 GMT</pubDate></item>
<item><title>Local city council approves new budget</title>
<link>https://bbc.example/news/council-budget</link>
<pubDate>Tue, 06 May 2025 08:00:00 GMT</pubDate></item>
</channel></rss>"#;
        Mock::given(method("GET"))
            .and(path("/bbc.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("site/conflict_news.json");
        let mut cfg = config(&output);
        cfg.feeds = vec![FeedConfig {
            source: Source::BBC,
            url: format!("{}/bbc.xml", server.uri()),
        }];
        let client = reqwest::Client::new();
        let adapters = crate::sources::build_adapters(&client, &cfg, &Default::default());
        let p = pipeline(cfg, adapters, true);

        let report = p.run(now()).await;
        assert_eq!(report.final_stage, Stage::Done);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.relevant, 1);
        assert_eq!(report.irrelevant, 1);
        assert_eq!(report.published, 1);

        let written: Vec<PublishedArticle> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].title, "Rewritten: Shelling intensifies near the front line");

        // A second run over the same feed reuses everything.
        let report = p.run(now()).await;
        assert_eq!(report.reused, 1);
        assert_eq!(model_calls(&p), 1);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Summarizing.to_string(), "SUMMARIZING");
        assert_eq!(serde_json::to_value(Stage::Done).unwrap(), "DONE");
    }
}
