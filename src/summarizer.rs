//! Headline paraphrasing and summarization.
//!
//! Each canonical article is sent to the language model with a fixed
//! instruction asking for an objective, fact-focused rewrite. Any failure
//! (timeout, quota, malformed output, no model configured) yields the
//! deterministic fallback instead: the original title and a truncated excerpt
//! of the description. Summarization never fails a run.

use crate::api::{LanguageModel, RetryModel};
use crate::config::SummarizerConfig;
use crate::error::ModelError;
use crate::models::RawArticle;
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

/// System instruction sent with every request.
pub const INSTRUCTION: &str = "You are an editor for a neutral conflict news tracker. \
Rewrite the headline in your own words and write a summary of at most three sentences. \
Be objective and fact-focused. Do not editorialize, speculate, or add facts that are not in the text. \
Respond only with a JSON object of the form {\"headline\": \"...\", \"summary\": \"...\"}.";

/// Upper bound on the article text sent as context.
const MAX_CONTEXT_CHARS: usize = 6000;

#[derive(Debug, Deserialize)]
struct ModelSummary {
    headline: String,
    summary: String,
}

/// Result of summarizing one article.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub headline: String,
    pub summary: String,
    /// True when the fallback was used instead of model output.
    pub fallback: bool,
}

/// Strip an optional Markdown code fence around a JSON reply.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Validate a model reply and extract `(headline, summary)`.
pub fn parse_reply(text: &str) -> Result<(String, String), ModelError> {
    let parsed: ModelSummary = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        if looks_truncated(&e) {
            ModelError::Malformed(format!("truncated reply: {}", truncate_for_log(text, 120)))
        } else {
            ModelError::Malformed(format!("{e}: {}", truncate_for_log(text, 120)))
        }
    })?;
    let headline = parsed.headline.trim().to_string();
    let summary = parsed.summary.trim().to_string();
    if headline.is_empty() || summary.is_empty() {
        return Err(ModelError::Malformed("empty headline or summary".to_string()));
    }
    Ok((headline, summary))
}

/// Build the per-article user message.
fn user_prompt(article: &RawArticle, context: Option<&str>) -> String {
    let body = context
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(&article.description);
    format!(
        "Title: {}\nSource: {}\nPublished: {}\n\n{}",
        article.title,
        article.source,
        article.published_at.to_rfc3339(),
        truncate_chars(body, MAX_CONTEXT_CHARS)
    )
}

/// Calls the model for each article, spacing request starts and bounding
/// concurrency, and substitutes the fallback on any failure.
pub struct Summarizer<M> {
    model: Option<RetryModel<M>>,
    fallback_chars: usize,
    min_interval: Duration,
    concurrency: usize,
}

impl<M> Summarizer<M>
where
    M: LanguageModel,
{
    /// `model` is `None` when no credentials are configured; every article
    /// then takes the fallback path.
    pub fn new(model: Option<RetryModel<M>>, config: &SummarizerConfig) -> Self {
        Self {
            model,
            fallback_chars: config.fallback_chars,
            min_interval: config.min_interval(),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    #[cfg(test)]
    pub fn model(&self) -> Option<&RetryModel<M>> {
        self.model.as_ref()
    }

    /// Deterministic local substitute for a model reply.
    pub fn fallback(&self, article: &RawArticle) -> SummaryOutcome {
        let source_text = if article.description.trim().is_empty() {
            &article.title
        } else {
            &article.description
        };
        SummaryOutcome {
            headline: article.title.clone(),
            summary: truncate_chars(source_text, self.fallback_chars),
            fallback: true,
        }
    }

    /// Summarize one article. `context` replaces the description as model
    /// input when present (full article text).
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub async fn summarize(&self, article: &RawArticle, context: Option<&str>) -> SummaryOutcome {
        let Some(model) = &self.model else {
            return self.fallback(article);
        };
        let prompt = user_prompt(article, context);
        match model.complete_parsed(INSTRUCTION, &prompt, parse_reply).await {
            Ok((headline, summary)) => {
                debug!("Model summary accepted");
                SummaryOutcome {
                    headline,
                    summary,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(url = %article.url, error = %e, "Summarization failed; using fallback");
                self.fallback(article)
            }
        }
    }

    /// Summarize a batch, returning outcomes in input order.
    ///
    /// Request `i` starts no earlier than `i * min_interval` after the batch
    /// begins, and at most `concurrency` requests are in flight.
    #[instrument(level = "info", skip_all, fields(count = items.len()))]
    pub async fn summarize_all(
        &self,
        items: &[(RawArticle, Option<String>)],
    ) -> Vec<SummaryOutcome> {
        if self.model.is_none() {
            info!("No language model configured; using fallback summaries");
            return items.iter().map(|(a, _)| self.fallback(a)).collect();
        }
        let t0 = Instant::now();
        let interval = self.min_interval;
        stream::iter(items.iter().enumerate())
            .map(|(i, (article, context))| async move {
                sleep_until(t0 + interval * i as u32).await;
                self.summarize(article, context.as_deref()).await
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct Echo;

    impl LanguageModel for Echo {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ModelError> {
            let title = user.lines().next().unwrap_or("").trim_start_matches("Title: ");
            Ok(serde_json::json!({
                "headline": format!("Paraphrased: {title}"),
                "summary": "Officials reported the event.",
            })
            .to_string())
        }
    }

    struct Down;

    impl LanguageModel for Down {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ModelError> {
            Err(ModelError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    impl LanguageModel for Recorder {
        async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError> {
            assert_eq!(system, INSTRUCTION);
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(r#"{"headline": "h", "summary": "s"}"#.to_string())
        }
    }

    fn config(min_interval_ms: u64) -> SummarizerConfig {
        SummarizerConfig {
            min_interval_ms,
            fallback_chars: 40,
            ..SummarizerConfig::default()
        }
    }

    fn wrap<M: LanguageModel>(model: M) -> Option<RetryModel<M>> {
        Some(
            RetryModel::new(model, 1, Duration::from_millis(1), Duration::from_secs(1))
                .with_max_jitter(Duration::ZERO),
        )
    }

    fn article(title: &str, description: &str) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            url: format!("https://example.com/{}", title.len()),
            source: Source::AP,
            published_at: Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_parse_reply_plain_and_fenced() {
        let plain = r#"{"headline": " Truce holds ", "summary": "Fighting paused."}"#;
        assert_eq!(
            parse_reply(plain).unwrap(),
            ("Truce holds".to_string(), "Fighting paused.".to_string())
        );
        let fenced = "```json\n{\"headline\": \"a\", \"summary\": \"b\"}\n```";
        assert_eq!(parse_reply(fenced).unwrap(), ("a".to_string(), "b".to_string()));
    }

    #[test]
    fn test_parse_reply_rejects_bad_output() {
        assert!(parse_reply("Sure! Here is the summary").is_err());
        assert!(parse_reply(r#"{"headline": "a", "summary": "   "}"#).is_err());
        match parse_reply(r#"{"headline": "a", "summ"#) {
            Err(ModelError::Malformed(msg)) => assert!(msg.starts_with("truncated reply")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_output_used() {
        let s = Summarizer::new(wrap(Echo), &config(0));
        let out = s.summarize(&article("Troops withdraw", "Long body."), None).await;
        assert!(!out.fallback);
        assert_eq!(out.headline, "Paraphrased: Troops withdraw");
        assert_eq!(out.summary, "Officials reported the event.");
    }

    #[tokio::test]
    async fn test_fallback_on_model_failure() {
        let s = Summarizer::new(wrap(Down), &config(0));
        let a = article(
            "Shelling resumes near the border",
            "Residents reported heavy shelling overnight as talks stalled in the capital.",
        );
        let out = s.summarize(&a, None).await;
        assert!(out.fallback);
        assert_eq!(out.headline, a.title);
        assert!(!out.summary.is_empty());
        assert!(a.description.starts_with(out.summary.trim_end_matches('…')));
    }

    #[tokio::test]
    async fn test_fallback_without_model_uses_title_when_no_body() {
        let s: Summarizer<Down> = Summarizer::new(None, &config(0));
        assert!(!s.has_model());
        let a = article("Hostages released in Sahel", "");
        let outs = s.summarize_all(&[(a.clone(), None)]).await;
        assert_eq!(outs.len(), 1);
        assert!(outs[0].fallback);
        assert_eq!(outs[0].headline, a.title);
        assert_eq!(outs[0].summary, a.title);
    }

    #[tokio::test]
    async fn test_context_replaces_description() {
        let recorder = Recorder {
            prompts: Mutex::new(Vec::new()),
        };
        let s = Summarizer::new(wrap(recorder), &config(0));
        let a = article("Siege of city enters third month", "short feed text");
        s.summarize(&a, Some("full article paragraphs")).await;
        s.summarize(&a, None).await;
        let prompts = model_prompts(s.model().unwrap());
        assert!(prompts[0].contains("full article paragraphs"));
        assert!(!prompts[0].contains("short feed text"));
        assert!(prompts[1].contains("short feed text"));
        assert!(prompts[0].starts_with("Title: Siege of city enters third month\nSource: AP\n"));
    }

    fn model_prompts(model: &RetryModel<Recorder>) -> Vec<String> {
        model.inner().prompts.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_spacing() {
        let s = Summarizer::new(wrap(Echo), &config(30));
        let items: Vec<(RawArticle, Option<String>)> = ["first", "second story", "third story here"]
            .iter()
            .map(|t| (article(t, "body"), None))
            .collect();
        let started = Instant::now();
        let outs = s.summarize_all(&items).await;
        assert!(started.elapsed() >= Duration::from_millis(60));
        let headlines: Vec<&str> = outs.iter().map(|o| o.headline.as_str()).collect();
        assert_eq!(
            headlines,
            vec![
                "Paraphrased: first",
                "Paraphrased: second story",
                "Paraphrased: third story here"
            ]
        );
    }
}
