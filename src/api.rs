//! Language model access with timeout and bounded retry.
//!
//! # Architecture
//!
//! - [`LanguageModel`]: the narrow interface the summarizer depends on
//! - [`OpenAiChat`]: an OpenAI-compatible `/chat/completions` client
//! - [`RetryModel`]: decorator adding a per-call timeout and exponential
//!   backoff with jitter around any [`LanguageModel`]
//!
//! # Retry Strategy
//!
//! - At most `max_retries` retries after the first attempt (one by default)
//! - Backoff doubles from `base_delay`, capped at 30 seconds
//! - Random jitter (0-250ms) added to each wait
//! - A timed-out attempt counts as a failed attempt

use crate::error::ModelError;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, instrument, warn};

/// A text-in, text-out language model.
///
/// Implementors receive a fixed system instruction and the per-article user
/// content, and return the raw completion text.
pub trait LanguageModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError>;
}

/// Wrapper that adds a per-attempt timeout and exponential backoff retry to
/// any [`LanguageModel`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
pub struct RetryModel<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
    call_timeout: Duration,
}

impl<T> RetryModel<T>
where
    T: LanguageModel,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration, call_timeout: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
            call_timeout,
        }
    }

    #[cfg(test)]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter: u64 = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        delay + Duration::from_millis(jitter)
    }
}

impl<T> fmt::Debug for RetryModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryModel")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl<T> RetryModel<T>
where
    T: LanguageModel,
{
    /// Call the model and validate its output with `parse`, retrying with
    /// backoff when either the call or the validation fails.
    ///
    /// A rejected response counts as a failed attempt, so the retry bound
    /// covers transport errors, timeouts and malformed output alike.
    #[instrument(level = "debug", skip_all)]
    pub async fn complete_parsed<R, F>(
        &self,
        system: &str,
        user: &str,
        parse: F,
    ) -> Result<R, ModelError>
    where
        F: Fn(&str) -> Result<R, ModelError>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let result = match timeout(self.call_timeout, self.inner.complete(system, user)).await {
                Ok(res) => res.and_then(|text| parse(&text)),
                Err(_) => Err(ModelError::Timeout(self.call_timeout)),
            };
            match result {
                Ok(resp) => return Ok(resp),
                Err(e @ ModelError::Unavailable(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> LanguageModel for RetryModel<T>
where
    T: LanguageModel,
{
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError> {
        self.complete_parsed(system, user, |text| Ok(text.to_string())).await
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

impl LanguageModel for OpenAiChat {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ModelError::Unavailable(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                status = status.as_u16(),
                "Model call rejected"
            );
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: crate::utils::truncate_for_log(&body, 300),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ModelError::Malformed("response has no message content".to_string()))
    }
}
