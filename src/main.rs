//! # Conflict News
//!
//! A batch pipeline that collects conflict-related news from several
//! providers, drops irrelevant and duplicate stories, rewrites headlines and
//! summaries through a language model, and writes one JSON file for a static
//! front end.
//!
//! ## Features
//!
//! - RSS/Atom feeds (Reuters, AP, BBC, Al Jazeera, France24) and keyed APIs
//!   (New York Times Top Stories, Guardian Content API)
//! - Keyword relevance filter with configurable conflict and domestic terms
//! - Cross-source deduplication with a fixed source priority for tie-breaks
//! - OpenAI-compatible summarization with timeout, one retry and a local
//!   fallback
//! - Reuse of earlier summaries for unchanged articles across runs
//!
//! ## Usage
//!
//! ```sh
//! LLM_API_KEY=... conflict_news -o site/conflict_news.json --report run.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: every provider concurrently, each under a timeout
//! 2. **Filtering**: keyword rules keep conflict coverage only
//! 3. **Deduping**: greedy title/slug clustering, one canonical per cluster
//! 4. **Summarizing**: model rewrite or fallback, reusing prior results
//! 5. **Writing**: atomic replacement of the output file
//!
//! The process exits non-zero only when nothing was fetched or the output
//! could not be written.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod dedup;
mod error;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod summarizer;
mod utils;

use api::{OpenAiChat, RetryModel};
use cli::Cli;
use config::Config;
use pipeline::Pipeline;
use sources::{ApiKeys, build_adapters};
use summarizer::Summarizer;
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("conflict_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Configuration: file, then flags ---
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(report) = &args.report {
        config.report_path = Some(report.clone());
    }
    if args.full_text {
        config.full_text = true;
    }

    // Early check: fail before any network work if the output can't be written
    if let Err(e) = ensure_writable_parent(&config.output_path).await {
        error!(
            path = %config.output_path.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let keys = ApiKeys {
        nyt: args.nyt_api_key.clone(),
        guardian: args.guardian_api_key.clone(),
    };
    let adapters = build_adapters(&client, &config, &keys);

    let model = match args.llm_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            let s = &config.summarizer;
            info!(model = %s.model, base_url = %s.base_url, "Summarization model configured");
            Some(RetryModel::new(
                OpenAiChat::new(client.clone(), &s.base_url, &s.model, key.to_string()),
                s.max_retries,
                s.retry_base_delay(),
                s.timeout(),
            ))
        }
        None => {
            warn!("LLM_API_KEY not set; every article will use the fallback summary");
            None
        }
    };
    let summarizer = Summarizer::new(model, &config.summarizer);

    let pipeline = Pipeline::new(config, client, adapters, summarizer)?;
    let report = pipeline.run(Utc::now()).await;

    info!(
        stage = %report.final_stage,
        published = report.published,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "conflict_news finished"
    );
    Ok(if report.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
