//! Command-line interface.
//!
//! Flags override the matching configuration file values. Credentials are
//! read from the environment so they never appear in shell history.

use clap::Parser;
use std::fmt;
use std::path::PathBuf;

/// Collect, filter, deduplicate and summarize conflict news into one JSON file.
///
/// # Examples
///
/// ```sh
/// # Defaults: built-in feeds, ./conflict_news.json
/// conflict_news
///
/// # Custom config, output location and run report
/// conflict_news -c config.yaml -o site/conflict_news.json --report run.json
///
/// # Use article page text as summarization context
/// LLM_API_KEY=... conflict_news --full-text
/// ```
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output JSON file (also read as the previous snapshot)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Download article pages and summarize from their full text
    #[arg(long)]
    pub full_text: bool,

    /// New York Times API key
    #[arg(long, env = "NYT_API_KEY", hide_env_values = true)]
    pub nyt_api_key: Option<String>,

    /// Guardian Content API key
    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    pub guardian_api_key: Option<String>,

    /// Key for the OpenAI-compatible summarization endpoint
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Cli")
            .field("config", &self.config)
            .field("output", &self.output)
            .field("report", &self.report)
            .field("full_text", &self.full_text)
            .field("nyt_api_key", &set(&self.nyt_api_key))
            .field("guardian_api_key", &set(&self.guardian_api_key))
            .field("llm_api_key", &set(&self.llm_api_key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "conflict_news",
            "--config",
            "config.yaml",
            "--output",
            "./site/news.json",
            "--report",
            "run.json",
            "--full-text",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("config.yaml")));
        assert_eq!(cli.output, Some(PathBuf::from("./site/news.json")));
        assert_eq!(cli.report, Some(PathBuf::from("run.json")));
        assert!(cli.full_text);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["conflict_news", "-c", "/etc/news.yaml", "-o", "/tmp/out.json"]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/news.yaml")));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out.json")));
        assert!(!cli.full_text);
    }

    #[test]
    fn test_debug_hides_keys() {
        let cli = Cli::parse_from(["conflict_news", "--llm-api-key", "sk-secret"]);
        let shown = format!("{cli:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<set>"));
    }
}
