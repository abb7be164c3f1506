//! Data models for articles as they move through the pipeline.
//!
//! - [`RawArticle`]: normalized output of a source adapter
//! - [`ClassifiedArticle`]: a raw article plus relevance flags
//! - [`ArticleCluster`]: articles judged to report the same event
//! - [`PublishedArticle`]: the unit written to the output file
//! - [`NewsSnapshot`]: everything published by one run
//!
//! Each stage consumes the previous stage's values and never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A news provider.
///
/// The declaration order is the source priority used to break ties between
/// duplicates: wire services first, then newspapers, then broadcasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    Reuters,
    AP,
    BBC,
    NYT,
    Guardian,
    #[serde(rename = "Al Jazeera", alias = "AlJazeera")]
    AlJazeera,
    France24,
}

impl Source {
    /// Rank in the fixed source priority order; 0 is the most preferred.
    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Source::Reuters => "Reuters",
            Source::AP => "AP",
            Source::BBC => "BBC",
            Source::NYT => "NYT",
            Source::Guardian => "Guardian",
            Source::AlJazeera => "Al Jazeera",
            Source::France24 => "France24",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An article as delivered by a source adapter.
///
/// Adapters guarantee that `title` and `url` are non-blank.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub title: String,
    /// Unique per source.
    pub url: String,
    pub source: Source,
    pub published_at: DateTime<Utc>,
    /// Feed description or API abstract, HTML stripped. May be empty.
    pub description: String,
}

/// A raw article with the relevance filter's verdict attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedArticle {
    pub article: RawArticle,
    pub is_conflict: bool,
    pub is_domestic: bool,
    /// Names of the conflict categories whose terms matched.
    pub matched_categories: Vec<String>,
}

impl ClassifiedArticle {
    /// Whether the article proceeds past the filter stage.
    pub fn is_relevant(&self) -> bool {
        self.is_conflict && !self.is_domestic
    }
}

/// Articles judged to describe the same event, with one canonical member.
#[derive(Debug, Clone)]
pub struct ArticleCluster {
    pub members: Vec<ClassifiedArticle>,
    pub canonical: usize,
}

impl ArticleCluster {
    pub fn canonical(&self) -> &ClassifiedArticle {
        &self.members[self.canonical]
    }

    pub fn into_canonical(mut self) -> ClassifiedArticle {
        self.members.swap_remove(self.canonical)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}

/// One entry of the output file.
///
/// Field names and their order are read by the front end and by the next
/// run; keep them stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedArticle {
    /// Paraphrased headline.
    pub title: String,
    pub original_title: String,
    pub summary: String,
    pub source: Source,
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// SHA-256 of the source description this summary was produced from.
    #[serde(default)]
    pub content_hash: String,
    /// Headline and summary are the local fallback, not model output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// The complete output of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<PublishedArticle>,
}

impl NewsSnapshot {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            articles: Vec::new(),
        }
    }

    pub fn find(&self, url: &str) -> Option<&PublishedArticle> {
        self.articles.iter().find(|a| a.url == url)
    }
}
