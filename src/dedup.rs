//! Cross-source deduplication.
//!
//! Two articles are duplicates when their normalized titles are similar
//! enough (Jaccard index of word sets, stop words removed) or when their URLs
//! end in the same slug. Clustering is a single greedy pass: each article
//! joins the first cluster whose representative it duplicates, or starts a
//! new one. Clusters are never merged afterwards.
//!
//! The canonical member of a cluster is picked by source priority, then
//! earliest publication time, then lexical URL order, so identical input
//! always yields the same choice.

use crate::models::{ArticleCluster, ClassifiedArticle, RawArticle};
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use url::Url;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in",
        "into", "is", "it", "its", "of", "on", "or", "over", "says", "that", "the", "to", "was",
        "were", "will", "with", "after", "amid", "new",
    ]
    .into_iter()
    .collect()
});

/// Minimum number of words a URL slug needs before it is trusted as an
/// identity signal. Short slugs ("index", "world") collide across stories.
const MIN_SLUG_TOKENS: usize = 3;

/// Case-fold a title, strip punctuation and stop words, and return its set of
/// remaining words.
pub fn normalize_title(title: &str) -> BTreeSet<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(*w))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two word sets. Two empty sets are not similar.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Words of the last path segment of `url`, without file extension or
/// numeric ids. `None` when the URL does not parse or the slug is too short
/// to identify a story.
pub fn url_slug(url: &str) -> Option<Vec<String>> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?
        .to_lowercase();
    let stem = match segment.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            stem.to_string()
        }
        _ => segment.clone(),
    };
    let tokens: Vec<String> = stem
        .split(['-', '_'])
        .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect();
    (tokens.len() >= MIN_SLUG_TOKENS).then_some(tokens)
}

/// Precomputed comparison keys for one article.
#[derive(Debug, Clone)]
struct Fingerprint {
    words: BTreeSet<String>,
    slug: Option<Vec<String>>,
}

impl Fingerprint {
    fn of(article: &RawArticle) -> Self {
        Self {
            words: normalize_title(&article.title),
            slug: url_slug(&article.url),
        }
    }
}

/// Canonical ordering: source priority, then earliest publish time, then URL.
pub fn canonical_order(a: &RawArticle, b: &RawArticle) -> Ordering {
    a.source
        .priority()
        .cmp(&b.source.priority())
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.url.cmp(&b.url))
}

/// Index of the canonical member of a non-empty member list.
pub fn select_canonical(members: &[ClassifiedArticle]) -> usize {
    members
        .iter()
        .position_min_by(|a, b| canonical_order(&a.article, &b.article))
        .unwrap_or(0)
}

/// Greedy title/slug clustering with a configurable similarity threshold.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f64,
}

impl Deduplicator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    fn matches(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        if let (Some(sa), Some(sb)) = (&a.slug, &b.slug) {
            if sa == sb {
                return true;
            }
        }
        jaccard(&a.words, &b.words) >= self.threshold
    }

    /// Whether two articles would be placed in the same cluster.
    pub fn is_duplicate(&self, a: &RawArticle, b: &RawArticle) -> bool {
        self.matches(&Fingerprint::of(a), &Fingerprint::of(b))
    }

    /// Partition `articles` into clusters, preserving first-seen order.
    pub fn cluster(&self, articles: Vec<ClassifiedArticle>) -> Vec<ArticleCluster> {
        let mut representatives: Vec<Fingerprint> = Vec::new();
        let mut groups: Vec<Vec<ClassifiedArticle>> = Vec::new();

        for article in articles {
            let fp = Fingerprint::of(&article.article);
            match representatives.iter().position(|rep| self.matches(rep, &fp)) {
                Some(idx) => {
                    debug!(
                        url = %article.article.url,
                        joined = %groups[idx][0].article.url,
                        "Duplicate article"
                    );
                    groups[idx].push(article);
                }
                None => {
                    representatives.push(fp);
                    groups.push(vec![article]);
                }
            }
        }

        groups
            .into_iter()
            .map(|members| {
                let canonical = select_canonical(&members);
                ArticleCluster { members, canonical }
            })
            .collect()
    }
}
