//! Keyword relevance filter.
//!
//! Classification is driven by a [`RuleTable`]: an ordered list of conflict
//! categories, each with its match terms, plus a separate list of US-domestic
//! indicators. Terms match case-insensitively on word boundaries against the
//! title and description. A conflict match always wins over a domestic match.

use crate::config::{CategoryRule, RulesConfig};
use crate::error::ConfigError;
use crate::models::{ClassifiedArticle, RawArticle};
use regex::Regex;

const MILITARY: &[&str] = &[
    "military",
    "army",
    "troops",
    "soldier",
    "soldiers",
    "airstrike",
    "airstrikes",
    "air strike",
    "air strikes",
    "missile",
    "missiles",
    "drone strike",
    "drone attack",
    "shelling",
    "artillery",
    "bombing",
    "bombardment",
    "invasion",
    "offensive",
    "warplanes",
];

const WAR: &[&str] = &[
    "war",
    "wars",
    "warfare",
    "ceasefire",
    "cease-fire",
    "truce",
    "hostilities",
    "front line",
    "frontline",
    "armed conflict",
    "peace talks",
];

const CASUALTIES: &[&str] = &[
    "casualties",
    "death toll",
    "killed",
    "wounded",
    "fatalities",
    "massacre",
    "civilian deaths",
];

const POLITICAL_VIOLENCE: &[&str] = &[
    "insurgent",
    "insurgents",
    "insurgency",
    "militant",
    "militants",
    "militia",
    "militias",
    "rebel",
    "rebels",
    "coup",
    "terrorist",
    "terror attack",
    "armed group",
    "gunmen",
    "hostage",
    "hostages",
    "clashes",
    "uprising",
];

const HUMANITARIAN: &[&str] = &[
    "refugees",
    "displaced",
    "siege",
    "blockade",
    "humanitarian crisis",
    "war crimes",
    "genocide",
];

const DOMESTIC: &[&str] = &[
    "city council",
    "county",
    "mayor",
    "governor",
    "state senate",
    "state legislature",
    "school board",
    "sheriff",
    "police department",
    "congress",
    "congressional",
    "house of representatives",
    "senate",
    "supreme court",
    "white house",
    "democrats",
    "republicans",
    "gop",
    "medicare",
    "medicaid",
    "irs",
    "federal reserve",
];

/// The built-in rule set, used when the configuration does not provide one.
pub fn default_rules() -> RulesConfig {
    let category = |name: &str, terms: &[&str]| CategoryRule {
        name: name.to_string(),
        terms: terms.iter().map(|t| t.to_string()).collect(),
    };
    RulesConfig {
        conflict: vec![
            category("military", MILITARY),
            category("war", WAR),
            category("casualties", CASUALTIES),
            category("political_violence", POLITICAL_VIOLENCE),
            category("humanitarian", HUMANITARIAN),
        ],
        domestic: DOMESTIC.iter().map(|t| t.to_string()).collect(),
    }
}

/// Compile a term list into one case-insensitive, word-bounded alternation.
/// Returns `None` when the list has no usable terms.
fn compile_terms(field: &'static str, terms: &[String]) -> Result<Option<Regex>, ConfigError> {
    let alternatives: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            field,
            reason: e.to_string(),
        })
}

#[derive(Debug)]
struct Category {
    name: String,
    matcher: Regex,
}

/// Compiled keyword rules.
#[derive(Debug)]
pub struct RuleTable {
    categories: Vec<Category>,
    domestic: Option<Regex>,
}

impl RuleTable {
    pub fn new(rules: &RulesConfig) -> Result<Self, ConfigError> {
        let mut categories = Vec::with_capacity(rules.conflict.len());
        for rule in &rules.conflict {
            if let Some(matcher) = compile_terms("rules.conflict", &rule.terms)? {
                categories.push(Category {
                    name: rule.name.clone(),
                    matcher,
                });
            }
        }
        let domestic = compile_terms("rules.domestic", &rules.domestic)?;
        Ok(Self {
            categories,
            domestic,
        })
    }

    /// Names of the conflict categories that match `text`, in table order.
    pub fn conflict_matches(&self, text: &str) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.matcher.is_match(text))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn domestic_match(&self, text: &str) -> bool {
        self.domestic.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Classify one article. Never fails; no match means "not conflict".
    ///
    /// # Arguments
    ///
    /// * `article` - Title and description are matched; the description may
    ///   be empty, in which case only the title counts
    ///
    /// # Returns
    ///
    /// The article with its flags and the names of every matched conflict
    /// category. A conflict match wins over a domestic one.
    pub fn classify(&self, article: &RawArticle) -> ClassifiedArticle {
        let text = if article.description.trim().is_empty() {
            article.title.clone()
        } else {
            format!("{}\n{}", article.title, article.description)
        };
        let matched_categories = self.conflict_matches(&text);
        let is_conflict = !matched_categories.is_empty();
        let is_domestic = !is_conflict && self.domestic_match(&text);
        ClassifiedArticle {
            article: article.clone(),
            is_conflict,
            is_domestic,
            matched_categories,
        }
    }
}
