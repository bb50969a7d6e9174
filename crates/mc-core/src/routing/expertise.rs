//! Keyword-based expertise classifier for unclaimed tasks

use std::collections::{BTreeMap, BTreeSet};

/// Keyword → candidate agent keys, plus the fallback key.
///
/// Keywords are matched as case-folded substrings, so stems such as "faktur"
/// cover every inflection.
#[derive(Debug, Clone)]
pub struct ExpertiseTable {
    entries: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl ExpertiseTable {
    /// Build from a keyword → agent keys mapping
    pub fn new<I, K, V>(entries: I, fallback: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(keyword, agents)| {
                (
                    keyword.into().to_lowercase(),
                    agents.into_iter().map(|a| a.into().to_lowercase()).collect(),
                )
            })
            .filter(|(keyword, _): &(String, Vec<String>)| !keyword.is_empty())
            .collect();

        Self {
            entries,
            fallback: fallback.into().to_lowercase(),
        }
    }

    /// Build from an agent key → keywords mapping (the configuration shape)
    pub fn from_agent_keywords(map: &BTreeMap<String, Vec<String>>, fallback: impl Into<String>) -> Self {
        let mut by_keyword: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (agent, keywords) in map {
            for keyword in keywords {
                let candidates = by_keyword.entry(keyword.to_lowercase()).or_default();
                if !candidates.contains(agent) {
                    candidates.push(agent.clone());
                }
            }
        }
        Self::new(by_keyword, fallback)
    }

    /// Stock keyword table, keyed by agent
    pub fn default_keywords() -> BTreeMap<String, Vec<String>> {
        let table: [(&str, &[&str]); 6] = [
            (
                "ksiegowy",
                &["vat", "faktur", "podatek", "invoice", "płatność", "us ", "upomnienie", "rozliczeni"],
            ),
            (
                "marketing",
                &["seo", "marketing", "blog", "content", "social", "kampani", "launch", "pseo", "gsc"],
            ),
            ("investor", &["btc", "crypto", "stock", "market", "portfolio", "polymarket"]),
            ("bestia", &["trening", "dieta", "health", "workout", "sen"]),
            ("assistant", &["kalendarz", "reminder", "spotkani", "email", "monitor"]),
            ("main", &["fix", "bug", "deploy", "api", "architekt", "audit", "infra"]),
        ];

        table
            .into_iter()
            .map(|(agent, keywords)| {
                (
                    agent.to_string(),
                    keywords.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidate agent keys for `text`; never empty
    pub fn classify(&self, text: &str) -> BTreeSet<String> {
        let folded = text.to_lowercase();

        let mut candidates: BTreeSet<String> = self
            .entries
            .iter()
            .filter(|(keyword, _)| folded.contains(keyword.as_str()))
            .flat_map(|(_, agents)| agents.iter().cloned())
            .collect();

        if candidates.is_empty() {
            candidates.insert(self.fallback.clone());
        }
        candidates
    }
}

impl Default for ExpertiseTable {
    fn default() -> Self {
        Self::from_agent_keywords(&Self::default_keywords(), "main")
    }
}
