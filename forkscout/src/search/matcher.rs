use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::corpus::Pattern;
use crate::errors::{SearchError, SearchResult};

/// Finds every occurrence of one pattern in one document body.
///
/// Implementations scan left to right and report non-overlapping matches:
/// after a match at `i` the scan resumes at the end of that match. They are
/// shared by every worker of a search, so they take `&self` and must not
/// hold per-call state. An empty pattern matches nowhere.
pub trait TextMatcher: Send + Sync {
    fn find_all(&self, body: &str, pattern: &Pattern) -> SearchResult<Vec<usize>>;
}

/// How phrases are matched against document bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact, case-sensitive substring search
    #[default]
    Literal,
    /// Case-insensitive search where whitespace in the phrase matches any
    /// run of whitespace, so phrases may wrap across lines
    Phrase,
}

impl MatchMode {
    /// A fresh matcher; any compiled state lives only as long as it does
    pub fn matcher(self) -> Arc<dyn TextMatcher> {
        match self {
            MatchMode::Literal => Arc::new(SubstringMatcher),
            MatchMode::Phrase => Arc::new(PhraseMatcher::new()),
        }
    }
}

/// Plain substring search
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl TextMatcher for SubstringMatcher {
    fn find_all(&self, body: &str, pattern: &Pattern) -> SearchResult<Vec<usize>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        Ok(body
            .match_indices(pattern.as_str())
            .map(|(start, _)| start)
            .collect())
    }
}

/// Whitespace-tolerant, case-insensitive phrase search.
///
/// Each phrase is compiled once per matcher and shared by every worker
/// through a concurrent cache that is dropped together with the matcher.
#[derive(Debug, Default)]
pub struct PhraseMatcher {
    cache: DashMap<String, Arc<Regex>>,
}

impl PhraseMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct phrases compiled so far
    pub fn cached_phrases(&self) -> usize {
        self.cache.len()
    }

    fn compile(&self, phrase: &str) -> SearchResult<Option<Arc<Regex>>> {
        let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
        if words.is_empty() {
            return Ok(None);
        }

        if let Some(entry) = self.cache.get(phrase) {
            return Ok(Some(entry.clone()));
        }

        let regex = RegexBuilder::new(&words.join(r"\s+"))
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::invalid_pattern(format!("{}: {}", phrase, e)))?;
        let regex = Arc::new(regex);
        self.cache.insert(phrase.to_string(), regex.clone());
        Ok(Some(regex))
    }
}

impl TextMatcher for PhraseMatcher {
    fn find_all(&self, body: &str, pattern: &Pattern) -> SearchResult<Vec<usize>> {
        match self.compile(pattern.as_str())? {
            Some(regex) => Ok(regex.find_iter(body).map(|m| m.start()).collect()),
            None => Ok(Vec::new()),
        }
    }
}
