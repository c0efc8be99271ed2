/// Search result types and the aggregator that turns per-partition output
/// into the final report.
///
/// Leaves produce [`SearchResultSet`] values, one per (document, pattern)
/// pair that matched at least once. Sets travel up the task tree by value:
/// each split concatenates `left ++ right`, so by the time the root task
/// returns, the sets are already in input order. [`ResultAggregator`] still
/// re-establishes that order from the indices each set carries, which keeps
/// the report independent of how the tree was cut.
///
/// ```rust,ignore
/// let report = ResultAggregator::merge(sets);
/// for entry in report.entries() {
///     println!("{} in {}: {:?}", entry.pattern, entry.title, entry.offsets);
/// }
/// ```
use serde::Serialize;
use std::fmt;

use crate::corpus::Pattern;
use crate::errors::SearchResult;

/// A single occurrence of a pattern in a document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub pattern: Pattern,
    pub title: String,
    /// Byte offset within the document body
    pub offset: usize,
}

/// All offsets of one pattern inside one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResultSet {
    /// Position of the document in the caller's input
    pub document_index: usize,
    /// Position of the pattern in the caller's input
    pub pattern_index: usize,
    pub pattern: Pattern,
    pub title: String,
    /// Ordered, non-overlapping match offsets
    pub offsets: Vec<usize>,
}

impl SearchResultSet {
    pub fn new(
        document_index: usize,
        pattern_index: usize,
        pattern: Pattern,
        title: impl Into<String>,
        offsets: Vec<usize>,
    ) -> Self {
        Self {
            document_index,
            pattern_index,
            pattern,
            title: title.into(),
            offsets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Expands the set into individual match records
    pub fn records(&self) -> impl Iterator<Item = MatchRecord> + '_ {
        self.offsets.iter().map(move |&offset| MatchRecord {
            pattern: self.pattern.clone(),
            title: self.title.clone(),
            offset,
        })
    }

    fn key(&self) -> (usize, usize) {
        (self.document_index, self.pattern_index)
    }
}

impl fmt::Display for SearchResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offsets: Vec<String> = self.offsets.iter().map(|o| o.to_string()).collect();
        write!(f, "\"{}\" at [{}]", self.pattern, offsets.join("|"))
    }
}

/// The final, merged result of one search invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Non-empty sets ordered by document, then pattern
    entries: Vec<SearchResultSet>,
    /// Total number of offsets across all entries
    pub total_matches: usize,
    /// Number of distinct documents with at least one match
    pub documents_with_matches: usize,
    /// Number of distinct patterns with at least one match
    pub patterns_with_matches: usize,
}

impl SearchReport {
    /// Creates a new empty report
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SearchResultSet] {
        &self.entries
    }

    /// Pretty-printed JSON of the whole report
    pub fn to_json(&self) -> SearchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Flattened `(pattern, title, offsets)` view in report order
    pub fn tuples(&self) -> Vec<(&str, &str, &[usize])> {
        self.entries
            .iter()
            .map(|e| (e.pattern.as_str(), e.title.as_str(), e.offsets.as_slice()))
            .collect()
    }

    /// Every individual match in report order
    pub fn records(&self) -> Vec<MatchRecord> {
        self.entries.iter().flat_map(|e| e.records()).collect()
    }

    /// Entries grouped by document, in document input order
    pub fn by_document(&self) -> Vec<(&str, Vec<&SearchResultSet>)> {
        let mut groups: Vec<(usize, &str, Vec<&SearchResultSet>)> = Vec::new();
        for entry in &self.entries {
            match groups.last_mut() {
                Some((index, _, sets)) if *index == entry.document_index => sets.push(entry),
                _ => groups.push((entry.document_index, entry.title.as_str(), vec![entry])),
            }
        }
        groups
            .into_iter()
            .map(|(_, title, sets)| (title, sets))
            .collect()
    }

    /// Entries grouped by pattern, in pattern input order; documents keep
    /// their input order inside each group
    pub fn by_pattern(&self) -> Vec<(&Pattern, Vec<&SearchResultSet>)> {
        let mut sorted: Vec<&SearchResultSet> = self.entries.iter().collect();
        sorted.sort_by_key(|e| (e.pattern_index, e.document_index));

        let mut groups: Vec<(usize, &Pattern, Vec<&SearchResultSet>)> = Vec::new();
        for entry in sorted {
            match groups.last_mut() {
                Some((index, _, sets)) if *index == entry.pattern_index => sets.push(entry),
                _ => groups.push((entry.pattern_index, &entry.pattern, vec![entry])),
            }
        }
        groups
            .into_iter()
            .map(|(_, pattern, sets)| (pattern, sets))
            .collect()
    }

    fn push(&mut self, entry: SearchResultSet) {
        let new_document = self
            .entries
            .last()
            .map_or(true, |last| last.document_index != entry.document_index);
        if new_document {
            self.documents_with_matches += 1;
        }
        self.total_matches += entry.len();
        self.entries.push(entry);
    }
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, sets) in self.by_document() {
            writeln!(f, "{}", title)?;
            for set in sets {
                writeln!(f, "  {}", set)?;
            }
        }
        Ok(())
    }
}

/// Merges per-partition result lists into a [`SearchReport`].
///
/// Runs strictly after every contributing task has joined, on the calling
/// thread, so it needs no synchronization.
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn merge(mut sets: Vec<SearchResultSet>) -> SearchReport {
        sets.retain(|s| !s.is_empty());
        sets.sort_by_key(SearchResultSet::key);

        let mut merged: Vec<SearchResultSet> = Vec::with_capacity(sets.len());
        for set in sets {
            match merged.last_mut() {
                Some(last) if last.key() == set.key() => {
                    last.offsets.extend(set.offsets);
                    last.offsets.sort_unstable();
                    last.offsets.dedup();
                }
                _ => merged.push(set),
            }
        }

        let mut patterns_seen: Vec<usize> = merged.iter().map(|s| s.pattern_index).collect();
        patterns_seen.sort_unstable();
        patterns_seen.dedup();

        let mut report = SearchReport::new();
        report.patterns_with_matches = patterns_seen.len();
        for set in merged {
            report.push(set);
        }
        report
    }
}
