use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

use super::matcher::TextMatcher;
use super::partition::{Axis, WorkItem};
use super::scheduler::{catch_panic, WorkScheduler};
use crate::corpus::{Document, Pattern};
use crate::errors::{SearchError, SearchResult};
use crate::results::SearchResultSet;

/// Read-only state shared by every task of one search invocation
pub struct SearchContext {
    pub(crate) documents: Arc<[Document]>,
    pub(crate) patterns: Arc<[Pattern]>,
    pub(crate) matcher: Arc<dyn TextMatcher>,
    pub(crate) scheduler: Arc<WorkScheduler>,
    /// Whether each document's pattern list may be split further
    pub(crate) parallel_phrases: bool,
    pub(crate) phrase_min_split_size: usize,
}

impl SearchContext {
    pub fn new(
        documents: Arc<[Document]>,
        patterns: Arc<[Pattern]>,
        matcher: Arc<dyn TextMatcher>,
        scheduler: Arc<WorkScheduler>,
        parallel_phrases: bool,
        phrase_min_split_size: usize,
    ) -> Self {
        Self {
            documents,
            patterns,
            matcher,
            scheduler,
            parallel_phrases,
            phrase_min_split_size,
        }
    }

    /// Work item covering the whole document list against every pattern
    pub fn documents_item(&self, min_split_size: usize, parallel: bool) -> WorkItem {
        WorkItem::new(
            Axis::Documents,
            0..self.documents.len(),
            0..self.patterns.len(),
            min_split_size,
            parallel,
        )
    }

    /// Work item covering the whole pattern list for the documents in `documents`
    pub fn patterns_item(&self, documents: Range<usize>) -> WorkItem {
        WorkItem::new(
            Axis::Patterns,
            0..self.patterns.len(),
            documents,
            self.phrase_min_split_size,
            self.parallel_phrases,
        )
    }
}

/// Divide-and-conquer search over one [`WorkItem`].
///
/// A leaf searches its range sequentially. A larger item forks its left
/// half, computes its right half on the current worker, joins the left
/// half and returns `left ++ right`, so results always come back in input
/// order no matter which half finishes first. Documents that reach a leaf
/// hand their pattern list to a nested pattern-axis task, which splits the
/// same way when phrase parallelism is on.
pub struct RecursiveSearchTask;

impl RecursiveSearchTask {
    pub fn compute(ctx: &Arc<SearchContext>, item: WorkItem) -> SearchResult<Vec<SearchResultSet>> {
        if item.is_empty() {
            return Ok(Vec::new());
        }
        if item.is_leaf() {
            return Self::compute_leaf(ctx, &item);
        }

        let (left, right) = item.split();
        trace!(
            "Splitting {:?} {:?} into {:?} + {:?}",
            item.axis,
            item.range(),
            left.range(),
            right.range()
        );

        let forked = Arc::clone(ctx);
        let left_handle = ctx
            .scheduler
            .fork(move || RecursiveSearchTask::compute(&forked, left))?;
        let right_result = catch_panic(|| Self::compute(ctx, right));
        // Always settle the left half before reporting anything
        let left_result = ctx.scheduler.join(&left_handle);

        match (left_result, right_result) {
            (Ok(mut left), Ok(right)) => {
                left.extend(right);
                Ok(left)
            }
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    fn compute_leaf(ctx: &Arc<SearchContext>, item: &WorkItem) -> SearchResult<Vec<SearchResultSet>> {
        match item.axis {
            Axis::Documents => {
                let mut results = Vec::new();
                for document in item.range() {
                    let nested = ctx.patterns_item(document..document + 1);
                    results.extend(Self::compute(ctx, nested)?);
                }
                Ok(results)
            }
            Axis::Patterns => {
                ctx.scheduler.metrics().record_leaf();
                search_range(ctx, item.fixed.clone(), item.range())
            }
        }
    }
}

/// Sequential search of every document in `documents` for every pattern in
/// `patterns`, document-major, dropping pairs without matches
pub(crate) fn search_range(
    ctx: &SearchContext,
    documents: Range<usize>,
    patterns: Range<usize>,
) -> SearchResult<Vec<SearchResultSet>> {
    let mut results = Vec::new();
    for d in documents {
        let document = ctx.documents.get(d).ok_or_else(|| {
            SearchError::task_execution(
                format!("document #{}", d),
                SearchError::config_error("document index out of range"),
            )
        })?;
        for p in patterns.clone() {
            let pattern = ctx.patterns.get(p).ok_or_else(|| {
                SearchError::task_execution(
                    format!("pattern #{}", p),
                    SearchError::config_error("pattern index out of range"),
                )
            })?;
            let offsets = ctx
                .matcher
                .find_all(document.body(), pattern)
                .map_err(|e| {
                    SearchError::task_execution(
                        format!("\"{}\" in {}", pattern, document.title()),
                        e,
                    )
                })?;
            if !offsets.is_empty() {
                results.push(SearchResultSet::new(
                    d,
                    p,
                    pattern.clone(),
                    document.title(),
                    offsets,
                ));
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::matcher::SubstringMatcher;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(
        documents: Vec<Document>,
        patterns: &[&str],
        parallel_phrases: bool,
        phrase_min_split_size: usize,
        matcher: Arc<dyn TextMatcher>,
    ) -> Arc<SearchContext> {
        let scheduler = Arc::new(WorkScheduler::new(NonZeroUsize::new(4).unwrap()).unwrap());
        Arc::new(SearchContext::new(
            documents.into(),
            patterns.iter().map(|p| Pattern::from(*p)).collect(),
            matcher,
            scheduler,
            parallel_phrases,
            phrase_min_split_size,
        ))
    }

    /// Orders results the way a single sequential leaf would
    fn leaf_order(mut results: Vec<SearchResultSet>) -> Vec<SearchResultSet> {
        results.sort_by_key(|r| (r.document_index, r.pattern_index));
        results
    }

    fn corpus() -> Vec<Document> {
        (0..9)
            .map(|i| {
                Document::parse(&format!(
                    "Act {}\nthe king and the queen; the ghost {} walks the night",
                    i,
                    "o".repeat(i)
                ))
            })
            .collect()
    }

    #[test]
    fn test_empty_item_returns_nothing() {
        let ctx = context(corpus(), &["the"], true, 1, Arc::new(SubstringMatcher));
        let item = WorkItem::new(Axis::Documents, 3..3, 0..1, 1, true);
        assert!(RecursiveSearchTask::compute(&ctx, item).unwrap().is_empty());
        assert_eq!(ctx.scheduler.metrics().forks(), 0);
    }

    #[test]
    fn test_split_equals_single_leaf() {
        let patterns = ["the", "king", "queen", "ghost", "oooo", "night", "absent"];
        for min_split in 1..6 {
            let ctx = context(corpus(), &patterns, true, 1, Arc::new(SubstringMatcher));
            let split = RecursiveSearchTask::compute(&ctx, ctx.documents_item(min_split, true)).unwrap();
            let leaf = search_range(&ctx, 0..ctx.documents.len(), 0..ctx.patterns.len()).unwrap();
            assert_eq!(split, leaf, "min_split_size {}", min_split);
            assert_eq!(leaf_order(split.clone()), split);
        }
    }

    #[test]
    fn test_pattern_axis_at_top_level_matches_document_axis() {
        let patterns = ["the", "king", "oo", "walks"];
        let ctx = context(corpus(), &patterns, true, 1, Arc::new(SubstringMatcher));
        let by_docs = RecursiveSearchTask::compute(&ctx, ctx.documents_item(1, true)).unwrap();
        let by_patterns =
            RecursiveSearchTask::compute(&ctx, ctx.patterns_item(0..ctx.documents.len())).unwrap();
        assert_eq!(leaf_order(by_patterns), by_docs);
    }

    #[test]
    fn test_sequential_item_never_forks() {
        let ctx = context(corpus(), &["the", "king"], false, 1, Arc::new(SubstringMatcher));
        let results = RecursiveSearchTask::compute(&ctx, ctx.documents_item(1, false)).unwrap();
        assert_eq!(results.len(), 18);
        assert_eq!(ctx.scheduler.metrics().forks(), 0);
    }

    #[test]
    fn test_fan_out_is_one_fork_per_split() {
        let ctx = context(corpus(), &["the"], false, 1, Arc::new(SubstringMatcher));
        RecursiveSearchTask::compute(&ctx, ctx.documents_item(1, true)).unwrap();
        // A binary tree over 9 leaves has 8 internal nodes
        assert_eq!(ctx.scheduler.metrics().forks(), 8);
        assert_eq!(ctx.scheduler.metrics().leaves(), 9);
    }

    struct FailingMatcher {
        poison: &'static str,
        calls: AtomicUsize,
    }

    impl TextMatcher for FailingMatcher {
        fn find_all(&self, body: &str, pattern: &Pattern) -> SearchResult<Vec<usize>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if pattern.as_str() == self.poison {
                return Err(SearchError::invalid_pattern(pattern.as_str()));
            }
            SubstringMatcher.find_all(body, pattern)
        }
    }

    #[test]
    fn test_leaf_failure_propagates_after_siblings_settle() {
        let matcher = Arc::new(FailingMatcher {
            poison: "ghost",
            calls: AtomicUsize::new(0),
        });
        let ctx = context(corpus(), &["the", "ghost", "king"], true, 1, matcher.clone());
        let result = RecursiveSearchTask::compute(&ctx, ctx.documents_item(1, true));

        match result {
            Err(SearchError::TaskExecution { context, source }) => {
                assert!(context.starts_with("\"ghost\" in Act"));
                assert!(matches!(*source, SearchError::InvalidPattern(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Every forked subtree was joined before the error surfaced
        let stats = ctx.scheduler.metrics().get_stats();
        assert_eq!(stats.forks, stats.joins);
    }
}
