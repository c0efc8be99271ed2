use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::matcher::{MatchMode, TextMatcher};
use super::partition::PartitionPolicy;
use super::scheduler::{catch_panic, WorkScheduler};
use super::task::{RecursiveSearchTask, SearchContext};
use crate::config::EncodingMode;
use crate::corpus::{self, Document, Pattern};
use crate::errors::SearchResult;
use crate::filters::CorpusFilter;
use crate::metrics::SchedulerMetrics;
use crate::results::{ResultAggregator, SearchReport};

/// Knobs for one search, passed explicitly instead of living in globals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Split the document list across workers
    pub parallel_input: bool,
    /// Split each document's pattern list across workers
    pub parallel_phrases: bool,
    /// Document-axis leaf size; defaults to half the document count
    pub min_split_size: Option<NonZeroUsize>,
    /// Pattern-axis leaf size; defaults to half the pattern count
    pub phrase_min_split_size: Option<NonZeroUsize>,
    /// Worker pool size
    pub thread_count: NonZeroUsize,
    pub match_mode: MatchMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            parallel_input: true,
            parallel_phrases: true,
            min_split_size: None,
            phrase_min_split_size: None,
            thread_count: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
            match_mode: MatchMode::default(),
        }
    }
}

impl SearchOptions {
    pub fn parallel() -> Self {
        Self::default()
    }

    pub fn sequential() -> Self {
        Self::default().with_parallel(false)
    }

    /// Turns splitting on or off for both axes
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel_input = parallel;
        self.parallel_phrases = parallel;
        self
    }

    pub fn with_min_split_size(mut self, size: usize) -> Self {
        self.min_split_size = NonZeroUsize::new(size);
        self
    }

    pub fn with_phrase_min_split_size(mut self, size: usize) -> Self {
        self.phrase_min_split_size = NonZeroUsize::new(size);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.thread_count = NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    fn is_parallel(&self) -> bool {
        self.parallel_input || self.parallel_phrases
    }
}

/// A reusable search engine owning one worker pool.
///
/// The pool is created with the searcher and is closed when the searcher is
/// dropped. Every `search` call builds its own matcher, so compiled phrases
/// do not outlive the call; only the cumulative [`SchedulerMetrics`] carry
/// over from one call to the next.
pub struct Searcher {
    options: SearchOptions,
    custom_matcher: Option<Arc<dyn TextMatcher>>,
    scheduler: Arc<WorkScheduler>,
}

impl Searcher {
    pub fn new(options: SearchOptions) -> SearchResult<Self> {
        let scheduler = Arc::new(WorkScheduler::new(options.thread_count)?);
        Ok(Self {
            options,
            custom_matcher: None,
            scheduler,
        })
    }

    /// Uses a custom matcher instead of the one `match_mode` selects
    pub fn with_matcher(options: SearchOptions, matcher: Arc<dyn TextMatcher>) -> SearchResult<Self> {
        let mut searcher = Self::new(options)?;
        searcher.custom_matcher = Some(matcher);
        Ok(searcher)
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        self.scheduler.metrics()
    }

    pub fn scheduler(&self) -> &Arc<WorkScheduler> {
        &self.scheduler
    }

    /// Loads a corpus, walking directories with one forked task per
    /// subdirectory when the document axis is parallel
    pub fn load_documents(
        &self,
        inputs: &[PathBuf],
        separator: &str,
        filter: &CorpusFilter,
        encoding_mode: EncodingMode,
    ) -> SearchResult<Vec<Document>> {
        if self.options.parallel_input {
            corpus::load_documents_parallel(inputs, separator, filter, encoding_mode, &self.scheduler)
        } else {
            corpus::load_documents(inputs, separator, filter, encoding_mode)
        }
    }

    /// Searches every document for every pattern.
    ///
    /// Returns the complete report, or the first failure in input order once
    /// every forked subtree has settled; partial results are never returned.
    /// The documents are copied into shared storage; use
    /// [`search_shared`](Self::search_shared) to hand over an existing one.
    pub fn search(&self, documents: &[Document], patterns: &[Pattern]) -> SearchResult<SearchReport> {
        self.search_shared(Arc::from(documents), patterns)
    }

    /// Like [`search`](Self::search), on a corpus the caller already shares.
    ///
    /// A pattern is identified by its text: repeats after the first
    /// occurrence are dropped, and `pattern_index` in the report counts
    /// distinct patterns in first-occurrence order.
    pub fn search_shared(
        &self,
        documents: Arc<[Document]>,
        patterns: &[Pattern],
    ) -> SearchResult<SearchReport> {
        let patterns = distinct_patterns(patterns);
        info!(
            "Starting {} search of {} documents for {} patterns",
            if self.options.is_parallel() {
                "parallel"
            } else {
                "sequential"
            },
            documents.len(),
            patterns.len()
        );

        if documents.is_empty() || patterns.is_empty() {
            debug!("Nothing to search, returning empty report");
            return Ok(SearchReport::new());
        }

        let matcher = match &self.custom_matcher {
            Some(matcher) => matcher.clone(),
            None => self.options.match_mode.matcher(),
        };
        let document_count = documents.len();
        let phrase_min_split_size =
            PartitionPolicy::min_split_size(patterns.len(), self.options.phrase_min_split_size);
        let ctx = Arc::new(SearchContext::new(
            documents,
            patterns,
            matcher,
            self.scheduler.clone(),
            self.options.parallel_phrases,
            phrase_min_split_size,
        ));
        let root = ctx.documents_item(
            PartitionPolicy::min_split_size(document_count, self.options.min_split_size),
            self.options.parallel_input,
        );
        debug!(
            "Document leaf size {}, pattern leaf size {}",
            root.min_split_size, ctx.phrase_min_split_size
        );

        let task_ctx = ctx.clone();
        let sets = self
            .scheduler
            .install(move || catch_panic(|| RecursiveSearchTask::compute(&task_ctx, root)))
            .map_err(|e| {
                warn!("Search failed: {}", e);
                e
            })?;

        let report = ResultAggregator::merge(sets);
        self.metrics().log_stats();
        info!(
            "Search complete. Found {} matches in {} documents",
            report.total_matches, report.documents_with_matches
        );
        Ok(report)
    }
}

impl Drop for Searcher {
    fn drop(&mut self) {
        self.scheduler.close();
    }
}

/// Keeps the first occurrence of each pattern text, in input order
fn distinct_patterns(patterns: &[Pattern]) -> Arc<[Pattern]> {
    let mut seen = HashSet::with_capacity(patterns.len());
    let distinct: Vec<Pattern> = patterns
        .iter()
        .filter(|&pattern| seen.insert(pattern.as_str()))
        .cloned()
        .collect();
    if distinct.len() < patterns.len() {
        debug!("Dropped {} repeated patterns", patterns.len() - distinct.len());
    }
    distinct.into()
}

/// One-shot search with a pool that lives only for this call
pub fn search(
    documents: &[Document],
    patterns: &[Pattern],
    options: &SearchOptions,
) -> SearchResult<SearchReport> {
    Searcher::new(options.clone())?.search(documents, patterns)
}
