/// Recursive fork-join search.
///
/// The search space is the cross product of a document list and a pattern
/// list. The root [`WorkItem`] covers every document; each split forks the
/// left half onto the [`WorkScheduler`] and keeps working on the right half
/// in the current worker, which bounds outstanding forks to the depth of the
/// tree. Once a document range is small enough it is handed to a nested
/// pattern-axis task that splits the pattern list in the same way, and the
/// pattern-axis leaves finally run the [`TextMatcher`].
///
/// ```rust,ignore
/// let searcher = Searcher::new(SearchOptions::parallel().with_threads(4))?;
/// let report = searcher.search(&documents, &patterns)?;
/// ```
///
/// # Joining without starving the pool
///
/// Every task both forks and joins from inside the pool. A worker blocked in
/// `join` would eventually leave no thread to run the forked halves, so a
/// joining worker keeps pulling queued jobs until its own result arrives.
/// With that rule the search completes even on a one-thread pool.
///
/// # Ordering
///
/// Completion order is whatever the pool makes of it. Output order is not:
/// every split returns `left ++ right`, and [`ResultAggregator`] sorts by
/// input position before building the report, so a parallel run and a
/// sequential run produce identical reports.
///
/// [`ResultAggregator`]: crate::results::ResultAggregator
pub mod engine;
pub mod matcher;
pub mod partition;
pub mod scheduler;
pub mod task;

pub use engine::{search, SearchOptions, Searcher};
pub use matcher::{MatchMode, PhraseMatcher, SubstringMatcher, TextMatcher};
pub use partition::{Axis, PartitionPolicy, WorkItem};
pub use scheduler::{catch_panic, TaskHandle, WorkScheduler};
pub use task::{RecursiveSearchTask, SearchContext};
