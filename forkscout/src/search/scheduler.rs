use rayon::{ThreadPool, ThreadPoolBuilder, Yield};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

use crate::errors::{SearchError, SearchResult};
use crate::metrics::SchedulerMetrics;

// How long an idle joining worker parks before looking for work again
const IDLE_PARK: Duration = Duration::from_micros(200);

enum SlotState<T> {
    Pending,
    Ready(SearchResult<T>),
    Taken,
}

/// Write-once, take-once cell shared by a forked job and its handle
struct ResultSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> ResultSlot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // Jobs run under catch_unwind, so a poisoned lock still holds a valid state
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fill(&self, result: SearchResult<T>) {
        let mut state = self.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Ready(result);
            self.ready.notify_all();
        }
    }

    fn take(state: &mut SlotState<T>) -> Option<SearchResult<T>> {
        match std::mem::replace(state, SlotState::Taken) {
            SlotState::Pending => {
                *state = SlotState::Pending;
                None
            }
            SlotState::Ready(result) => Some(result),
            SlotState::Taken => Some(Err(SearchError::AlreadyJoined)),
        }
    }

    /// Takes the result if it is there; waits up to `timeout` (forever when
    /// `None`) for a pending one
    fn wait(&self, timeout: Option<Duration>) -> Option<SearchResult<T>> {
        let mut state = self.lock();
        match timeout {
            None => {
                while matches!(*state, SlotState::Pending) {
                    state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
                }
            }
            Some(timeout) if matches!(*state, SlotState::Pending) => {
                state = self
                    .ready
                    .wait_timeout(state, timeout)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
            }
            Some(_) => {}
        }
        Self::take(&mut state)
    }

    fn is_pending(&self) -> bool {
        matches!(*self.lock(), SlotState::Pending)
    }
}

/// Producer side of a slot. Dropping it unfilled (the job never ran)
/// settles the slot with an error so no joiner waits forever.
struct SlotWriter<T>(Arc<ResultSlot<T>>);

impl<T> SlotWriter<T> {
    fn fill(self, result: SearchResult<T>) {
        self.0.fill(result);
    }
}

impl<T> Drop for SlotWriter<T> {
    fn drop(&mut self) {
        self.0.fill(Err(SearchError::scheduler_exhausted(
            "job was dropped before it ran",
        )));
    }
}

/// Handle to a forked job.
///
/// The result moves out to the first [`WorkScheduler::join`]; joining the
/// same handle again returns [`SearchError::AlreadyJoined`].
pub struct TaskHandle<T> {
    slot: Arc<ResultSlot<T>>,
}

impl<T> TaskHandle<T> {
    /// True until the job has produced its result
    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Fixed-size fork-join worker pool.
///
/// `fork` queues a job and returns at once; `join` waits for it. A pool
/// worker that joins keeps executing other queued jobs while its target is
/// unfinished, so recursive tasks that fork and join from inside the pool
/// cannot starve it, even with a single thread.
pub struct WorkScheduler {
    pool: ThreadPool,
    closed: AtomicBool,
    metrics: SchedulerMetrics,
}

impl WorkScheduler {
    pub fn new(thread_count: NonZeroUsize) -> SearchResult<Self> {
        Self::with_metrics(thread_count, SchedulerMetrics::new())
    }

    pub fn with_metrics(thread_count: NonZeroUsize, metrics: SchedulerMetrics) -> SearchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count.get())
            .thread_name(|index| format!("forkscout-worker-{}", index))
            .build()
            .map_err(|e| SearchError::pool_build(e.to_string()))?;
        debug!("Started worker pool with {} threads", thread_count);
        Ok(Self {
            pool,
            closed: AtomicBool::new(false),
            metrics,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Runs `op` on a pool worker and waits for it
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Queues `job` on the pool. Errors and panics inside the job are kept
    /// on the handle and re-raised by `join`.
    pub fn fork<T, F>(&self, job: F) -> SearchResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> SearchResult<T> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchError::scheduler_exhausted(
                "scheduler no longer accepts work",
            ));
        }

        let slot = Arc::new(ResultSlot::new());
        let writer = SlotWriter(slot.clone());
        let metrics = self.metrics.clone();
        self.metrics.record_fork();

        self.pool.spawn(move || {
            let result = catch_panic(job);
            if result.is_err() {
                metrics.record_failure();
            }
            writer.fill(result);
        });

        Ok(TaskHandle { slot })
    }

    /// Waits for the handle's result, running other queued jobs meanwhile
    /// when called from a pool worker
    pub fn join<T>(&self, handle: &TaskHandle<T>) -> SearchResult<T> {
        self.metrics.record_join();
        loop {
            if let Some(result) = handle.slot.wait(Some(Duration::ZERO)) {
                return result;
            }
            match rayon::yield_now() {
                Some(Yield::Executed) => self.metrics.record_helped(),
                Some(Yield::Idle) => {
                    if let Some(result) = handle.slot.wait(Some(IDLE_PARK)) {
                        return result;
                    }
                }
                // Not a pool thread; nothing to help with, just block
                None => {
                    if let Some(result) = handle.slot.wait(None) {
                        return result;
                    }
                }
            }
        }
    }

    /// Stops accepting new forks; jobs already queued still run
    pub fn close(&self) {
        trace!("Closing scheduler");
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for WorkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkScheduler")
            .field("threads", &self.thread_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Runs `job` in place, turning a panic into [`SearchError::TaskPanicked`]
pub fn catch_panic<T, F>(job: F) -> SearchResult<T>
where
    F: FnOnce() -> SearchResult<T>,
{
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(SearchError::task_panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
