use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters describing how a fork-join search was scheduled.
///
/// Cloning shares the counters, so the scheduler, the tasks and the caller
/// can all hold a copy.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
    forks: Arc<AtomicU64>,
    joins: Arc<AtomicU64>,
    leaves: Arc<AtomicU64>,
    helped: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A job was handed to the pool
    pub fn record_fork(&self) {
        self.forks.fetch_add(1, Ordering::Relaxed);
    }

    /// A handle was joined
    pub fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    /// A work item ran sequentially
    pub fn record_leaf(&self) {
        self.leaves.fetch_add(1, Ordering::Relaxed);
    }

    /// A joining worker ran some other queued job while it waited
    pub fn record_helped(&self) {
        self.helped.fetch_add(1, Ordering::Relaxed);
    }

    /// A forked job finished with an error or a panic
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forks(&self) -> u64 {
        self.forks.load(Ordering::Relaxed)
    }

    pub fn leaves(&self) -> u64 {
        self.leaves.load(Ordering::Relaxed)
    }

    pub fn get_stats(&self) -> SchedulerStats {
        SchedulerStats {
            forks: self.forks.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            leaves: self.leaves.load(Ordering::Relaxed),
            helped: self.helped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scheduler stats: forks {}, joins {}, leaves {}, jobs run while joining {}, failures {}",
            stats.forks, stats.joins, stats.leaves, stats.helped, stats.failures
        );
    }
}

/// Point-in-time copy of [`SchedulerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub forks: u64,
    pub joins: u64,
    pub leaves: u64,
    pub helped: u64,
    pub failures: u64,
}
