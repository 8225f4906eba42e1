/// Point-in-time snapshot of a pool's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub worker_count: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub queue_capacity: usize,
    pub total_submitted: usize,
    pub rejected_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub discarded_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.worker_count == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / self.worker_count as f64
    }

    pub fn queue_pressure(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        self.queued_tasks as f64 / self.queue_capacity as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }

    pub fn rejection_rate(&self) -> f64 {
        let offered = self.total_submitted + self.rejected_tasks;
        if offered == 0 {
            return 0.0;
        }
        self.rejected_tasks as f64 / offered as f64
    }

    /// Tasks that were accepted but have not run (or been discarded) yet.
    #[inline]
    pub fn pending(&self) -> usize {
        self.total_submitted
            .saturating_sub(self.completed_tasks + self.failed_tasks + self.discarded_tasks)
    }
}
