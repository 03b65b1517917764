//! Scheduler activity counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a scheduler's activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Ticks completed
    pub ticks: u64,

    /// Tasks that started successfully
    pub tasks_started: u64,

    /// Started tasks that have finished since
    pub tasks_finished: u64,

    /// Tasks whose `on_start` failed or finished them immediately
    pub tasks_stillborn: u64,

    /// Events drained into a tick
    pub events_delivered: u64,

    /// Times the worker went idle
    pub idle_waits: u64,
}

impl ThreadStats {
    /// Tasks started and not finished yet
    pub fn active_tasks(&self) -> u64 {
        self.tasks_started.saturating_sub(self.tasks_finished)
    }
}

/// Lock-free counters updated by the scheduler loop
#[derive(Debug, Default)]
pub(crate) struct ThreadCounters {
    ticks: AtomicU64,
    tasks_started: AtomicU64,
    tasks_finished: AtomicU64,
    stillborn: AtomicU64,
    events_delivered: AtomicU64,
    idle_waits: AtomicU64,
}

impl ThreadCounters {
    pub(crate) fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_stillborn(&self) {
        self.stillborn.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.tasks_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn events_delivered(&self, count: usize) {
        self.events_delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn idle_wait(&self) {
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ThreadStats {
        ThreadStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_finished: self.tasks_finished.load(Ordering::Relaxed),
            tasks_stillborn: self.stillborn.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            idle_waits: self.idle_waits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = ThreadCounters::default();

        counters.tick();
        counters.tick();
        counters.task_started();
        counters.task_started();
        counters.task_finished();
        counters.task_stillborn();
        counters.events_delivered(3);
        counters.idle_wait();

        let stats = counters.snapshot();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.tasks_started, 2);
        assert_eq!(stats.tasks_finished, 1);
        assert_eq!(stats.tasks_stillborn, 1);
        assert_eq!(stats.events_delivered, 3);
        assert_eq!(stats.idle_waits, 1);
        assert_eq!(stats.active_tasks(), 1);
    }
}
