//! The scheduling loop
//!
//! `Scheduler` is owned by whichever thread runs the loop; nothing in it is
//! shared, so a tick runs without taking any per-task lock. Tasks live in two
//! buffers swapped at the start of every tick: survivors of tick N are pushed
//! into `next_tasks` and become the active `tasks` of tick N + 1. Anything
//! submitted during a tick goes through the pending queues of `ThreadCore`
//! and is folded in at the start of the following tick, so a task can never
//! observe its own same-tick submissions.

use crate::event::Event;
use crate::id::IdGenerator;
use crate::task::TaskId;
use crate::task_data::TaskData;
use crate::thread::handle::{StateStep, ThreadHandle};
use crate::thread::RunMode;
use std::mem;

/// How a tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// Some task ran or a state transition is still queued
    Busy,
    /// Nothing ran
    Idle,
    /// `finish()` was requested
    Finished,
}

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    /// Out of work in local mode
    Drained,
    /// `finish()` was requested
    Finished,
}

/// Loop state owned by the running worker
pub(crate) struct Scheduler {
    tasks: Vec<TaskData>,
    next_tasks: Vec<TaskData>,
    events: Vec<Event>,
    ids: IdGenerator<u64>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_tasks: Vec::new(),
            events: Vec::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Number of tasks owned by the loop
    pub(crate) fn task_count(&self) -> usize {
        self.tasks.len() + self.next_tasks.len()
    }

    /// Tick until finished, or until out of work in local mode
    pub(crate) fn run(&mut self, handle: &ThreadHandle, mode: RunMode) -> Exit {
        let core = &handle.core;
        loop {
            match self.tick(handle) {
                Tick::Busy => continue,
                Tick::Finished => {
                    self.finish_all(handle);
                    return Exit::Finished;
                }
                Tick::Idle => {
                    if core.has_work() {
                        continue;
                    }
                    match mode {
                        RunMode::Local => return Exit::Drained,
                        RunMode::Remote => core.park(),
                    }
                }
            }
        }
    }

    /// Run one pass over all tasks
    pub(crate) fn tick(&mut self, handle: &ThreadHandle) -> Tick {
        let core = &handle.core;

        let StateStep {
            current,
            transition,
            pending: transitions_pending,
        } = core.advance_state();
        if let Some((old, new)) = transition {
            tracing::debug!(thread = %handle.name(), %old, %new, "state transition");
        }

        // Survivors of the previous tick become this tick's active buffer
        mem::swap(&mut self.tasks, &mut self.next_tasks);

        for pending in core.take_pending_tasks() {
            let id = TaskId(self.ids.next_id());
            let data = TaskData::start(pending.task, id, pending.state, handle);
            if data.is_finished() {
                core.counters.task_stillborn();
                continue;
            }
            core.counters.task_started();
            self.tasks.push(data);
        }

        let requests = core.take_requests();
        if requests.all_tasks {
            tracing::debug!(
                thread = %handle.name(),
                tasks = self.task_count(),
                "finishing all tasks"
            );
            self.finish_all(handle);
        }
        for state in &requests.states {
            self.finish_in_state(handle, |data| data.state() == *state);
        }
        if requests.thread {
            tracing::debug!(thread = %handle.name(), "finish requested");
            return Tick::Finished;
        }

        let delivered = core.drain_pending_events(&mut self.events);
        core.counters.events_delivered(delivered);

        let mut ran = 0usize;
        for mut data in self.tasks.drain(..) {
            if let Some((old, new)) = transition {
                if data.state() == old || data.state() == new {
                    data.state_change(handle, old, new);
                }
            }
            if data.is_finished() {
                core.counters.task_finished();
                continue;
            }

            if data.state() != current {
                self.next_tasks.push(data);
                continue;
            }

            data.update(handle, &self.events);
            ran += 1;

            if data.is_finished() {
                core.counters.task_finished();
                continue;
            }
            self.next_tasks.push(data);
        }

        self.events.clear();
        core.counters.tick();
        tracing::trace!(
            thread = %handle.name(),
            state = %current,
            ran,
            tasks = self.next_tasks.len(),
            events = delivered,
            "tick"
        );

        if ran > 0 || transitions_pending {
            Tick::Busy
        } else {
            Tick::Idle
        }
    }

    /// Finish and drop every task in both buffers
    pub(crate) fn finish_all(&mut self, handle: &ThreadHandle) {
        self.finish_in_state(handle, |_| true);
        self.events.clear();
    }

    fn finish_in_state<P>(&mut self, handle: &ThreadHandle, mut matches: P)
    where
        P: FnMut(&TaskData) -> bool,
    {
        let counters = &handle.core.counters;
        let mut finish = |data: &mut TaskData| {
            if !matches(data) {
                return true;
            }
            tracing::trace!(thread = %handle.name(), task = %data.id(), "finishing task");
            data.finish(handle);
            counters.task_finished();
            false
        };
        self.tasks.retain_mut(&mut finish);
        self.next_tasks.retain_mut(&mut finish);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
