//! Per-task bookkeeping
//!
//! `TaskData` owns one boxed `Task` together with its scheduling metadata and
//! is the only place hooks are invoked from. Every invocation is isolated:
//! error values and panics are caught at this boundary and routed according
//! to the lifecycle rules, so a failing task never disturbs the scheduler or
//! the other tasks of its thread.

use crate::event::{Event, EventType};
use crate::state::State;
use crate::task::{Task, TaskError, TaskId, TaskOptions, TaskResult};
use crate::thread::ThreadHandle;
use rustc_hash::FxHashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Scheduling metadata exposed to a task through `TaskOptions`
pub(crate) struct TaskMeta {
    pub(crate) id: TaskId,
    pub(crate) state: State,
    pub(crate) subscriptions: FxHashSet<EventType>,
    pub(crate) last_update: Instant,
    pub(crate) finish_requested: bool,
}

/// A task plus its metadata, owned by the scheduler loop
pub(crate) struct TaskData {
    task: Box<dyn Task>,
    meta: TaskMeta,
    finished: bool,
}

impl TaskData {
    /// Wrap a task and run its `on_start` hook.
    ///
    /// The returned value may already be finished if `on_start` failed or the
    /// task asked to finish from it.
    pub(crate) fn start(
        task: Box<dyn Task>,
        id: TaskId,
        state: State,
        thread: &ThreadHandle,
    ) -> Self {
        let mut data = Self {
            task,
            meta: TaskMeta {
                id,
                state,
                subscriptions: FxHashSet::default(),
                last_update: Instant::now(),
                finish_requested: false,
            },
            finished: false,
        };

        match data.invoke(thread, |task, opts| task.on_start(opts)) {
            Ok(()) => data.finish_if_requested(thread),
            Err(error) => {
                tracing::warn!(
                    thread = %thread.name(),
                    task = %id,
                    %error,
                    "task failed to start"
                );
                data.finish(thread);
            }
        }

        data
    }

    pub(crate) fn id(&self) -> TaskId {
        self.meta.id
    }

    /// State the task currently requires
    pub(crate) fn state(&self) -> State {
        self.meta.state
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Deliver subscribed events, then update the task
    pub(crate) fn update(&mut self, thread: &ThreadHandle, events: &[Event]) {
        for event in events {
            if self.finished {
                break;
            }
            if !self.meta.subscriptions.contains(&event.kind()) {
                continue;
            }
            if let Err(error) = self.invoke(thread, |task, opts| task.on_event(opts, event)) {
                self.recover(thread, error);
            }
        }

        if !self.finished {
            if let Err(error) = self.invoke(thread, |task, opts| task.on_update(opts)) {
                self.recover(thread, error);
            }
        }

        self.meta.last_update = Instant::now();
        self.finish_if_requested(thread);
    }

    /// Notify the task of a thread state transition
    pub(crate) fn state_change(&mut self, thread: &ThreadHandle, old: State, new: State) {
        if self.finished {
            return;
        }
        if let Err(error) = self.invoke(thread, |task, opts| task.on_state_change(opts, old, new)) {
            self.recover(thread, error);
        }
        self.finish_if_requested(thread);
    }

    /// Finish the task, running `on_finish` exactly once
    pub(crate) fn finish(&mut self, thread: &ThreadHandle) {
        if self.finished {
            return;
        }
        self.finished = true;

        if let Err(error) = self.invoke(thread, |task, opts| task.on_finish(opts)) {
            tracing::warn!(
                thread = %thread.name(),
                task = %self.meta.id,
                %error,
                "on_finish failed, discarding"
            );
        }
    }

    fn finish_if_requested(&mut self, thread: &ThreadHandle) {
        if self.meta.finish_requested {
            self.finish(thread);
        }
    }

    /// Route a runtime failure to `on_error`; a failing `on_error` finishes the task
    fn recover(&mut self, thread: &ThreadHandle, error: TaskError) {
        tracing::warn!(
            thread = %thread.name(),
            task = %self.meta.id,
            %error,
            "task failed"
        );

        if let Err(error) = self.invoke(thread, move |task, opts| task.on_error(opts, error)) {
            tracing::error!(
                thread = %thread.name(),
                task = %self.meta.id,
                %error,
                "on_error failed, finishing task"
            );
            self.finish(thread);
        }
    }

    fn invoke<F>(&mut self, thread: &ThreadHandle, hook: F) -> TaskResult
    where
        F: FnOnce(&mut dyn Task, &mut TaskOptions<'_>) -> TaskResult,
    {
        let Self { task, meta, .. } = self;
        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut opts = TaskOptions::new(thread, meta);
            hook(task.as_mut(), &mut opts)
        }));

        result.unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
    }
}
