//! Task contract
//!
//! A `Task` is a cooperative unit of work hosted by a `Thread`. The scheduler
//! drives it through lifecycle hooks:
//!
//! - `on_start` once, when the task is folded into a tick
//! - `on_state_change` when the thread moves into or out of the task's state
//! - `on_event` for every subscribed event delivered in a tick
//! - `on_update` once per tick while the task's state matches the thread's
//! - `on_error` when `on_event`, `on_update` or `on_state_change` fail
//! - `on_finish` once, before the task is dropped
//!
//! Hooks must not block: long-running work is modeled as repeated `on_update`
//! calls. Failures are values (`TaskError`); panics inside a hook are caught
//! and converted to `TaskError::Panicked`.

use crate::event::{Event, EventType};
use crate::state::State;
use crate::task_data::TaskMeta;
use crate::thread::ThreadHandle;
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Identifier of a task, unique within its thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Failure raised by a task hook
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Failure described by a message
    #[error("{0}")]
    Message(String),

    /// A hook panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Create an error from a message
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        TaskError::Panicked(message)
    }
}

/// Result of a task hook
pub type TaskResult = Result<(), TaskError>;

/// A cooperative unit of work
pub trait Task: Send + 'static {
    /// Called once before the first tick the task takes part in.
    ///
    /// An error here makes the task stillborn: it is finished immediately and
    /// never updated.
    fn on_start(&mut self, _opts: &mut TaskOptions<'_>) -> TaskResult {
        Ok(())
    }

    /// Called once per tick while the task's state matches the thread's state
    fn on_update(&mut self, opts: &mut TaskOptions<'_>) -> TaskResult;

    /// Called for each delivered event whose type the task subscribed to
    fn on_event(&mut self, _opts: &mut TaskOptions<'_>, _event: &Event) -> TaskResult {
        Ok(())
    }

    /// Called when the thread moves from `old` to `new` and the task's state
    /// is one of the two
    fn on_state_change(
        &mut self,
        _opts: &mut TaskOptions<'_>,
        _old: State,
        _new: State,
    ) -> TaskResult {
        Ok(())
    }

    /// Called with the failure of another hook.
    ///
    /// The task stays active unless it calls `finish()` or returns an error,
    /// in which case it is finished.
    fn on_error(&mut self, _opts: &mut TaskOptions<'_>, _error: TaskError) -> TaskResult {
        Ok(())
    }

    /// Called once before the task is dropped. Errors are discarded.
    fn on_finish(&mut self, _opts: &mut TaskOptions<'_>) -> TaskResult {
        Ok(())
    }
}

/// Capabilities a running task has over its own scheduling metadata and its
/// hosting thread
pub struct TaskOptions<'a> {
    thread: &'a ThreadHandle,
    meta: &'a mut TaskMeta,
}

impl<'a> TaskOptions<'a> {
    pub(crate) fn new(thread: &'a ThreadHandle, meta: &'a mut TaskMeta) -> Self {
        Self { thread, meta }
    }

    /// The thread hosting this task
    pub fn thread(&self) -> &'a ThreadHandle {
        self.thread
    }

    /// Identifier of this task
    pub fn task_id(&self) -> TaskId {
        self.meta.id
    }

    /// State the task requires to be updated
    pub fn state(&self) -> State {
        self.meta.state
    }

    /// Retarget the state the task requires.
    ///
    /// Takes effect from the next scheduling decision about this task.
    pub fn set_state(&mut self, state: impl Into<State>) {
        self.meta.state = state.into();
    }

    /// Subscribe to an event type. Returns false if already subscribed.
    pub fn subscribe(&mut self, kind: impl Into<EventType>) -> bool {
        self.meta.subscriptions.insert(kind.into())
    }

    /// Unsubscribe from an event type. Returns false if not subscribed.
    pub fn unsubscribe(&mut self, kind: impl Into<EventType>) -> bool {
        self.meta.subscriptions.remove(&kind.into())
    }

    /// Whether the task receives events of this type
    pub fn is_subscribed(&self, kind: impl Into<EventType>) -> bool {
        self.meta.subscriptions.contains(&kind.into())
    }

    /// Time since the task's last update (or since it started)
    pub fn elapsed(&self) -> Duration {
        self.meta.last_update.elapsed()
    }

    /// `elapsed()` in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Request removal of this task.
    ///
    /// The request is honored once the scheduler finishes the current step
    /// for this task: right after `on_start` or `on_state_change`, or at the
    /// end of the current update. Within an update, the remaining subscribed
    /// events and `on_update` still run before `on_finish`. The task is never
    /// updated in a later tick.
    pub fn finish(&mut self) {
        self.meta.finish_requested = true;
    }

    /// Whether `finish()` was requested
    pub fn is_finishing(&self) -> bool {
        self.meta.finish_requested
    }
}

/// Task running a closure on every update
pub struct FnTask<F> {
    f: F,
}

/// Wrap a closure as a task
pub fn from_fn<F>(f: F) -> FnTask<F>
where
    F: FnMut(&mut TaskOptions<'_>) -> TaskResult + Send + 'static,
{
    FnTask { f }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(&mut TaskOptions<'_>) -> TaskResult + Send + 'static,
{
    fn on_update(&mut self, opts: &mut TaskOptions<'_>) -> TaskResult {
        (self.f)(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(0xab).to_string(), "00000000000000ab");
        assert_eq!(TaskId(5).as_u64(), 5);
    }

    #[test]
    fn test_panic_payload_conversion() {
        let err = TaskError::from_panic(Box::new("boom"));
        assert!(matches!(err, TaskError::Panicked(ref m) if m == "boom"));

        let err = TaskError::from_panic(Box::new(String::from("owned")));
        assert!(matches!(err, TaskError::Panicked(ref m) if m == "owned"));

        let err = TaskError::from_panic(Box::new(17u32));
        assert!(matches!(err, TaskError::Panicked(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TaskError::msg("bad input").to_string(), "bad input");
        assert_eq!(
            TaskError::Panicked("oops".into()).to_string(),
            "task panicked: oops"
        );

        let err: TaskError = anyhow::anyhow!("wrapped").into();
        assert_eq!(err.to_string(), "wrapped");
    }
}
