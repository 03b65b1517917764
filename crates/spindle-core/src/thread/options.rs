//! Scheduler configuration

use crate::state::State;
use std::time::Duration;

/// Options for creating a `Thread`
#[derive(Debug, Clone)]
pub struct ThreadOptions {
    /// Name of the scheduler, also used for the worker thread's name
    pub name: String,

    /// Activation state the scheduler starts in
    pub initial_state: State,

    /// Stack size of the remote worker in bytes (None = platform default)
    pub stack_size: Option<usize>,

    /// Upper bound of a single idle wait (None = wait until woken)
    pub idle_timeout: Option<Duration>,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            name: "spindle".to_string(),
            initial_state: State::default(),
            stack_size: None,
            idle_timeout: None,
        }
    }
}

impl ThreadOptions {
    /// Default options with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Start in `state` instead of the default state
    pub fn with_initial_state(mut self, state: impl Into<State>) -> Self {
        self.initial_state = state.into();
        self
    }

    /// Spawn the remote worker with a custom stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Re-check for work at least this often while idle
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}
