//! Activation states
//!
//! A `State` gates which tasks are eligible to run during a tick: a task is
//! updated only while its required state equals the hosting thread's current
//! state. The values carry no meaning for the scheduler; applications usually
//! name their phases with constants:
//!
//! ```
//! use spindle_core::State;
//!
//! const INIT: State = State::new(0);
//! const RUNNING: State = State::new(1);
//! assert_ne!(INIT, RUNNING);
//! ```

use std::fmt;

/// Opaque activation state of a thread or a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct State(pub u32);

impl State {
    /// Create a state from its raw value
    pub const fn new(value: u32) -> Self {
        State(value)
    }

    /// Get the raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for State {
    fn from(value: u32) -> Self {
        State(value)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_zero() {
        assert_eq!(State::default(), State::new(0));
        assert_eq!(State::from(7u32).as_u32(), 7);
        assert_eq!(State(3).to_string(), "3");
    }
}
