//! Shared scheduler state and the submission handle
//!
//! `ThreadCore` holds everything foreign threads may touch: the pending task
//! and event queues, the activation-state queue, finish requests and the
//! idle/wake handshake. Each of these has its own lock, held only for the
//! duration of an append or a drain, never across a tick.

use crate::event::Event;
use crate::state::State;
use crate::task::Task;
use crate::thread::options::ThreadOptions;
use crate::thread::scheduler::Scheduler;
use crate::thread::stats::{ThreadCounters, ThreadStats};
use crossbeam::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// A task waiting to be folded into the next tick
pub(crate) struct PendingTask {
    pub(crate) task: Box<dyn Task>,
    pub(crate) state: State,
}

/// Work submitted since the last drain
#[derive(Default)]
struct Pending {
    tasks: Vec<PendingTask>,
    events: Vec<Event>,
}

/// Outstanding cancellation requests
#[derive(Debug, Default)]
pub(crate) struct FinishRequests {
    /// Stop the scheduler
    pub(crate) thread: bool,
    /// Finish every task
    pub(crate) all_tasks: bool,
    /// Finish tasks requiring one of these states
    pub(crate) states: Vec<State>,
}

impl FinishRequests {
    fn is_empty(&self) -> bool {
        !self.thread && !self.all_tasks && self.states.is_empty()
    }
}

/// Result of advancing the activation-state queue
#[derive(Debug, Clone, Copy)]
pub(crate) struct StateStep {
    /// State in effect for this tick
    pub(crate) current: State,
    /// `(old, new)` if the state changed this tick
    pub(crate) transition: Option<(State, State)>,
    /// More transitions are queued
    pub(crate) pending: bool,
}

/// Idle handshake flag
#[derive(Default)]
struct Wake {
    signaled: bool,
}

/// State shared between a scheduler's handles and its worker
pub(crate) struct ThreadCore {
    options: ThreadOptions,

    /// Front is the current state, the rest are queued transitions
    states: Mutex<VecDeque<State>>,

    pending: Mutex<Pending>,

    requests: Mutex<FinishRequests>,

    wake: Mutex<Wake>,
    wake_cond: Condvar,

    /// Loop state parked between runs
    pub(crate) scheduler: Mutex<Option<Scheduler>>,

    /// Worker currently executing the loop
    worker: AtomicCell<Option<ThreadId>>,

    pub(crate) running: AtomicBool,
    finishing: AtomicBool,
    zombie: AtomicBool,

    pub(crate) counters: ThreadCounters,
}

impl ThreadCore {
    fn new(options: ThreadOptions) -> Self {
        let mut states = VecDeque::with_capacity(4);
        states.push_back(options.initial_state);

        Self {
            options,
            states: Mutex::new(states),
            pending: Mutex::new(Pending::default()),
            requests: Mutex::new(FinishRequests::default()),
            wake: Mutex::new(Wake::default()),
            wake_cond: Condvar::new(),
            scheduler: Mutex::new(Some(Scheduler::new())),
            worker: AtomicCell::new(None),
            running: AtomicBool::new(false),
            finishing: AtomicBool::new(false),
            zombie: AtomicBool::new(false),
            counters: ThreadCounters::default(),
        }
    }

    pub(crate) fn options(&self) -> &ThreadOptions {
        &self.options
    }

    pub(crate) fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::Acquire)
    }

    pub(crate) fn set_worker(&self, worker: Option<ThreadId>) {
        self.worker.store(worker);
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        self.worker.load() == Some(thread::current().id())
    }

    /// Pop the front state if a transition is queued
    pub(crate) fn advance_state(&self) -> StateStep {
        let mut states = self.states.lock();
        let transition = if states.len() > 1 {
            states.pop_front().zip(states.front().copied())
        } else {
            None
        };

        StateStep {
            current: states.front().copied().unwrap_or_default(),
            transition,
            pending: states.len() > 1,
        }
    }

    pub(crate) fn take_pending_tasks(&self) -> Vec<PendingTask> {
        mem::take(&mut self.pending.lock().tasks)
    }

    /// Move pending events into `out`, returning how many were moved
    pub(crate) fn drain_pending_events(&self, out: &mut Vec<Event>) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.events.len();
        out.append(&mut pending.events);
        count
    }

    pub(crate) fn take_requests(&self) -> FinishRequests {
        mem::take(&mut *self.requests.lock())
    }

    /// Whether anything is waiting to be picked up by the next tick
    pub(crate) fn has_work(&self) -> bool {
        {
            let pending = self.pending.lock();
            if !pending.tasks.is_empty() || !pending.events.is_empty() {
                return true;
            }
        }
        self.states.lock().len() > 1 || !self.requests.lock().is_empty()
    }

    /// Block the worker until a producer signals or the idle timeout passes
    pub(crate) fn park(&self) {
        let mut wake = self.wake.lock();
        if !wake.signaled && !self.has_work() {
            self.counters.idle_wait();
            self.zombie.store(true, Ordering::Release);
            tracing::debug!(thread = %self.options.name, "scheduler idle");

            while !wake.signaled {
                match self.options.idle_timeout {
                    Some(timeout) => {
                        if self.wake_cond.wait_for(&mut wake, timeout).timed_out() {
                            break;
                        }
                    }
                    None => self.wake_cond.wait(&mut wake),
                }
            }

            self.zombie.store(false, Ordering::Release);
            tracing::debug!(thread = %self.options.name, "scheduler woken");
        }
        wake.signaled = false;
    }

    /// Wake an idle worker; submissions made by the worker itself need no wake
    fn notify(&self) {
        if self.is_worker_thread() {
            return;
        }
        let mut wake = self.wake.lock();
        wake.signaled = true;
        self.wake_cond.notify_one();
    }
}

/// Cloneable handle for submitting work to a scheduler
///
/// Handles are shared with every task the scheduler hosts (through
/// `TaskOptions::thread`) and may be sent to any thread.
#[derive(Clone)]
pub struct ThreadHandle {
    pub(crate) core: Arc<ThreadCore>,
}

impl ThreadHandle {
    pub(crate) fn new(options: ThreadOptions) -> Self {
        Self {
            core: Arc::new(ThreadCore::new(options)),
        }
    }

    /// Name of the scheduler
    pub fn name(&self) -> &str {
        &self.core.options.name
    }

    /// Queue a task requiring activation state `state`.
    ///
    /// The task is started at the beginning of the next tick. Dropped without
    /// notice once `finish()` has been requested.
    pub fn add_task<T: Task>(&self, task: T, state: impl Into<State>) {
        self.add_boxed_task(Box::new(task), state);
    }

    /// Queue an already boxed task
    pub fn add_boxed_task(&self, task: Box<dyn Task>, state: impl Into<State>) {
        if self.core.is_finishing() {
            tracing::debug!(thread = %self.name(), "scheduler finishing, task dropped");
            return;
        }

        self.core.pending.lock().tasks.push(PendingTask {
            task,
            state: state.into(),
        });
        self.core.notify();
    }

    /// Queue an event for delivery on the next tick. `None` is ignored.
    pub fn send_event(&self, event: impl Into<Option<Event>>) {
        let Some(event) = event.into() else {
            return;
        };
        if self.core.is_finishing() {
            return;
        }

        self.core.pending.lock().events.push(event);
        self.core.notify();
    }

    /// Queue a transition to `state` unless it is already the last queued state
    pub fn set_state(&self, state: impl Into<State>) {
        let state = state.into();
        {
            let mut states = self.core.states.lock();
            if states.back() == Some(&state) {
                return;
            }
            states.push_back(state);
        }
        self.core.notify();
    }

    /// Current activation state
    pub fn state(&self) -> State {
        self.core.states.lock().front().copied().unwrap_or_default()
    }

    /// Stop the scheduler after the current tick. Terminal.
    ///
    /// Tasks still alive when the loop stops are finished.
    pub fn finish(&self) {
        self.core.finishing.store(true, Ordering::Release);
        self.core.requests.lock().thread = true;
        self.core.notify();
    }

    /// Finish every current and queued task; the scheduler keeps running
    pub fn finish_tasks(&self) {
        self.core.requests.lock().all_tasks = true;
        self.core.notify();
    }

    /// Finish the tasks whose required state is `state`
    pub fn finish_tasks_in_state(&self, state: impl Into<State>) {
        let state = state.into();
        {
            let mut requests = self.core.requests.lock();
            if !requests.states.contains(&state) {
                requests.states.push(state);
            }
        }
        self.core.notify();
    }

    /// Whether the scheduler loop is executing
    pub fn is_alive(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Whether a remote worker is blocked waiting for work
    pub fn is_idle(&self) -> bool {
        self.core.zombie.load(Ordering::Acquire)
    }

    /// Whether `finish()` has been requested
    pub fn is_finishing(&self) -> bool {
        self.core.is_finishing()
    }

    /// Activity counters
    pub fn stats(&self) -> ThreadStats {
        self.core.counters.snapshot()
    }

    /// Whether both handles refer to the same scheduler
    pub fn ptr_eq(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ThreadHandle {
        ThreadHandle::new(ThreadOptions::named("test"))
    }

    #[test]
    fn test_state_queue_skips_repeated_tail() {
        let handle = handle();

        handle.set_state(0u32);
        assert_eq!(handle.core.states.lock().len(), 1);

        handle.set_state(1u32);
        handle.set_state(1u32);
        handle.set_state(2u32);
        assert_eq!(handle.core.states.lock().len(), 3);
        assert_eq!(handle.state(), State(0));
    }

    #[test]
    fn test_advance_state() {
        let handle = handle();
        handle.set_state(1u32);
        handle.set_state(2u32);

        let step = handle.core.advance_state();
        assert_eq!(step.current, State(1));
        assert_eq!(step.transition, Some((State(0), State(1))));
        assert!(step.pending);

        let step = handle.core.advance_state();
        assert_eq!(step.current, State(2));
        assert_eq!(step.transition, Some((State(1), State(2))));
        assert!(!step.pending);

        let step = handle.core.advance_state();
        assert_eq!(step.current, State(2));
        assert!(step.transition.is_none());
    }

    #[test]
    fn test_pending_work_tracking() {
        let handle = handle();
        assert!(!handle.core.has_work());

        handle.send_event(None::<Event>);
        assert!(!handle.core.has_work());

        handle.send_event(Event::new(1u32));
        assert!(handle.core.has_work());

        let mut events = Vec::new();
        assert_eq!(handle.core.drain_pending_events(&mut events), 1);
        assert!(!handle.core.has_work());

        handle.finish_tasks_in_state(4u32);
        handle.finish_tasks_in_state(4u32);
        assert!(handle.core.has_work());
        let requests = handle.core.take_requests();
        assert_eq!(requests.states, vec![State(4)]);
        assert!(!handle.core.has_work());
    }

    #[test]
    fn test_finish_drops_new_tasks() {
        let handle = handle();
        handle.finish();
        assert!(handle.is_finishing());

        handle.add_task(crate::task::from_fn(|_| Ok(())), 0u32);
        assert!(handle.core.take_pending_tasks().is_empty());
    }
}
