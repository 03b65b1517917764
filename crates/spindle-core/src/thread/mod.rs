//! Schedulers
//!
//! A `Thread` runs a private, cooperative scheduling loop over a dynamic set of
//! tasks. It either runs on the caller (`RunMode::Local`, returning once no
//! task ran and nothing is queued) or on a dedicated worker
//! (`RunMode::Remote`, sleeping while idle and woken by foreign submissions).
//!
//! `Thread` is the owning handle: dropping it requests `finish()` and joins
//! the worker. `ThreadHandle` is the cloneable submission surface handed to
//! tasks and producers on other threads.

mod handle;
mod options;
mod scheduler;
mod stats;

pub use handle::ThreadHandle;
pub use options::ThreadOptions;
pub use stats::ThreadStats;

use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

/// Where the scheduling loop executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// On the calling thread; `run` blocks until out of work or finished
    Local,
    /// On a dedicated worker; `run` returns immediately
    Remote,
}

/// Errors reported by `Thread::run`
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// The loop is already executing
    #[error("scheduler '{0}' is already running")]
    AlreadyRunning(String),

    /// `finish()` was requested; schedulers cannot be restarted
    #[error("scheduler '{0}' has finished")]
    Finished(String),

    /// The worker could not be spawned
    #[error("failed to spawn worker for scheduler '{name}': {source}")]
    Spawn {
        /// Scheduler name
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

/// Owning handle of a scheduler
pub struct Thread {
    handle: ThreadHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Thread {
    /// Create a scheduler with default options and the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(ThreadOptions::named(name))
    }

    /// Create a scheduler from options
    pub fn with_options(options: ThreadOptions) -> Self {
        Self {
            handle: ThreadHandle::new(options),
            worker: Mutex::new(None),
        }
    }

    /// Submission handle of this scheduler
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    /// Start the scheduling loop.
    ///
    /// In local mode this blocks until no task ran and nothing is queued, or
    /// until `finish()`. In remote mode it spawns the worker and returns.
    pub fn run(&self, mode: RunMode) -> Result<(), ThreadError> {
        let core = &self.handle.core;
        if core.is_finishing() {
            return Err(ThreadError::Finished(self.name().to_string()));
        }
        if core
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ThreadError::AlreadyRunning(self.name().to_string()));
        }

        match mode {
            RunMode::Local => {
                run_worker(&self.handle, mode);
                Ok(())
            }
            RunMode::Remote => {
                let handle = self.handle.clone();
                let mut builder =
                    thread::Builder::new().name(format!("spindle-{}", self.name()));
                if let Some(size) = core.options().stack_size {
                    builder = builder.stack_size(size);
                }

                match builder.spawn(move || run_worker(&handle, RunMode::Remote)) {
                    Ok(worker) => {
                        *self.worker.lock() = Some(worker);
                        Ok(())
                    }
                    Err(source) => {
                        core.running.store(false, Ordering::Release);
                        Err(ThreadError::Spawn {
                            name: self.name().to_string(),
                            source,
                        })
                    }
                }
            }
        }
    }

    /// Wait for the remote worker to exit.
    ///
    /// Returns immediately when called from the worker itself or when no
    /// worker was spawned.
    pub fn join(&self) {
        if self.handle.core.is_worker_thread() {
            return;
        }

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!(thread = %self.name(), "scheduler worker panicked");
            }
        }
    }
}

impl Deref for Thread {
    type Target = ThreadHandle;

    fn deref(&self) -> &ThreadHandle {
        &self.handle
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        self.handle.finish();
        self.join();

        // Tasks parked by a local run that never resumed
        let parked = self.handle.core.scheduler.lock().take();
        if let Some(mut scheduler) = parked {
            scheduler.finish_all(&self.handle);
        }
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread").field("handle", &self.handle).finish()
    }
}

/// Body of the loop on whichever thread runs it
fn run_worker(handle: &ThreadHandle, mode: RunMode) {
    let core = &handle.core;
    core.set_worker(Some(thread::current().id()));
    tracing::debug!(thread = %handle.name(), ?mode, "scheduler started");

    let mut scheduler = core.scheduler.lock().take().unwrap_or_default();
    let exit = scheduler.run(handle, mode);
    *core.scheduler.lock() = Some(scheduler);

    core.set_worker(None);
    core.running.store(false, Ordering::Release);
    tracing::debug!(thread = %handle.name(), ?exit, "scheduler stopped");
}
