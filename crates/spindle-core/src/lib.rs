//! Spindle Core
//!
//! Cooperative task schedulers hosted on worker threads. This crate provides:
//! - `Thread`: a private scheduler loop over a dynamic set of tasks, run either
//!   on the caller (`RunMode::Local`) or on a dedicated worker (`RunMode::Remote`)
//! - `Task`: the lifecycle contract implemented by units of work
//! - `Event`: immutable, shared messages fanned out to subscribed tasks
//! - `ThreadPool`: a name-keyed registry of schedulers
//! - `IdGenerator`: opaque, non-sequential identifiers
//!
//! Tasks never run concurrently inside one `Thread`; separate `Thread`s run in
//! parallel. Work submitted while a tick is in progress becomes visible on the
//! next tick only.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod event;
pub mod id;
pub mod pool;
pub mod state;
pub mod task;
mod task_data;
pub mod thread;

pub use event::{Event, EventBuilder, EventType, Param};
pub use id::{IdGenerator, IdValue};
pub use pool::ThreadPool;
pub use state::State;
pub use task::{from_fn, FnTask, Task, TaskError, TaskId, TaskOptions, TaskResult};
pub use thread::{RunMode, Thread, ThreadError, ThreadHandle, ThreadOptions, ThreadStats};
