//! Name-keyed registry of schedulers
//!
//! The pool owns one reference to each registered `Thread`. Removing a thread
//! from the pool releases that reference; once the last owner is gone the
//! scheduler is finished and its worker joined.

use crate::event::Event;
use crate::thread::{Thread, ThreadOptions};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Registry of schedulers for discovery and broadcast
pub struct ThreadPool {
    threads: RwLock<FxHashMap<String, Arc<Thread>>>,
}

impl ThreadPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create and register a scheduler named `name`.
    ///
    /// Returns None if the name is already taken.
    pub fn create_and_add_thread(&self, name: impl Into<String>) -> Option<Arc<Thread>> {
        self.create_and_add_thread_with(ThreadOptions::named(name))
    }

    /// Create and register a scheduler from options.
    ///
    /// Returns None if `options.name` is already taken.
    pub fn create_and_add_thread_with(&self, options: ThreadOptions) -> Option<Arc<Thread>> {
        let mut threads = self.threads.write();
        if threads.contains_key(&options.name) {
            return None;
        }

        let name = options.name.clone();
        let thread = Arc::new(Thread::with_options(options));
        threads.insert(name, thread.clone());
        Some(thread)
    }

    /// Look up a scheduler by name
    pub fn thread(&self, name: &str) -> Option<Arc<Thread>> {
        self.threads.read().get(name).cloned()
    }

    /// Unregister a scheduler, returning the pool's reference to it
    pub fn remove_thread(&self, name: &str) -> Option<Arc<Thread>> {
        self.threads.write().remove(name)
    }

    /// Send `event` to every registered scheduler. `None` is ignored.
    pub fn send_event(&self, event: impl Into<Option<Event>>) {
        let Some(event) = event.into() else {
            return;
        };
        for thread in self.threads.read().values() {
            thread.send_event(event.clone());
        }
    }

    /// Unregister every scheduler.
    ///
    /// Schedulers with no other owner are finished and joined before this
    /// returns.
    pub fn remove_threads(&self) {
        let removed: Vec<Arc<Thread>> = self
            .threads
            .write()
            .drain()
            .map(|(_, thread)| thread)
            .collect();
        tracing::debug!(count = removed.len(), "removing schedulers");
        drop(removed);
    }

    /// Number of registered schedulers
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all registered schedulers
    pub fn names(&self) -> Vec<String> {
        self.threads.read().keys().cloned().collect()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.remove_threads();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_registry() {
        let pool = ThreadPool::new();

        assert_eq!(pool.len(), 0);
        assert!(pool.is_empty());

        let net = pool.create_and_add_thread("net").unwrap();
        assert_eq!(net.name(), "net");
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_empty());

        pool.create_and_add_thread("console").unwrap();
        assert_eq!(pool.len(), 2);

        let found = pool.thread("net").unwrap();
        assert!(found.handle().ptr_eq(net.handle()));

        let mut names = pool.names();
        names.sort();
        assert_eq!(names, vec!["console".to_string(), "net".to_string()]);

        assert!(pool.remove_thread("net").is_some());
        assert_eq!(pool.len(), 1);
        assert!(pool.thread("net").is_none());
        assert!(pool.thread("console").is_some());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let pool = ThreadPool::new();

        let first = pool.create_and_add_thread("io").unwrap();
        assert!(pool.create_and_add_thread("io").is_none());
        assert!(pool
            .create_and_add_thread_with(ThreadOptions::named("io").with_initial_state(2u32))
            .is_none());

        // The first registration is untouched
        assert!(pool.thread("io").unwrap().handle().ptr_eq(first.handle()));
    }

    #[test]
    fn test_unknown_names_are_absent() {
        let pool = ThreadPool::new();

        assert!(pool.thread("missing").is_none());
        assert!(pool.remove_thread("missing").is_none());

        pool.send_event(None::<Event>);
        pool.remove_threads();
        assert!(pool.is_empty());
    }
}
