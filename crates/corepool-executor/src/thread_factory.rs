//! Worker thread creation
//!
//! The executor never spawns threads directly. It hands each worker's run
//! loop to a [`ThreadFactory`], gets back an [`UnstartedThread`], registers
//! the worker, and only then starts the thread.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Work a worker thread runs
pub type ThreadBody = Box<dyn FnOnce() + Send + 'static>;

/// Produces not-yet-started threads for the executor
pub trait ThreadFactory: Send + Sync {
    /// Wrap `body` in a thread that has not started running
    fn new_thread(&self, body: ThreadBody) -> UnstartedThread;
}

/// A configured thread plus the work it will run
pub struct UnstartedThread {
    builder: thread::Builder,
    body: ThreadBody,
}

impl UnstartedThread {
    pub fn new(builder: thread::Builder, body: ThreadBody) -> Self {
        Self { builder, body }
    }

    /// Spawn the OS thread
    pub fn start(self) -> io::Result<JoinHandle<()>> {
        self.builder.spawn(self.body)
    }
}

impl fmt::Debug for UnstartedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnstartedThread").finish_non_exhaustive()
    }
}

/// Names threads `<prefix>-<n>` with an optional fixed stack size
#[derive(Debug)]
pub struct DefaultThreadFactory {
    prefix: String,
    stack_size: Option<usize>,
    next: AtomicUsize,
}

impl DefaultThreadFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stack_size: None,
            next: AtomicUsize::new(1),
        }
    }

    pub fn stack_size(mut self, size: Option<usize>) -> Self {
        self.stack_size = size;
        self
    }
}

impl ThreadFactory for DefaultThreadFactory {
    fn new_thread(&self, body: ThreadBody) -> UnstartedThread {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.prefix, n));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        UnstartedThread::new(builder, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_sequential() {
        let factory = DefaultThreadFactory::new("pool").stack_size(Some(128 * 1024));
        let names: Vec<String> = (0..3)
            .map(|_| {
                factory
                    .new_thread(Box::new(|| {}))
                    .start()
                    .unwrap()
                    .thread()
                    .name()
                    .map(str::to_owned)
                    .unwrap_or_default()
            })
            .collect();
        assert_eq!(names, ["pool-1", "pool-2", "pool-3"]);
    }

    #[test]
    fn test_body_does_not_run_until_started() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let ran = Arc::new(AtomicBool::new(false));
        let r2 = Arc::clone(&ran);
        let t = DefaultThreadFactory::new("lazy").new_thread(Box::new(move || {
            r2.store(true, Ordering::SeqCst);
        }));
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(!ran.load(Ordering::SeqCst));

        t.start().unwrap().join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
