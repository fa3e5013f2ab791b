//! Thread pool executor
//!
//! # Admission
//!
//! `execute` walks three steps, re-reading the control word between them:
//!
//! 1. Fewer than `core_size` workers: start a core worker with the task
//!    as its first task.
//! 2. Running and the queue accepts the task: done, after a re-check. If
//!    the pool stopped running meanwhile, the task is pulled back out of
//!    the queue and rejected; if a worker already took it, it runs and is
//!    not rejected (at most one rejection, never exactly one). If no
//!    worker is left, one is started so the task is not stranded.
//! 3. Otherwise start a non-core worker (up to `max_size`) with the task,
//!    or hand it to the rejection policy.
//!
//! # Worker lifecycle
//!
//! ```text
//!   add_worker ──► run first task ──► get_task ──► run ──► get_task ...
//!                                         │
//!            shutdown + empty queue ──────┤
//!            idle past keep_alive ────────┴──► exit: deregister, try_terminate
//! ```
//!
//! `get_task` blocks in `take()` for core workers and in
//! `poll_timeout(keep_alive)` for evictable ones. Shutdown interrupts
//! every idle worker so blocked `take()` calls return and see the new run
//! state; each exiting worker passes the interrupt on to one more idle
//! worker, so shutdown reaches workers that raced past the first sweep.
//!
//! A panicking task kills its worker thread (the panic resumes after the
//! bookkeeping). The pool keeps running with one fewer worker.

use crate::config::ExecutorConfig;
use crate::ctl::{self, Ctl, RunState};
use crate::error::{ExecError, ExecResult};
use crate::future::{self, TaskHandle};
use crate::rejection::{AbortPolicy, RejectionPolicy};
use crate::task::{Job, Task};
use crate::thread_factory::{DefaultThreadFactory, ThreadFactory};
use crate::worker::Worker;
use corepool_sync::{ArrayBlockingQueue, BlockingQueue, Condition, ReentrantMutex, SyncResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{self, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// State guarded by the main lock
struct Registry {
    workers: HashMap<u64, Arc<Worker>>,
    largest_pool_size: usize,
    /// Completed counts folded in from exited workers
    completed_tasks: u64,
}

struct PoolInner {
    ctl: Ctl,
    main_lock: ReentrantMutex<RefCell<Registry>>,
    /// Signalled on TERMINATED; bound to `main_lock`
    termination: Condition,
    queue: Arc<dyn BlockingQueue<Job>>,
    policy: Box<dyn RejectionPolicy>,
    factory: Box<dyn ThreadFactory>,
    core_size: usize,
    max_size: usize,
    keep_alive: Duration,
    allow_core_timeout: bool,
    next_job_id: AtomicU64,
    next_worker_id: AtomicU64,
}

/// `add_worker` did not start a thread
struct AddWorkerFailed {
    job: Option<Job>,
    spawn_error: Option<io::Error>,
}

impl AddWorkerFailed {
    fn refused(job: Option<Job>) -> Self {
        Self {
            job,
            spawn_error: None,
        }
    }

    /// Only valid when `add_worker` was given a first task
    fn into_job(self) -> Job {
        match self.job {
            Some(job) => job,
            None => unreachable!("add_worker hands its first task back"),
        }
    }
}

/// Runs the exit bookkeeping even when the worker unwinds
struct ExitGuard<'a> {
    inner: &'a Arc<PoolInner>,
    worker: &'a Arc<Worker>,
    abrupt: bool,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.inner.process_worker_exit(self.worker, self.abrupt);
    }
}

impl PoolInner {
    fn new_job(&self, task: Task) -> Job {
        Job::new(self.next_job_id.fetch_add(1, Ordering::Relaxed), task)
    }

    /// Reserve a worker slot, register a worker and start its thread
    fn add_worker(self: &Arc<Self>, first: Option<Job>, core: bool) -> Result<(), AddWorkerFailed> {
        'retry: loop {
            let mut c = self.ctl.get();
            let rs = ctl::run_state_of(c);

            // After shutdown only queue-draining workers may be added
            if rs >= RunState::Shutdown
                && !(rs == RunState::Shutdown && first.is_none() && !self.queue.is_empty())
            {
                return Err(AddWorkerFailed::refused(first));
            }

            loop {
                let wc = ctl::worker_count_of(c);
                let bound = if core { self.core_size } else { self.max_size };
                if wc >= ctl::CAPACITY || wc >= bound {
                    return Err(AddWorkerFailed::refused(first));
                }
                if self.ctl.compare_and_increment(c) {
                    break 'retry;
                }
                c = self.ctl.get();
                if ctl::run_state_of(c) != rs {
                    continue 'retry;
                }
            }
        }

        let has_first = first.is_some();
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let worker = Arc::new(Worker::new(id, first));
        let thread = {
            let inner = Arc::clone(self);
            let w = Arc::clone(&worker);
            self.factory
                .new_thread(Box::new(move || run_worker(inner, w)))
        };

        let registered = {
            let g = self.main_lock.lock();
            let rs = ctl::run_state_of(self.ctl.get());
            if rs == RunState::Running || (rs == RunState::Shutdown && !has_first) {
                let mut reg = g.borrow_mut();
                reg.workers.insert(id, Arc::clone(&worker));
                let size = reg.workers.len();
                if size > reg.largest_pool_size {
                    reg.largest_pool_size = size;
                }
                true
            } else {
                false
            }
        };

        let spawn_error = if registered {
            match thread.start() {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(worker = id, error = %e, "failed to start worker thread");
                    Some(e)
                }
            }
        } else {
            None
        };

        self.add_worker_failed(&worker);
        Err(AddWorkerFailed {
            job: worker.take_first_task(),
            spawn_error,
        })
    }

    /// Undo a reservation made by `add_worker`
    fn add_worker_failed(self: &Arc<Self>, worker: &Worker) {
        {
            let g = self.main_lock.lock();
            g.borrow_mut().workers.remove(&worker.id());
        }
        self.ctl.decrement_worker_count();
        self.try_terminate();
    }

    /// Next task for `worker`, or `None` when it should exit
    ///
    /// On `None` the worker count has already been decremented.
    fn get_task(&self, worker: &Worker) -> Option<Job> {
        let mut timed_out = false;
        loop {
            let c = self.ctl.get();

            if ctl::run_state_at_least(c, RunState::Shutdown)
                && (ctl::run_state_at_least(c, RunState::Stop) || self.queue.is_empty())
            {
                self.ctl.decrement_worker_count();
                return None;
            }

            let wc = ctl::worker_count_of(c);
            let timed = self.allow_core_timeout || wc > self.core_size;

            // The last worker stays while tasks are queued
            if (wc > self.max_size || (timed && timed_out)) && (wc > 1 || self.queue.is_empty()) {
                if self.ctl.compare_and_decrement(c) {
                    debug!(
                        worker = worker.id(),
                        keep_alive_ms = self.keep_alive.as_millis() as u64,
                        "idle worker evicted"
                    );
                    return None;
                }
                continue;
            }

            let polled = if timed {
                self.queue.poll_timeout(self.keep_alive)
            } else {
                self.queue.take().map(Some)
            };
            match polled {
                Ok(Some(job)) => return Some(job),
                Ok(None) => timed_out = true,
                // Interrupted: loop to re-read the run state
                Err(_) => timed_out = false,
            }
        }
    }

    /// Deregister an exiting worker
    fn process_worker_exit(self: &Arc<Self>, worker: &Worker, abrupt: bool) {
        // A clean exit already decremented in get_task
        if abrupt {
            self.ctl.decrement_worker_count();
        }
        {
            let g = self.main_lock.lock();
            let mut reg = g.borrow_mut();
            reg.completed_tasks += worker.completed_tasks();
            reg.workers.remove(&worker.id());
        }

        let c = self.ctl.get();
        debug!(
            worker = worker.id(),
            abrupt,
            workers = ctl::worker_count_of(c),
            "worker exited"
        );

        self.try_terminate();

        // Never strand queued tasks with no worker left to run them
        let c = self.ctl.get();
        if !ctl::run_state_at_least(c, RunState::Stop)
            && ctl::worker_count_of(c) == 0
            && !self.queue.is_empty()
        {
            let _ = self.add_worker(None, false);
        }
    }

    /// Move to TERMINATED if shut down with no workers and no queued tasks
    fn try_terminate(&self) {
        loop {
            let c = self.ctl.get();
            if ctl::is_running(c)
                || ctl::run_state_at_least(c, RunState::Tidying)
                || (ctl::run_state_of(c) == RunState::Shutdown && !self.queue.is_empty())
            {
                return;
            }

            if ctl::worker_count_of(c) != 0 {
                // Pass the shutdown wake-up along
                self.interrupt_idle_workers(true);
                return;
            }

            let g = self.main_lock.lock();
            if self
                .ctl
                .compare_and_set(c, ctl::ctl_of(RunState::Tidying, 0))
            {
                self.ctl.set(ctl::ctl_of(RunState::Terminated, 0));
                self.termination.signal_all();
                drop(g);
                info!("executor terminated");
                return;
            }
            // Lost a race on the control word; retry
        }
    }

    fn interrupt_idle_workers(&self, only_one: bool) {
        let g = self.main_lock.lock();
        let reg = g.borrow();
        for w in reg.workers.values() {
            w.interrupt_if_idle();
            if only_one {
                break;
            }
        }
    }
}

/// Worker thread body
fn run_worker(inner: Arc<PoolInner>, worker: Arc<Worker>) {
    let me = worker.bind_current_thread();
    // Pairs with the fence in shutdown(): the sweep sees our handle or we
    // see the new run state
    atomic::fence(Ordering::SeqCst);
    debug!(
        worker = worker.id(),
        workers = ctl::worker_count_of(inner.ctl.get()),
        "worker started"
    );

    let mut exit = ExitGuard {
        inner: &inner,
        worker: &worker,
        abrupt: true,
    };
    let mut next = worker.take_first_task();

    loop {
        let job = match next.take() {
            Some(job) => job,
            None => match inner.get_task(&worker) {
                Some(job) => job,
                None => break,
            },
        };

        let busy = worker.begin_task();
        // An interrupt meant for the idle worker must not leak into the task
        me.clear_interrupt();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run()));
        worker.task_done();
        drop(busy);

        if let Err(payload) = outcome {
            warn!(
                worker = worker.id(),
                panic = %future::panic_message(payload.as_ref()),
                "task panicked, worker exiting"
            );
            panic::resume_unwind(payload);
        }
    }

    exit.abrupt = false;
}

/// A pool of worker threads fed by a bounded blocking queue
///
/// Cloning yields another handle to the same pool. Dropping handles does
/// not stop the pool; call [`shutdown`](Self::shutdown).
///
/// # Example
///
/// ```
/// use corepool_executor::{ExecutorConfig, ThreadPoolExecutor};
/// use std::time::Duration;
///
/// let pool = ThreadPoolExecutor::new(ExecutorConfig::new().core_size(2).max_size(4))?;
/// let handle = pool.submit_callable(|| 6 * 7)?;
/// assert_eq!(handle.get(), Ok(42));
///
/// pool.shutdown();
/// assert!(pool.await_termination(Duration::from_secs(5))?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ThreadPoolExecutor {
    inner: Arc<PoolInner>,
}

/// Assembles a [`ThreadPoolExecutor`] with custom collaborators
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    queue: Option<Arc<dyn BlockingQueue<Job>>>,
    factory: Option<Box<dyn ThreadFactory>>,
    policy: Option<Box<dyn RejectionPolicy>>,
}

impl ExecutorBuilder {
    /// Use `queue` for pending tasks instead of an `ArrayBlockingQueue`
    /// sized from the config
    pub fn queue(mut self, queue: Arc<dyn BlockingQueue<Job>>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn thread_factory(mut self, factory: impl ThreadFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Defaults to [`AbortPolicy`]
    pub fn rejection_policy(mut self, policy: impl RejectionPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn build(self) -> ExecResult<ThreadPoolExecutor> {
        let config = self.config;
        config.validate()?;

        let queue = self.queue.unwrap_or_else(|| {
            Arc::new(ArrayBlockingQueue::with_fairness(
                config.queue_capacity,
                config.fair,
            ))
        });
        let factory = self.factory.unwrap_or_else(|| {
            Box::new(
                DefaultThreadFactory::new(config.thread_name.clone())
                    .stack_size(config.stack_size),
            )
        });
        let policy = self.policy.unwrap_or_else(|| Box::new(AbortPolicy));

        let main_lock = ReentrantMutex::new(RefCell::new(Registry {
            workers: HashMap::new(),
            largest_pool_size: 0,
            completed_tasks: 0,
        }));
        let termination = main_lock.new_condition();

        debug!(
            core_size = config.core_size,
            max_size = config.max_size,
            queue_capacity = queue.capacity(),
            policy = policy.name(),
            "executor created"
        );

        Ok(ThreadPoolExecutor {
            inner: Arc::new(PoolInner {
                ctl: Ctl::new(),
                main_lock,
                termination,
                queue,
                policy,
                factory,
                core_size: config.core_size,
                max_size: config.max_size,
                keep_alive: config.keep_alive,
                allow_core_timeout: config.allow_core_timeout,
                next_job_id: AtomicU64::new(1),
                next_worker_id: AtomicU64::new(1),
            }),
        })
    }
}

impl ThreadPoolExecutor {
    /// Build a pool with the default queue, thread factory and policy
    pub fn new(config: ExecutorConfig) -> ExecResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ExecutorConfig) -> ExecutorBuilder {
        ExecutorBuilder {
            config,
            queue: None,
            factory: None,
            policy: None,
        }
    }

    /// Run `task` on some pool thread, eventually
    ///
    /// # Errors
    ///
    /// Whatever the rejection policy returns when the task cannot be
    /// admitted; [`ExecError::Rejected`] under the default policy.
    pub fn execute<F>(&self, task: F) -> ExecResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_job(self.inner.new_job(Box::new(task)))
    }

    /// Same as [`execute`](Self::execute)
    pub fn submit<F>(&self, task: F) -> ExecResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(task)
    }

    /// Run `task` and complete the handle with `result` afterwards
    pub fn submit_with_result<F, R>(&self, task: F, result: R) -> ExecResult<TaskHandle<R>>
    where
        F: FnOnce() + Send + 'static,
        R: Send + 'static,
    {
        self.submit_callable(move || {
            task();
            result
        })
    }

    /// Run `f` and complete the handle with its return value
    pub fn submit_callable<F, R>(&self, f: F) -> ExecResult<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (handle, completer) = future::task_pair();
        self.execute(move || completer.complete_with(f))?;
        Ok(handle)
    }

    /// Execute each task in order, stopping at the first error
    ///
    /// Returns how many tasks were accepted.
    pub fn execute_all<I, F>(&self, tasks: I) -> ExecResult<usize>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        let mut accepted = 0;
        for task in tasks {
            self.execute(task)?;
            accepted += 1;
        }
        Ok(accepted)
    }

    /// Admit an already-built job; the entry point rejection policies use
    /// to resubmit
    pub fn execute_job(&self, job: Job) -> ExecResult<()> {
        let inner = &self.inner;
        let mut job = job;

        let mut c = inner.ctl.get();
        if ctl::worker_count_of(c) < inner.core_size {
            match inner.add_worker(Some(job), true) {
                Ok(()) => return Ok(()),
                Err(failed) => job = failed.into_job(),
            }
            c = inner.ctl.get();
        }

        if ctl::is_running(c) {
            let id = job.id();
            match inner.queue.offer(job) {
                Ok(()) => {
                    let recheck = inner.ctl.get();
                    if !ctl::is_running(recheck) {
                        if let Some(job) = inner.queue.remove_where(&mut |j: &Job| j.id() == id) {
                            return self.reject(job);
                        }
                    }
                    if ctl::worker_count_of(recheck) == 0 {
                        self.ensure_queue_worker();
                    }
                    return Ok(());
                }
                Err(e) => job = e.into_inner(),
            }
        }

        match inner.add_worker(Some(job), false) {
            Ok(()) => Ok(()),
            Err(failed) => self.reject(failed.into_job()),
        }
    }

    /// Start a worker if tasks may be queued but none is left to run them
    pub(crate) fn ensure_queue_worker(&self) {
        if ctl::worker_count_of(self.inner.ctl.get()) == 0 {
            let _ = self.inner.add_worker(None, false);
        }
    }

    fn reject(&self, job: Job) -> ExecResult<()> {
        debug!(job = job.id(), policy = self.inner.policy.name(), "task rejected");
        self.inner.policy.rejected(job, self)
    }

    /// Stop admitting tasks; queued tasks still run
    ///
    /// Idle workers are woken so they can exit once the queue is drained.
    /// Busy workers finish their current task first. Calling this more
    /// than once has no further effect.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        {
            let _g = inner.main_lock.lock();
            inner.ctl.advance_run_state(RunState::Shutdown);
            atomic::fence(Ordering::SeqCst);
            inner.interrupt_idle_workers(false);
        }
        info!(
            workers = ctl::worker_count_of(inner.ctl.get()),
            queued = inner.queue.len(),
            "executor shutdown requested"
        );
        inner.try_terminate();
    }

    /// Whether the pool has stopped accepting tasks
    pub fn is_shutdown(&self) -> bool {
        !ctl::is_running(self.inner.ctl.get())
    }

    /// Shut down but not yet terminated
    pub fn is_terminating(&self) -> bool {
        let c = self.inner.ctl.get();
        !ctl::is_running(c) && !ctl::run_state_at_least(c, RunState::Terminated)
    }

    pub fn is_terminated(&self) -> bool {
        ctl::run_state_at_least(self.inner.ctl.get(), RunState::Terminated)
    }

    pub fn run_state(&self) -> RunState {
        ctl::run_state_of(self.inner.ctl.get())
    }

    /// Block until terminated or `timeout` elapses
    ///
    /// Returns `Ok(true)` once terminated, `Ok(false)` on timeout.
    pub fn await_termination(&self, timeout: Duration) -> SyncResult<bool> {
        let inner = &self.inner;
        let _g = inner.main_lock.lock_interruptibly()?;
        let mut remaining = timeout;
        loop {
            if ctl::run_state_at_least(inner.ctl.get(), RunState::Terminated) {
                return Ok(true);
            }
            if remaining.is_zero() {
                return Ok(false);
            }
            remaining = inner.termination.wait_timeout(remaining)?;
        }
    }

    /// Start one idle core worker if below `core_size`
    ///
    /// Returns whether a worker was started.
    pub fn prestart_core_thread(&self) -> ExecResult<bool> {
        if ctl::worker_count_of(self.inner.ctl.get()) >= self.inner.core_size {
            return Ok(false);
        }
        match self.inner.add_worker(None, true) {
            Ok(()) => Ok(true),
            Err(AddWorkerFailed {
                spawn_error: Some(e),
                ..
            }) => Err(ExecError::Spawn(e)),
            Err(_) => Ok(false),
        }
    }

    /// Start idle core workers up to `core_size`, returning how many
    pub fn prestart_all_core_threads(&self) -> ExecResult<usize> {
        let mut started = 0;
        while self.prestart_core_thread()? {
            started += 1;
        }
        Ok(started)
    }

    /// Current number of workers
    pub fn pool_size(&self) -> usize {
        let g = self.inner.main_lock.lock();
        if ctl::run_state_at_least(self.inner.ctl.get(), RunState::Tidying) {
            return 0;
        }
        let n = g.borrow().workers.len();
        n
    }

    /// Approximate number of workers running a task
    pub fn active_count(&self) -> usize {
        let g = self.inner.main_lock.lock();
        let n = g.borrow().workers.values().filter(|w| w.is_busy()).count();
        n
    }

    /// Most workers ever alive at once
    pub fn largest_pool_size(&self) -> usize {
        let g = self.inner.main_lock.lock();
        let n = g.borrow().largest_pool_size;
        n
    }

    /// Approximate number of tasks that have finished running
    pub fn completed_task_count(&self) -> u64 {
        let g = self.inner.main_lock.lock();
        let reg = g.borrow();
        reg.completed_tasks
            + reg
                .workers
                .values()
                .map(|w| w.completed_tasks())
                .sum::<u64>()
    }

    /// The pending-task queue
    pub fn queue(&self) -> &dyn BlockingQueue<Job> {
        &*self.inner.queue
    }

    pub fn core_size(&self) -> usize {
        self.inner.core_size
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn keep_alive(&self) -> Duration {
        self.inner.keep_alive
    }

    pub fn allows_core_thread_timeout(&self) -> bool {
        self.inner.allow_core_timeout
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.inner.ctl.get();
        f.debug_struct("ThreadPoolExecutor")
            .field("run_state", &ctl::run_state_of(c))
            .field("workers", &ctl::worker_count_of(c))
            .field("queued", &self.inner.queue.len())
            .field("core_size", &self.inner.core_size)
            .field("max_size", &self.inner.max_size)
            .field("policy", &self.inner.policy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::testing::{wait_until, Gate};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn config(core: usize, max: usize, queue: usize) -> ExecutorConfig {
        ExecutorConfig::new()
            .core_size(core)
            .max_size(max)
            .queue_capacity(queue)
            .keep_alive(Duration::from_millis(50))
            .thread_name("test-pool")
    }

    fn finish(pool: &ThreadPoolExecutor) {
        pool.shutdown();
        assert_eq!(pool.await_termination(Duration::from_secs(10)), Ok(true));
    }

    #[test]
    fn test_runs_every_task() {
        let pool = ThreadPoolExecutor::new(config(2, 4, 256)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        finish(&pool);
        assert_eq!(counter.load(Ordering::SeqCst), 200);
        assert_eq!(pool.completed_task_count(), 200);
        assert_eq!(pool.pool_size(), 0);
        assert!(pool.is_terminated());
    }

    #[test]
    fn test_saturated_pool_rejects() {
        // Zero-capacity queue: always full
        let pool = ThreadPoolExecutor::new(config(2, 2, 0)).unwrap();
        let gate = Gate::new();

        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            pool.execute(move || gate.wait()).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || pool.active_count() == 2));

        let err = pool.execute(|| {}).unwrap_err();
        assert!(err.is_rejected());
        assert_eq!(err.to_string(), "task rejected: pool saturated and queue full");

        gate.open();
        finish(&pool);
        assert_eq!(pool.completed_task_count(), 2);
    }

    #[test]
    fn test_worker_bound() {
        let pool = ThreadPoolExecutor::new(config(2, 4, 2)).unwrap();
        let gate = Gate::new();
        let ran = Arc::new(AtomicUsize::new(0));

        // 2 core workers, 2 queued, 2 non-core workers
        for _ in 0..6 {
            let (gate, ran) = (Arc::clone(&gate), Arc::clone(&ran));
            pool.execute(move || {
                gate.wait();
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(pool.pool_size(), 4);
        assert_eq!(pool.queue().len(), 2);
        assert!(pool.execute(|| {}).unwrap_err().is_rejected());

        gate.open();
        finish(&pool);
        assert_eq!(ran.load(Ordering::SeqCst), 6);
        assert_eq!(pool.largest_pool_size(), 4);
    }

    #[test]
    fn test_shutdown_wakes_idle_worker() {
        let pool = ThreadPoolExecutor::new(config(1, 1, 4)).unwrap();
        assert!(pool.prestart_core_thread().unwrap());
        assert!(!pool.prestart_core_thread().unwrap());
        assert_eq!(pool.pool_size(), 1);

        // Let the worker block in take()
        thread::sleep(Duration::from_millis(20));
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert_eq!(pool.await_termination(Duration::from_secs(5)), Ok(true));
        assert_eq!(pool.run_state(), RunState::Terminated);
        assert!(!pool.is_terminating());

        let err = pool.execute(|| {}).unwrap_err();
        assert_eq!(err.to_string(), "task rejected: executor is shut down");
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = ThreadPoolExecutor::new(config(1, 1, 8)).unwrap();
        let gate = Gate::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let (gate, ran) = (Arc::clone(&gate), Arc::clone(&ran));
            pool.execute(move || {
                gate.wait();
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert!(pool.is_terminating());
        assert!(pool.execute(|| {}).unwrap_err().is_rejected());
        assert_eq!(pool.await_termination(Duration::from_millis(20)), Ok(false));

        gate.open();
        assert_eq!(pool.await_termination(Duration::from_secs(10)), Ok(true));
        assert_eq!(ran.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_idle_non_core_workers_evicted() {
        let pool = ThreadPoolExecutor::new(config(1, 3, 0)).unwrap();
        let gate = Gate::new();

        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            pool.execute(move || gate.wait()).unwrap();
        }
        assert_eq!(pool.pool_size(), 3);

        gate.open();
        assert!(wait_until(Duration::from_secs(5), || pool.pool_size() == 1));
        // The core worker stays
        thread::sleep(Duration::from_millis(150));
        assert_eq!(pool.pool_size(), 1);
        assert_eq!(pool.largest_pool_size(), 3);
        finish(&pool);
    }

    #[test]
    fn test_core_timeout() {
        let cfg = config(2, 2, 4)
            .keep_alive(Duration::from_millis(200))
            .allow_core_timeout(true);
        let pool = ThreadPoolExecutor::new(cfg).unwrap();
        assert!(pool.allows_core_thread_timeout());
        assert_eq!(pool.prestart_all_core_threads().unwrap(), 2);

        assert!(wait_until(Duration::from_secs(5), || pool.pool_size() == 0));
        assert!(!pool.is_shutdown());

        // Still usable after every worker timed out
        let handle = pool.submit_callable(|| 3).unwrap();
        assert_eq!(handle.get(), Ok(3));
        finish(&pool);
    }

    #[test]
    fn test_panicking_task_does_not_kill_pool() {
        let pool = ThreadPoolExecutor::new(config(1, 1, 8)).unwrap();

        pool.execute(|| panic!("task blew up")).unwrap();
        let handle = pool.submit_callable(|| 42).unwrap();
        assert_eq!(handle.get(), Ok(42));

        // Captured panics leave the worker alive
        let failed = pool.submit_callable(|| -> u8 { panic!("inside handle") }).unwrap();
        assert_eq!(failed.get(), Err(TaskError::Panicked("inside handle".into())));
        let handle = pool.submit_callable(|| 7).unwrap();
        assert_eq!(handle.get(), Ok(7));
        finish(&pool);
    }

    #[test]
    fn test_submit_with_result() {
        let pool = ThreadPoolExecutor::new(config(2, 2, 8)).unwrap();
        let flag = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&flag);
        let handle = pool
            .submit_with_result(move || { f.store(1, Ordering::SeqCst); }, "done")
            .unwrap();
        assert_eq!(handle.get(), Ok("done"));
        assert_eq!(flag.load(Ordering::SeqCst), 1);
        finish(&pool);
    }

    #[test]
    fn test_rejected_callable_reports_error() {
        let pool = ThreadPoolExecutor::new(config(1, 1, 1)).unwrap();
        pool.shutdown();
        let err = pool.submit_callable(|| 1).unwrap_err();
        assert!(err.is_rejected());
    }

    #[test]
    fn test_execute_all() {
        let pool = ThreadPoolExecutor::new(config(2, 2, 64)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks = (0..10).map(|_| {
            let counter = Arc::clone(&counter);
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(pool.execute_all(tasks).unwrap(), 10);
        finish(&pool);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_shutdown_from_inside_task() {
        let pool = ThreadPoolExecutor::new(config(2, 2, 8)).unwrap();
        let p = pool.clone();
        pool.execute(move || p.shutdown()).unwrap();
        assert_eq!(pool.await_termination(Duration::from_secs(5)), Ok(true));
    }

    #[test]
    fn test_invalid_config() {
        let err = ThreadPoolExecutor::new(config(4, 2, 8)).unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));
    }

    #[test]
    fn test_concurrent_submitters() {
        let pool = ThreadPoolExecutor::new(config(4, 8, 1024)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..4)
            .map(|_| {
                let (pool, counter) = (pool.clone(), Arc::clone(&counter));
                thread::spawn(move || {
                    for _ in 0..100 {
                        let counter = Arc::clone(&counter);
                        pool.execute(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for s in submitters {
            s.join().unwrap();
        }

        finish(&pool);
        assert_eq!(counter.load(Ordering::SeqCst), 400);
        assert!(pool.largest_pool_size() <= 8);
    }

    #[test]
    fn test_unbounded_keep_alive_and_termination_wait() {
        let cfg = config(1, 3, 0).keep_alive(Duration::MAX);
        let pool = ThreadPoolExecutor::new(cfg).unwrap();
        let gate = Gate::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let (gate, ran) = (Arc::clone(&gate), Arc::clone(&ran));
            pool.execute(move || {
                gate.wait();
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        gate.open();
        assert!(wait_until(Duration::from_secs(5), || ran.load(Ordering::SeqCst) == 3));

        // Idle non-core workers wait instead of dying
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.pool_size(), 3);

        pool.shutdown();
        assert_eq!(pool.await_termination(Duration::MAX), Ok(true));
    }
}
