//! Handling for tasks the executor cannot admit
//!
//! A task is rejected when the pool is shut down, or when every worker
//! slot up to `max_size` is taken and the queue is full. The executor then
//! hands the job to its [`RejectionPolicy`], whose result becomes the
//! result of `execute`.

use crate::error::ExecError;
use crate::executor::ThreadPoolExecutor;
use crate::task::Job;
use corepool_sync::SyncError;
use std::fmt;

/// Strategy for jobs that can be neither run nor queued
pub trait RejectionPolicy: Send + Sync {
    /// Dispose of `job`. Returning `Err` fails the submitting call.
    fn rejected(&self, job: Job, executor: &ThreadPoolExecutor) -> Result<(), ExecError>;

    /// Short name for log events
    fn name(&self) -> &'static str;
}

fn reason(executor: &ThreadPoolExecutor) -> &'static str {
    if executor.is_shutdown() {
        "executor is shut down"
    } else {
        "pool saturated and queue full"
    }
}

/// Fail the submission with [`ExecError::Rejected`] (the default)
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortPolicy;

impl RejectionPolicy for AbortPolicy {
    fn rejected(&self, job: Job, executor: &ThreadPoolExecutor) -> Result<(), ExecError> {
        drop(job);
        Err(ExecError::rejected(reason(executor)))
    }

    fn name(&self) -> &'static str {
        "abort"
    }
}

/// Run the job on the submitting thread; drop it once shut down
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerRunsPolicy;

impl RejectionPolicy for CallerRunsPolicy {
    fn rejected(&self, job: Job, executor: &ThreadPoolExecutor) -> Result<(), ExecError> {
        if !executor.is_shutdown() {
            job.run();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "caller-runs"
    }
}

/// Silently drop the job
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardPolicy;

impl RejectionPolicy for DiscardPolicy {
    fn rejected(&self, job: Job, _executor: &ThreadPoolExecutor) -> Result<(), ExecError> {
        drop(job);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discard"
    }
}

/// Drop the oldest queued job and submit this one again
///
/// Once shut down, or when there is no queued job to make room with (as
/// with a zero-capacity queue), the new job is dropped instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOldestPolicy;

impl RejectionPolicy for DiscardOldestPolicy {
    fn rejected(&self, job: Job, executor: &ThreadPoolExecutor) -> Result<(), ExecError> {
        if executor.is_shutdown() {
            return Ok(());
        }
        match executor.queue().poll() {
            Some(oldest) => {
                drop(oldest);
                executor.execute_job(job)
            }
            None => {
                drop(job);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "discard-oldest"
    }
}

/// Wait for queue space while the pool is running
///
/// Turns saturation into back-pressure on the submitter. Fails with
/// [`ExecError::Rejected`] once shut down and with
/// [`ExecError::Sync`] if the submitter is interrupted while waiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockPolicy;

impl RejectionPolicy for BlockPolicy {
    fn rejected(&self, job: Job, executor: &ThreadPoolExecutor) -> Result<(), ExecError> {
        if executor.is_shutdown() {
            return Err(ExecError::rejected(reason(executor)));
        }
        let id = job.id();
        if let Err(e) = executor.queue().put(job) {
            return Err(SyncError::from(e).into());
        }
        // Shut down while we waited: take it back unless a worker has it
        if executor.is_shutdown() && executor.queue().remove_where(&mut |j: &Job| j.id() == id).is_some() {
            return Err(ExecError::rejected(reason(executor)));
        }
        // The last worker may have retired while we waited
        executor.ensure_queue_worker();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "block"
    }
}

impl<'a> fmt::Debug for dyn RejectionPolicy + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
