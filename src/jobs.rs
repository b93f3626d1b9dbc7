//! Job Waiter
//!
//! Mutating calls on the appliance return a job id; the change is only done
//! once the job reaches a terminal state. [`JobWaiter::await_job`] polls the
//! job until then:
//!
//! ```text
//! WAITING ──► RUNNING ──► SUCCESS | FAILED | ABORTED
//!    └──────────────────────► (fast jobs skip RUNNING)
//! ```
//!
//! Polling starts at `poll_interval` and doubles after each non-terminal
//! observation, capped at `max_interval`. No sleep extends past the deadline;
//! the final poll happens at the deadline itself, so a timeout is reported
//! within one interval of it. The waiter never resubmits the operation.

use crate::clock::Clock;
use crate::config::JobConfig;
use crate::error::{Result, SyncError};
use crate::truenas::types::{Job, JobState};
use crate::truenas::ApplianceApi;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub poll_interval: Duration,
    pub max_interval: Duration,
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn fixed(poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            poll_interval,
            max_interval: poll_interval,
            deadline,
        }
    }
}

impl From<&JobConfig> for PollPolicy {
    fn from(config: &JobConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_interval: Duration::from_millis(config.max_poll_interval_ms),
            deadline: Duration::from_secs(config.timeout_seconds),
        }
    }
}

pub struct JobWaiter<C: Clock> {
    clock: C,
    policy: PollPolicy,
}

impl<C: Clock> JobWaiter<C> {
    pub fn new(clock: C, policy: PollPolicy) -> Self {
        Self { clock, policy }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Poll `job_id` until it is terminal
    ///
    /// Returns the `SUCCESS` record; `FAILED`/`ABORTED` become
    /// [`SyncError::JobFailed`], an expired deadline [`SyncError::JobTimeout`].
    pub async fn await_job<A>(&self, api: &A, job_id: i64) -> Result<Job>
    where
        A: ApplianceApi + ?Sized,
    {
        let started = self.clock.now();
        let mut interval = self.policy.poll_interval;
        let mut polls = 0u32;

        loop {
            let job = api.get_job(job_id).await?;
            polls += 1;
            debug!("Job {} is {} (poll {})", job_id, job.state, polls);

            match job.state {
                JobState::Success => {
                    info!("Job {} succeeded after {} polls", job_id, polls);
                    return Ok(job);
                }
                JobState::Failed | JobState::Aborted => {
                    return Err(SyncError::JobFailed {
                        job_id,
                        state: job.state,
                        message: job
                            .error
                            .unwrap_or_else(|| "no error message reported".to_string()),
                    });
                }
                JobState::Waiting | JobState::Running => {}
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.policy.deadline {
                return Err(SyncError::JobTimeout {
                    job_id,
                    last_state: job.state,
                    elapsed,
                });
            }

            let remaining = self.policy.deadline - elapsed;
            self.clock.sleep(interval.min(remaining)).await;
            interval = (interval * 2).min(self.policy.max_interval.max(self.policy.poll_interval));
        }
    }
}
