//! Job waiter tests
//!
//! Time is simulated with `ManualClock`, so deadlines of minutes run instantly.

mod common;

use common::*;
use std::time::Duration;
use truenas_cert_sync::clock::{Clock, ManualClock};
use truenas_cert_sync::error::SyncError;
use truenas_cert_sync::jobs::{JobWaiter, PollPolicy};
use truenas_cert_sync::truenas::types::JobState;
use truenas_cert_sync::truenas::ApplianceApi;

const SECOND: Duration = Duration::from_secs(1);

async fn submit(appliance: &FakeAppliance) -> i64 {
    appliance
        .create_certificate("homelab", CHAIN_A, &secrecy::SecretString::from(KEY))
        .await
        .unwrap()
}

fn polls(appliance: &FakeAppliance, job_id: i64) -> usize {
    appliance.count(|c| *c == Call::GetJob(job_id))
}

#[tokio::test]
async fn test_running_then_success_takes_n_plus_one_polls() {
    for n in [0usize, 1, 3, 10] {
        // Given: A job that reports RUNNING for n polls, then SUCCESS
        let mut plan = vec![JobState::Running; n];
        plan.push(JobState::Success);
        let appliance = FakeAppliance::new().with_job_plan(plan);
        let job_id = submit(&appliance).await;
        let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(SECOND, 60 * SECOND));

        // When: Awaiting the job
        let job = waiter.await_job(&appliance, job_id).await.unwrap();

        // Then: Terminal success after exactly n + 1 polls, within the deadline
        assert_eq!(job.state, JobState::Success);
        assert_eq!(polls(&appliance, job_id), n + 1);
        assert_eq!(waiter.clock().elapsed(), SECOND * n as u32);
        assert!(waiter.clock().elapsed() <= 60 * SECOND + SECOND);
    }
}

#[tokio::test]
async fn test_waiting_can_short_circuit_to_success() {
    // Given: A job that goes WAITING → SUCCESS without RUNNING
    let appliance = FakeAppliance::new().with_job_plan(vec![JobState::Waiting, JobState::Success]);
    let job_id = submit(&appliance).await;
    let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(SECOND, 10 * SECOND));

    // When: Awaiting
    let job = waiter.await_job(&appliance, job_id).await.unwrap();

    // Then: Success after two polls
    assert_eq!(job.state, JobState::Success);
    assert_eq!(polls(&appliance, job_id), 2);
}

#[tokio::test]
async fn test_never_finishing_job_times_out_at_deadline() {
    // Given: A job that stays RUNNING
    let appliance = FakeAppliance::new().with_job_plan(vec![JobState::Running]);
    let job_id = submit(&appliance).await;
    let deadline = 30 * SECOND;
    let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(2 * SECOND, deadline));

    // When: Awaiting
    let err = waiter.await_job(&appliance, job_id).await.unwrap_err();

    // Then: Timeout with last state RUNNING, elapsed within one interval of the deadline
    match err {
        SyncError::JobTimeout {
            job_id: reported,
            last_state,
            elapsed,
        } => {
            assert_eq!(reported, job_id);
            assert_eq!(last_state, JobState::Running);
            assert!(elapsed >= deadline);
            assert!(elapsed <= deadline + 2 * SECOND);
        }
        other => panic!("expected JobTimeout, got {:?}", other),
    }
    assert!(waiter.clock().elapsed() <= deadline + 2 * SECOND);
}

#[tokio::test]
async fn test_deadline_not_multiple_of_interval_is_respected() {
    // Given: Interval 4s, deadline 10s
    let appliance = FakeAppliance::new().with_job_plan(vec![JobState::Waiting]);
    let job_id = submit(&appliance).await;
    let waiter = JobWaiter::new(
        ManualClock::new(),
        PollPolicy::fixed(4 * SECOND, 10 * SECOND),
    );

    // When: Awaiting
    let err = waiter.await_job(&appliance, job_id).await.unwrap_err();

    // Then: The last sleep is shortened to land on the deadline
    assert!(matches!(
        err,
        SyncError::JobTimeout {
            last_state: JobState::Waiting,
            ..
        }
    ));
    assert_eq!(
        waiter.clock().sleeps(),
        vec![4 * SECOND, 4 * SECOND, 2 * SECOND]
    );
    assert_eq!(waiter.clock().elapsed(), 10 * SECOND);
}

#[tokio::test]
async fn test_backoff_doubles_up_to_cap() {
    // Given: Base interval 1s capped at 4s
    let appliance = FakeAppliance::new().with_job_plan(vec![
        JobState::Running,
        JobState::Running,
        JobState::Running,
        JobState::Running,
        JobState::Running,
        JobState::Success,
    ]);
    let job_id = submit(&appliance).await;
    let policy = PollPolicy {
        poll_interval: SECOND,
        max_interval: 4 * SECOND,
        deadline: 120 * SECOND,
    };
    let waiter = JobWaiter::new(ManualClock::new(), policy);

    // When: Awaiting
    waiter.await_job(&appliance, job_id).await.unwrap();

    // Then: Sleeps grow 1, 2, 4 and stay at 4
    assert_eq!(
        waiter.clock().sleeps(),
        vec![SECOND, 2 * SECOND, 4 * SECOND, 4 * SECOND, 4 * SECOND]
    );
}

#[tokio::test]
async fn test_failed_job_reports_appliance_message() {
    // Given: A job that fails
    let appliance = FakeAppliance::new()
        .with_job_plan(vec![JobState::Running, JobState::Failed])
        .with_job_error("[EFAULT] Failed to import certificate");
    let job_id = submit(&appliance).await;
    let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(SECOND, 60 * SECOND));

    // When: Awaiting
    let err = waiter.await_job(&appliance, job_id).await.unwrap_err();

    // Then: JobFailed with the message; the operation was not resubmitted
    assert!(matches!(
        &err,
        SyncError::JobFailed { state: JobState::Failed, message, .. }
            if message.contains("Failed to import certificate")
    ));
    assert_eq!(appliance.count(|c| matches!(c, Call::Create { .. })), 1);
}

#[tokio::test]
async fn test_aborted_job_is_a_failure() {
    // Given: A job that is aborted on the appliance
    let appliance = FakeAppliance::new().with_job_plan(vec![JobState::Aborted]);
    let job_id = submit(&appliance).await;
    let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(SECOND, 60 * SECOND));

    // When: Awaiting
    let err = waiter.await_job(&appliance, job_id).await.unwrap_err();

    // Then: Reported as a failure in state ABORTED
    assert!(matches!(
        err,
        SyncError::JobFailed {
            state: JobState::Aborted,
            ..
        }
    ));
    assert_eq!(polls(&appliance, job_id), 1);
}

#[tokio::test]
async fn test_unknown_job_is_reported() {
    // Given: An appliance that knows no job 99
    let appliance = FakeAppliance::new();
    let waiter = JobWaiter::new(ManualClock::new(), PollPolicy::fixed(SECOND, 60 * SECOND));

    // When: Awaiting job 99
    let err = waiter.await_job(&appliance, 99).await.unwrap_err();

    // Then: JobNotFound
    assert!(matches!(err, SyncError::JobNotFound(99)));
}

#[tokio::test]
async fn test_manual_clock_sleep_advances_now() {
    let clock = ManualClock::new();
    let start = clock.now();
    clock.sleep(3 * SECOND).await;
    assert_eq!(clock.now() - start, 3 * SECOND);
}
