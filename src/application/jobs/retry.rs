//! Retry policy for background jobs.
//!
//! Payloads carry their own attempt number and are pushed with a single queue attempt;
//! a retry is a fresh job scheduled `base_delay * 2^attempt` in the future. Whether a
//! failure is retried depends on its [`ErrorKind`] only.

use std::{fmt, future::Future, time::Duration};

use apalis::prelude::Error as ApalisError;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::repos::JobsRepo;
use crate::domain::types::{ErrorKind, JobType};

use super::{context::job_failed, queue::enqueue_job};

const METRIC_RESCHEDULED: &str = "certifier_jobs_rescheduled_total";

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retryable: fn(ErrorKind) -> bool,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Someone else is handling the work; the attempt counts as a success.
    Skip,
    RetryAfter(Duration),
    Exhausted,
    Terminal,
}

/// Failures that may clear up on their own.
pub fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::RemoteUnavailable
            | ErrorKind::Render
            | ErrorKind::Storage
            | ErrorKind::Delivery
            | ErrorKind::Persistence
            | ErrorKind::Timeout
    )
}

impl RetryPolicy {
    pub const SCAN: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(60),
        retryable: is_transient,
    };

    pub const GENERATE_EVENT: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(300),
        retryable: is_transient,
    };

    pub const GENERATE_PARTICIPANT: RetryPolicy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_secs(60),
        retryable: is_transient,
    };

    pub const DELIVER: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(300),
        retryable: is_transient,
    };

    pub fn for_job(job_type: JobType) -> RetryPolicy {
        match job_type {
            JobType::ScanFinishedEvents => Self::SCAN,
            JobType::GenerateEventCertificates => Self::GENERATE_EVENT,
            JobType::GenerateParticipantCertificate => Self::GENERATE_PARTICIPANT,
            JobType::DeliverCertificate => Self::DELIVER,
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// `attempt` counts the retries already spent; the first run is attempt zero.
    pub fn decide(&self, kind: ErrorKind, attempt: u32) -> RetryDecision {
        if kind == ErrorKind::AlreadyInProgress {
            RetryDecision::Skip
        } else if !(self.retryable)(kind) {
            RetryDecision::Terminal
        } else if attempt >= self.max_retries {
            RetryDecision::Exhausted
        } else {
            RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
        }
    }
}

#[derive(Debug, Clone, Error)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Run `work` under the per-job deadline.
pub async fn with_timeout<T, E, F>(limit: Duration, work: F) -> Result<T, JobFailure>
where
    F: Future<Output = Result<T, E>>,
    E: Into<JobFailure>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(JobFailure::new(
            ErrorKind::Timeout,
            format!("job exceeded {}s deadline", limit.as_secs()),
        )),
    }
}

/// Apply the policy to a failed attempt, scheduling the follow-up job when allowed.
pub async fn handle_failure<P, F>(
    jobs: &dyn JobsRepo,
    job_type: JobType,
    attempt: u32,
    failure: JobFailure,
    next_payload: F,
) -> Result<(), ApalisError>
where
    P: Serialize,
    F: FnOnce(u32) -> P,
{
    let policy = RetryPolicy::for_job(job_type);
    match policy.decide(failure.kind, attempt) {
        RetryDecision::Skip => {
            info!(
                target = "certifier::jobs",
                job_type = job_type.as_str(),
                attempt,
                reason = %failure,
                "Work already in progress elsewhere"
            );
            Ok(())
        }
        RetryDecision::RetryAfter(delay) => {
            let run_at = OffsetDateTime::now_utc() + delay;
            let payload = next_payload(attempt + 1);
            let job_id = enqueue_job(jobs, job_type, &payload, Some(run_at), 1, 0)
                .await
                .map_err(job_failed)?;
            counter!(METRIC_RESCHEDULED, "job_type" => job_type.as_str()).increment(1);
            warn!(
                target = "certifier::jobs",
                job_type = job_type.as_str(),
                attempt,
                retry_job_id = %job_id,
                delay_secs = delay.as_secs(),
                error = %failure,
                "Job failed; retry scheduled"
            );
            Err(job_failed(failure))
        }
        RetryDecision::Exhausted => {
            error!(
                target = "certifier::jobs",
                job_type = job_type.as_str(),
                attempt,
                error = %failure,
                "Job failed; retries exhausted"
            );
            Err(job_failed(failure))
        }
        RetryDecision::Terminal => {
            warn!(
                target = "certifier::jobs",
                job_type = job_type.as_str(),
                attempt,
                error = %failure,
                "Job failed with a non-retryable error"
            );
            Err(job_failed(failure))
        }
    }
}
