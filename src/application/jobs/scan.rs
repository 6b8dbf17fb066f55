use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::{
        repos::{JobsRepo, RepoError},
        scan::ScanError,
    },
    domain::types::JobType,
};

use super::{
    context::JobWorkerContext,
    queue::enqueue_job,
    retry::{JobFailure, handle_failure, with_timeout},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanFinishedEventsPayload {
    #[serde(default)]
    pub attempt: u32,
}

/// Cron tick for the finished-event scan.
#[derive(Default, Debug, Clone)]
pub struct ScanTick;

impl From<chrono::DateTime<chrono::Utc>> for ScanTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

impl From<ScanError> for JobFailure {
    fn from(err: ScanError) -> Self {
        JobFailure::new(err.kind(), err.to_string())
    }
}

pub async fn enqueue_scan_job<J: JobsRepo + ?Sized>(repo: &J) -> Result<String, RepoError> {
    enqueue_job(
        repo,
        JobType::ScanFinishedEvents,
        &ScanFinishedEventsPayload::default(),
        None,
        1,
        0,
    )
    .await
}

pub async fn process_scan_job(
    payload: ScanFinishedEventsPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_scan(&context, payload.attempt).await
}

/// A failed tick schedules an ordinary scan job as its first retry.
pub async fn process_scan_tick(
    _tick: ScanTick,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_scan(&context, 0).await
}

async fn run_scan(ctx: &JobWorkerContext, attempt: u32) -> Result<(), ApalisError> {
    match with_timeout(ctx.job_timeout, ctx.scanner.scan()).await {
        Ok(report) => {
            info!(
                target = "certifier::jobs::scan",
                attempt,
                claimed = report.claimed,
                failures = report.failures,
                "Scan job finished"
            );
            Ok(())
        }
        Err(failure) => {
            handle_failure(
                ctx.jobs.as_ref(),
                JobType::ScanFinishedEvents,
                attempt,
                failure,
                |attempt| ScanFinishedEventsPayload { attempt },
            )
            .await
        }
    }
}
