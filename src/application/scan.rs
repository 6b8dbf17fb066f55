//! Discovery of finished events that have not been processed yet.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::{
    jobs::enqueue_event_generation_job,
    remote::{EventsClient, RemoteError},
    repos::{JobsRepo, ProcessedEventsRepo},
};
use crate::domain::types::ErrorKind;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("finished events could not be listed: {0}")]
    Remote(#[from] RemoteError),
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Remote(_) => ErrorKind::RemoteUnavailable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub candidates: usize,
    pub claimed: usize,
    pub already_tracked: usize,
    pub not_ended: usize,
    pub failures: usize,
    pub jobs: Vec<String>,
}

#[derive(Clone)]
pub struct FinishedEventScanner {
    events: Arc<dyn EventsClient>,
    processed: Arc<dyn ProcessedEventsRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl FinishedEventScanner {
    pub fn new(
        events: Arc<dyn EventsClient>,
        processed: Arc<dyn ProcessedEventsRepo>,
        jobs: Arc<dyn JobsRepo>,
    ) -> Self {
        Self {
            events,
            processed,
            jobs,
        }
    }

    /// Claim each newly finished event and queue its batch generation.
    ///
    /// An event is claimed at most once; a claim whose job cannot be queued is released so the
    /// next scan picks it up again.
    pub async fn scan(&self) -> Result<ScanReport, ScanError> {
        let now = OffsetDateTime::now_utc();
        let events = self.events.finished_events().await?;
        let mut report = ScanReport {
            candidates: events.len(),
            ..ScanReport::default()
        };

        for event in events {
            if !event.has_ended(now) {
                report.not_ended += 1;
                continue;
            }

            match self.processed.claim_event(event.id, &event.name).await {
                Ok(true) => {}
                Ok(false) => {
                    report.already_tracked += 1;
                    continue;
                }
                Err(err) => {
                    warn!(
                        target = "certifier::scan",
                        event_id = event.id,
                        error = %err,
                        "Failed to claim finished event"
                    );
                    report.failures += 1;
                    continue;
                }
            }

            match enqueue_event_generation_job(self.jobs.as_ref(), event.id, false, true).await {
                Ok(job_id) => {
                    report.claimed += 1;
                    report.jobs.push(job_id);
                }
                Err(err) => {
                    warn!(
                        target = "certifier::scan",
                        event_id = event.id,
                        error = %err,
                        "Failed to queue event generation; releasing claim"
                    );
                    if let Err(release_err) = self.processed.release_claim(event.id).await {
                        warn!(
                            target = "certifier::scan",
                            event_id = event.id,
                            error = %release_err,
                            "Failed to release event claim"
                        );
                    }
                    report.failures += 1;
                }
            }
        }

        info!(
            target = "certifier::scan",
            candidates = report.candidates,
            claimed = report.claimed,
            already_tracked = report.already_tracked,
            failures = report.failures,
            "Finished event scan complete"
        );

        Ok(report)
    }
}
