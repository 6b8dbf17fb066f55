use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::{
    jobs::{enqueue_event_generation_job, enqueue_scan_job},
    repos::{JobsRepo, PageRequest, ProcessedEventsRepo, RepoError},
};
use crate::domain::entities::{EventStats, ProcessedEvent};

#[derive(Debug, Error)]
pub enum ProcessedEventError {
    #[error("processed event `{0}` not found")]
    NotFound(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ProcessedEventsService {
    processed: Arc<dyn ProcessedEventsRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl ProcessedEventsService {
    pub fn new(processed: Arc<dyn ProcessedEventsRepo>, jobs: Arc<dyn JobsRepo>) -> Self {
        Self { processed, jobs }
    }

    pub async fn list(
        &self,
        page: PageRequest,
    ) -> Result<(Vec<ProcessedEvent>, u64), ProcessedEventError> {
        let items = self.processed.list_processed_events(page).await?;
        let total = self.processed.count_processed_events().await?;
        Ok((items, total))
    }

    pub async fn stats(&self) -> Result<EventStats, ProcessedEventError> {
        Ok(self.processed.event_stats().await?)
    }

    pub async fn request_scan(&self) -> Result<String, ProcessedEventError> {
        let job_id = enqueue_scan_job(self.jobs.as_ref()).await?;
        info!(
            target = "certifier::processed_events",
            job_id = %job_id,
            "Manual scan requested"
        );
        Ok(job_id)
    }

    /// Queue a new batch run for an event that was already processed once.
    pub async fn request_reprocess(
        &self,
        event_id: i64,
        force_regenerate: bool,
        send_email: bool,
    ) -> Result<String, ProcessedEventError> {
        self.processed
            .find_processed_event(event_id)
            .await?
            .ok_or(ProcessedEventError::NotFound(event_id))?;

        let job_id =
            enqueue_event_generation_job(self.jobs.as_ref(), event_id, force_regenerate, send_email)
                .await?;
        info!(
            target = "certifier::processed_events",
            event_id,
            job_id = %job_id,
            force_regenerate,
            send_email,
            "Event reprocess requested"
        );
        Ok(job_id)
    }
}
