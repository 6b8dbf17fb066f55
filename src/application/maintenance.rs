//! Periodic upkeep: requeue failed work, refresh counters, purge expired rows.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::{
    jobs::{enqueue_delivery_job, enqueue_participant_generation_job},
    repos::{CertificatesRepo, JobsRepo, ProcessedEventsRepo, RepoError},
};

/// Failed certificates are left alone for this long before being retried.
pub const RETRY_COOL_DOWN: Duration = Duration::from_secs(60 * 60);
/// Unfinished certificates older than this are deleted.
pub const RETENTION: Duration = Duration::from_secs(730 * 24 * 60 * 60);
/// Rows requeued per reprocess pass.
pub const REPROCESS_BATCH: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReprocessReport {
    pub deliveries_requeued: usize,
    pub generations_requeued: usize,
    pub stale_requeued: usize,
    pub skipped: usize,
    pub failures: usize,
}

#[derive(Clone)]
pub struct MaintenanceService {
    certificates: Arc<dyn CertificatesRepo>,
    processed: Arc<dyn ProcessedEventsRepo>,
    jobs: Arc<dyn JobsRepo>,
    stale_after: Duration,
}

impl MaintenanceService {
    pub fn new(
        certificates: Arc<dyn CertificatesRepo>,
        processed: Arc<dyn ProcessedEventsRepo>,
        jobs: Arc<dyn JobsRepo>,
        stale_after: Duration,
    ) -> Self {
        Self {
            certificates,
            processed,
            jobs,
            stale_after,
        }
    }

    /// Requeue certificates stuck in `error` or abandoned in `generating`.
    pub async fn reprocess_failed(&self) -> Result<ReprocessReport, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut report = ReprocessReport::default();

        let candidates = self
            .certificates
            .list_retry_candidates(now - RETRY_COOL_DOWN, REPROCESS_BATCH)
            .await?;
        for certificate in candidates {
            let queued = if certificate.document_ref.is_some() {
                if certificate.participant_email.trim().is_empty() {
                    report.skipped += 1;
                    continue;
                }
                let queued =
                    enqueue_delivery_job(self.jobs.as_ref(), certificate.id, None).await;
                if queued.is_ok() {
                    report.deliveries_requeued += 1;
                }
                queued
            } else {
                let queued = enqueue_participant_generation_job(
                    self.jobs.as_ref(),
                    certificate.event_id,
                    certificate.participant_id,
                    true,
                    true,
                )
                .await;
                if queued.is_ok() {
                    report.generations_requeued += 1;
                }
                queued
            };
            if let Err(err) = queued {
                warn!(
                    target = "certifier::maintenance",
                    certificate_id = %certificate.id,
                    error = %err,
                    "Failed to requeue certificate"
                );
                report.failures += 1;
            }
        }

        let stale = self
            .certificates
            .list_stale_generating(now - self.stale_after, REPROCESS_BATCH)
            .await?;
        for certificate in stale {
            match enqueue_participant_generation_job(
                self.jobs.as_ref(),
                certificate.event_id,
                certificate.participant_id,
                true,
                true,
            )
            .await
            {
                Ok(_) => report.stale_requeued += 1,
                Err(err) => {
                    warn!(
                        target = "certifier::maintenance",
                        certificate_id = %certificate.id,
                        error = %err,
                        "Failed to requeue stale generation"
                    );
                    report.failures += 1;
                }
            }
        }

        info!(
            target = "certifier::maintenance",
            deliveries = report.deliveries_requeued,
            generations = report.generations_requeued,
            stale = report.stale_requeued,
            skipped = report.skipped,
            failures = report.failures,
            "Reprocess pass complete"
        );
        Ok(report)
    }

    pub async fn refresh_counters(&self) -> Result<u64, RepoError> {
        let refreshed = self.processed.refresh_all_counters().await?;
        info!(
            target = "certifier::maintenance",
            events = refreshed,
            "Processed event counters refreshed"
        );
        Ok(refreshed)
    }

    pub async fn cleanup(&self) -> Result<u64, RepoError> {
        let cutoff = OffsetDateTime::now_utc() - RETENTION;
        let deleted = self.certificates.delete_expired(cutoff).await?;
        info!(
            target = "certifier::maintenance",
            deleted,
            "Expired certificates removed"
        );
        Ok(deleted)
    }
}
