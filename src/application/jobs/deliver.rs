use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        delivery::{DeliveryError, DeliveryOutcome},
        repos::{JobsRepo, RepoError},
    },
    domain::types::JobType,
};

use super::{
    context::JobWorkerContext,
    queue::enqueue_job,
    retry::{JobFailure, handle_failure, with_timeout},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverCertificateJobPayload {
    pub certificate_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_override: Option<String>,
    #[serde(default)]
    pub attempt: u32,
}

impl From<DeliveryError> for JobFailure {
    fn from(err: DeliveryError) -> Self {
        JobFailure::new(err.kind(), err.to_string())
    }
}

pub async fn enqueue_delivery_job<J: JobsRepo + ?Sized>(
    repo: &J,
    certificate_id: Uuid,
    recipient_override: Option<String>,
) -> Result<String, RepoError> {
    let payload = DeliverCertificateJobPayload {
        certificate_id,
        recipient_override,
        attempt: 0,
    };
    enqueue_job(repo, JobType::DeliverCertificate, &payload, None, 1, 0).await
}

pub async fn process_deliver_job(
    payload: DeliverCertificateJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let work = ctx
        .delivery
        .deliver(payload.certificate_id, payload.recipient_override.clone());

    match with_timeout(ctx.job_timeout, work).await {
        Ok(outcome) => {
            info!(
                target = "certifier::jobs::deliver",
                certificate_id = %payload.certificate_id,
                attempt = payload.attempt,
                already_sent = matches!(outcome, DeliveryOutcome::AlreadySent),
                "Delivery job finished"
            );
            Ok(())
        }
        Err(failure) => {
            handle_failure(
                ctx.jobs.as_ref(),
                JobType::DeliverCertificate,
                payload.attempt,
                failure,
                |attempt| DeliverCertificateJobPayload { attempt, ..payload.clone() },
            )
            .await
        }
    }
}
