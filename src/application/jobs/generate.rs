use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::{
        generation::{GenerationError, GenerationRequest, ParticipantOutcome},
        repos::{JobsRepo, RepoError},
    },
    domain::types::JobType,
};

use super::{
    context::JobWorkerContext,
    queue::enqueue_job,
    retry::{JobFailure, handle_failure, with_timeout},
};

/// Batch jobs outrank single-participant work.
const EVENT_JOB_PRIORITY: i32 = 5;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateEventJobPayload {
    pub event_id: i64,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
    #[serde(default)]
    pub attempt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateParticipantJobPayload {
    pub event_id: i64,
    pub participant_id: i64,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
    #[serde(default)]
    pub attempt: u32,
}

impl From<GenerationError> for JobFailure {
    fn from(err: GenerationError) -> Self {
        JobFailure::new(err.kind(), err.to_string())
    }
}

pub async fn enqueue_event_generation_job<J: JobsRepo + ?Sized>(
    repo: &J,
    event_id: i64,
    force_regenerate: bool,
    send_email: bool,
) -> Result<String, RepoError> {
    let payload = GenerateEventJobPayload {
        event_id,
        force_regenerate,
        send_email,
        attempt: 0,
    };
    enqueue_job(
        repo,
        JobType::GenerateEventCertificates,
        &payload,
        None,
        1,
        EVENT_JOB_PRIORITY,
    )
    .await
}

pub async fn enqueue_participant_generation_job<J: JobsRepo + ?Sized>(
    repo: &J,
    event_id: i64,
    participant_id: i64,
    force_regenerate: bool,
    send_email: bool,
) -> Result<String, RepoError> {
    let payload = GenerateParticipantJobPayload {
        event_id,
        participant_id,
        force_regenerate,
        send_email,
        attempt: 0,
    };
    enqueue_job(
        repo,
        JobType::GenerateParticipantCertificate,
        &payload,
        None,
        1,
        0,
    )
    .await
}

pub async fn process_generate_event_job(
    payload: GenerateEventJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let request = GenerationRequest {
        event_id: payload.event_id,
        force: payload.force_regenerate,
        send_email: payload.send_email,
    };

    match with_timeout(ctx.job_timeout, ctx.generation.generate_for_event(request)).await {
        Ok(report) => {
            info!(
                target = "certifier::jobs::generate",
                event_id = payload.event_id,
                attempt = payload.attempt,
                generated = report.generated,
                already_existing = report.already_existing,
                errors = report.errors,
                "Event generation job finished"
            );
            Ok(())
        }
        Err(failure) => {
            handle_failure(
                ctx.jobs.as_ref(),
                JobType::GenerateEventCertificates,
                payload.attempt,
                failure,
                |attempt| GenerateEventJobPayload { attempt, ..payload.clone() },
            )
            .await
        }
    }
}

pub async fn process_generate_participant_job(
    payload: GenerateParticipantJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;
    let work = ctx.generation.generate_for_participant(
        payload.event_id,
        payload.participant_id,
        payload.force_regenerate,
        payload.send_email,
    );

    match with_timeout(ctx.job_timeout, work).await {
        Ok(outcome) => {
            let outcome = match outcome {
                ParticipantOutcome::Generated { .. } => "generated",
                ParticipantOutcome::AlreadyExists { .. } => "exists",
                ParticipantOutcome::InProgress => "in_progress",
            };
            info!(
                target = "certifier::jobs::generate",
                event_id = payload.event_id,
                participant_id = payload.participant_id,
                attempt = payload.attempt,
                outcome,
                "Participant generation job finished"
            );
            Ok(())
        }
        Err(failure) => {
            handle_failure(
                ctx.jobs.as_ref(),
                JobType::GenerateParticipantCertificate,
                payload.attempt,
                failure,
                |attempt| GenerateParticipantJobPayload { attempt, ..payload.clone() },
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_match_api_defaults() {
        let payload: GenerateEventJobPayload =
            serde_json::from_value(serde_json::json!({ "event_id": 3 })).expect("payload");
        assert!(!payload.force_regenerate);
        assert!(payload.send_email);
        assert_eq!(payload.attempt, 0);

        let payload: GenerateParticipantJobPayload = serde_json::from_value(
            serde_json::json!({ "event_id": 3, "participant_id": 9, "attempt": 2 }),
        )
        .expect("payload");
        assert_eq!(payload.participant_id, 9);
        assert_eq!(payload.attempt, 2);
    }
}
