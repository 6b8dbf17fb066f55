//! Conversions from domain values to the wire types in `certifier-api-types`.

use serde::Deserialize;
use serde::de::DeserializeOwned;

pub use certifier_api_types::{
    CertificateListResponse, CertificateResponse, CertificateStatsResponse,
    EventStatsResponse, GenerateEventRequest, GenerateParticipantRequest, JobHandleResponse,
    JobStatusResponse, ProcessedEventListResponse, ProcessedEventResponse, ReprocessRequest,
    ResendRequest, ValidationResponse, progress,
};

use super::error::ApiError;
use crate::application::certificates::{INVALID_CODE_MESSAGE, ValidationOutcome};
use crate::application::render::Issuer;
use crate::application::repos::{CertificateFilter, PageRequest};
use crate::domain::{
    certificates::Certificate,
    codes::download_file_name,
    entities::{CertificateStats, EventStats, JobRecord, ProcessedEvent},
    types::{CertificateStatus, JobType},
};

#[derive(Debug, Default, Deserialize)]
pub struct CertificateListQuery {
    pub event_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub status: Option<CertificateStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CertificateListQuery {
    pub fn filter(&self) -> CertificateFilter {
        CertificateFilter {
            event_id: self.event_id,
            participant_id: self.participant_id,
            status: self.status,
        }
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.limit, self.offset)
    }
}

/// Parse a request body that may be omitted entirely; an empty body means defaults.
pub fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request("Invalid JSON body", Some(err.to_string())))
}

pub fn job_handle(job_id: String, job_type: JobType) -> JobHandleResponse {
    JobHandleResponse {
        job_id,
        job_type: job_type.as_str().to_string(),
    }
}

pub fn certificate_response(certificate: Certificate, issuer: &Issuer) -> CertificateResponse {
    let can_resend = certificate.can_resend();
    let file_name = download_file_name(&certificate.validation_code);
    let validation_url = issuer.validation_url(&certificate.validation_code);
    CertificateResponse {
        id: certificate.id,
        event_id: certificate.event_id,
        participant_id: certificate.participant_id,
        validation_code: certificate.validation_code,
        status: certificate.status,
        event_name: certificate.event_name,
        participant_name: certificate.participant_name,
        participant_email: certificate.participant_email,
        generated_at: certificate.generated_at,
        sent: certificate.sent,
        sent_at: certificate.sent_at,
        recipient_email: certificate.recipient_email,
        send_attempts: certificate.send_attempts,
        last_attempt_at: certificate.last_attempt_at,
        error_log: certificate.error_log,
        validation_count: certificate.validation_count,
        can_resend,
        file_name,
        validation_url,
        created_at: certificate.created_at,
        updated_at: certificate.updated_at,
    }
}

pub fn certificate_stats_response(stats: CertificateStats) -> CertificateStatsResponse {
    CertificateStatsResponse {
        total: stats.total,
        pending: stats.pending,
        generating: stats.generating,
        generated: stats.generated,
        sent: stats.sent,
        error: stats.error,
        delivered: stats.delivered,
        undelivered: stats.undelivered(),
    }
}

pub fn processed_event_response(event: ProcessedEvent) -> ProcessedEventResponse {
    ProcessedEventResponse {
        complete: event.complete(),
        generation_progress: progress(event.generated_count, event.total_certificates),
        delivery_progress: progress(event.sent_count, event.total_certificates),
        event_id: event.event_id,
        event_name: event.event_name,
        total_certificates: event.total_certificates,
        generated_count: event.generated_count,
        sent_count: event.sent_count,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

pub fn event_stats_response(stats: EventStats) -> EventStatsResponse {
    EventStatsResponse {
        processed_events: stats.processed_events,
        complete_events: stats.complete_events,
        certificates_generated: stats.certificates_generated,
        average_per_event: stats.average_per_event(),
    }
}

pub fn validation_response(outcome: ValidationOutcome) -> ValidationResponse {
    match outcome {
        ValidationOutcome::Valid {
            code,
            participant_name,
            event_name,
            generated_at,
        } => ValidationResponse {
            valid: true,
            code,
            participant_name: Some(participant_name),
            event_name: Some(event_name),
            generated_at,
            message: None,
        },
        ValidationOutcome::Invalid { code } => ValidationResponse {
            valid: false,
            code,
            participant_name: None,
            event_name: None,
            generated_at: None,
            message: Some(INVALID_CODE_MESSAGE.to_string()),
        },
    }
}

pub fn job_status_response(job: JobRecord) -> JobStatusResponse {
    JobStatusResponse {
        id: job.id,
        job_type: job.job_type.as_str().to_string(),
        state: job.state.as_str().to_string(),
        attempts: job.attempts,
        max_attempts: job.max_attempts,
        run_at: job.run_at,
        done_at: job.done_at,
        last_error: job.last_error,
        payload: job.payload,
    }
}
