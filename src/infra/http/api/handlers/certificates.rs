//! Certificate handlers

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::domain::types::JobType;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    CertificateListQuery, CertificateListResponse, GenerateEventRequest,
    GenerateParticipantRequest, ResendRequest, certificate_response, certificate_stats_response,
    job_handle, optional_json,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_certificates(
    State(state): State<ApiState>,
    Query(query): Query<CertificateListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page();
    let (items, total) = state.certificates.list(&query.filter(), page).await?;
    Ok(Json(CertificateListResponse {
        items: items
            .into_iter()
            .map(|certificate| certificate_response(certificate, &state.issuer))
            .collect(),
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

pub async fn get_certificate(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let certificate = state.certificates.get(id).await?;
    Ok(Json(certificate_response(certificate, &state.issuer)))
}

pub async fn download_certificate(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let document = state.certificates.download(id).await?;
    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(document.bytes))
        .map_err(|err| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "response_error",
                "Failed to build download response",
                Some(err.to_string()),
            )
        })
}

/// The body is optional; an empty request resends to the cached address.
pub async fn resend_certificate(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ResendRequest = optional_json(&body)?;
    let job_id = state.certificates.request_resend(id, request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(job_handle(job_id, JobType::DeliverCertificate)),
    ))
}

pub async fn generate_event(
    State(state): State<ApiState>,
    Json(request): Json<GenerateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = state
        .certificates
        .request_event_generation(
            request.event_id,
            request.force_regenerate,
            request.send_email,
        )
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(job_handle(job_id, JobType::GenerateEventCertificates)),
    ))
}

pub async fn generate_participant(
    State(state): State<ApiState>,
    Json(request): Json<GenerateParticipantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = state
        .certificates
        .request_participant_generation(
            request.event_id,
            request.participant_id,
            request.force_regenerate,
            request.send_email,
        )
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(job_handle(job_id, JobType::GenerateParticipantCertificate)),
    ))
}

pub async fn certificate_stats(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.certificates.stats().await?;
    Ok(Json(certificate_stats_response(stats)))
}
