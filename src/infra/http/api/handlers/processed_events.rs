//! Processed event handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::domain::types::JobType;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    PageQuery, ProcessedEventListResponse, ReprocessRequest, event_stats_response, job_handle,
    optional_json, processed_event_response,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_processed_events(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page();
    let (items, total) = state.processed_events.list(page).await?;
    Ok(Json(ProcessedEventListResponse {
        items: items.into_iter().map(processed_event_response).collect(),
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

pub async fn processed_event_stats(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.processed_events.stats().await?;
    Ok(Json(event_stats_response(stats)))
}

pub async fn request_scan(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let job_id = state.processed_events.request_scan().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(job_handle(job_id, JobType::ScanFinishedEvents)),
    ))
}

pub async fn reprocess_event(
    State(state): State<ApiState>,
    Path(event_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ReprocessRequest = optional_json(&body)?;
    let job_id = state
        .processed_events
        .request_reprocess(event_id, request.force_regenerate, request.send_email)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(job_handle(job_id, JobType::GenerateEventCertificates)),
    ))
}
