//! Jobs handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::job_status_response;
use crate::infra::http::api::state::ApiState;

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .jobs
        .find_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job_status_response(job)))
}
