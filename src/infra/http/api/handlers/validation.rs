//! Public certificate validation

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::validation_response;
use crate::infra::http::api::state::ApiState;

/// Unknown and malformed codes are answered with `valid: false`, never an error status.
pub async fn validate_code(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.certificates.validate(&code).await?;
    Ok(Json(validation_response(outcome)))
}
