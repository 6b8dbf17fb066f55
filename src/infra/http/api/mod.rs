pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;

/// Versioned API routes. Everything except certificate validation requires a token.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let auth_state = state.api.clone();

    let protected = Router::new()
        .route("/api/v1/certificates", get(handlers::list_certificates))
        .route(
            "/api/v1/certificates/stats",
            get(handlers::certificate_stats),
        )
        .route(
            "/api/v1/certificates/generate-event",
            post(handlers::generate_event),
        )
        .route(
            "/api/v1/certificates/generate-participant",
            post(handlers::generate_participant),
        )
        .route("/api/v1/certificates/{id}", get(handlers::get_certificate))
        .route(
            "/api/v1/certificates/{id}/download",
            get(handlers::download_certificate),
        )
        .route(
            "/api/v1/certificates/{id}/resend",
            post(handlers::resend_certificate),
        )
        .route(
            "/api/v1/processed-events",
            get(handlers::list_processed_events),
        )
        .route(
            "/api/v1/processed-events/stats",
            get(handlers::processed_event_stats),
        )
        .route(
            "/api/v1/processed-events/scan",
            post(handlers::request_scan),
        )
        .route(
            "/api/v1/processed-events/{event_id}/reprocess",
            post(handlers::reprocess_event),
        )
        .route("/api/v1/jobs/{id}", get(handlers::get_job))
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ));

    let public = Router::new().route("/api/v1/validate/{code}", get(handlers::validate_code));

    protected.merge(public).with_state(state)
}
