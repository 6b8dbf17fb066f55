use std::sync::Arc;

use crate::application::auth::ApiTokenVerifier;
use crate::application::certificates::CertificateService;
use crate::application::processed_events::ProcessedEventsService;
use crate::application::render::Issuer;
use crate::application::repos::JobsRepo;

#[derive(Clone)]
pub struct ApiState {
    pub certificates: Arc<CertificateService>,
    pub processed_events: Arc<ProcessedEventsService>,
    pub jobs: Arc<dyn JobsRepo>,
    pub verifier: Arc<ApiTokenVerifier>,
    pub issuer: Issuer,
}
