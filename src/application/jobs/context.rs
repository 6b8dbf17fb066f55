use std::{sync::Arc, time::Duration};

use apalis::prelude::Error as ApalisError;

use crate::application::{
    delivery::DeliveryService, generation::GenerationService, maintenance::MaintenanceService,
    repos::JobsRepo, scan::FinishedEventScanner,
};

/// Shared context passed to job workers so they can reach the pipeline services.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub scanner: Arc<FinishedEventScanner>,
    pub generation: Arc<GenerationService>,
    pub delivery: Arc<DeliveryService>,
    pub maintenance: Arc<MaintenanceService>,
    pub jobs: Arc<dyn JobsRepo>,
    /// Upper bound for a single job execution.
    pub job_timeout: Duration,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
