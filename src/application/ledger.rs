//! Executes the commands produced by certificate transitions.
//!
//! Storage commands run first and abort on failure. Queue commands run only after the
//! new state is durable; their failures are reported but do not undo the write.

use std::sync::Arc;

use tracing::warn;

use crate::application::{
    jobs::enqueue_delivery_job,
    repos::{CertificatesRepo, JobsRepo, RepoError},
};
use crate::domain::certificates::{Certificate, Command, Transition};

#[derive(Debug)]
pub struct Applied {
    pub certificate: Certificate,
    pub delivery_jobs: Vec<String>,
    pub dispatch_failures: Vec<RepoError>,
}

#[derive(Clone)]
pub struct CertificateLedger {
    certificates: Arc<dyn CertificatesRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl CertificateLedger {
    pub fn new(certificates: Arc<dyn CertificatesRepo>, jobs: Arc<dyn JobsRepo>) -> Self {
        Self { certificates, jobs }
    }

    pub fn certificates(&self) -> &Arc<dyn CertificatesRepo> {
        &self.certificates
    }

    pub fn jobs(&self) -> &Arc<dyn JobsRepo> {
        &self.jobs
    }

    pub async fn apply(&self, transition: Transition) -> Result<Applied, RepoError> {
        let Transition {
            certificate,
            commands,
        } = transition;

        for command in &commands {
            match command {
                Command::Insert => self.certificates.insert_certificate(&certificate).await?,
                Command::Update { expected, version } => {
                    self.certificates
                        .update_certificate(&certificate, *expected, *version)
                        .await?
                }
                Command::EnqueueDelivery { .. } => {}
            }
        }

        let mut delivery_jobs = Vec::new();
        let mut dispatch_failures = Vec::new();
        for command in commands {
            if let Command::EnqueueDelivery {
                certificate_id,
                recipient_override,
            } = command
            {
                match enqueue_delivery_job(self.jobs.as_ref(), certificate_id, recipient_override)
                    .await
                {
                    Ok(job_id) => delivery_jobs.push(job_id),
                    Err(err) => {
                        warn!(
                            target = "certifier::ledger",
                            certificate_id = %certificate_id,
                            error = %err,
                            "Failed to enqueue certificate delivery"
                        );
                        dispatch_failures.push(err);
                    }
                }
            }
        }

        Ok(Applied {
            certificate,
            delivery_jobs,
            dispatch_failures,
        })
    }
}
