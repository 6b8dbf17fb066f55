//! Read and command operations behind the certificates API.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::{
    documents::{DocumentStore, DocumentStoreError},
    jobs::{
        enqueue_delivery_job, enqueue_event_generation_job, enqueue_participant_generation_job,
    },
    repos::{CertificateFilter, CertificatesRepo, JobsRepo, PageRequest, RepoError},
};
use crate::domain::{
    certificates::Certificate,
    codes::{download_file_name, is_well_formed_code, normalize_code},
    entities::CertificateStats,
    types::CertificateStatus,
};

pub const INVALID_CODE_MESSAGE: &str = "Certificado não encontrado ou código inválido";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate not found")]
    NotFound,
    #[error("certificate cannot be resent in its current state")]
    CannotResend,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(DocumentStoreError),
}

impl From<DocumentStoreError> for CertificateError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::NotFound => CertificateError::NotFound,
            other => CertificateError::Storage(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid {
        code: String,
        participant_name: String,
        event_name: String,
        generated_at: Option<OffsetDateTime>,
    },
    Invalid {
        code: String,
    },
}

#[derive(Debug, Clone)]
pub struct DownloadedCertificate {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct CertificateService {
    certificates: Arc<dyn CertificatesRepo>,
    documents: Arc<dyn DocumentStore>,
    jobs: Arc<dyn JobsRepo>,
}

impl CertificateService {
    pub fn new(
        certificates: Arc<dyn CertificatesRepo>,
        documents: Arc<dyn DocumentStore>,
        jobs: Arc<dyn JobsRepo>,
    ) -> Self {
        Self {
            certificates,
            documents,
            jobs,
        }
    }

    pub async fn list(
        &self,
        filter: &CertificateFilter,
        page: PageRequest,
    ) -> Result<(Vec<Certificate>, u64), CertificateError> {
        let items = self.certificates.list_certificates(filter, page).await?;
        let total = self.certificates.count_certificates(filter).await?;
        Ok((items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Certificate, CertificateError> {
        self.certificates
            .find_certificate(id)
            .await?
            .ok_or(CertificateError::NotFound)
    }

    /// Only certificates whose document was produced can be downloaded.
    pub async fn download(&self, id: Uuid) -> Result<DownloadedCertificate, CertificateError> {
        let certificate = self.get(id).await?;
        let document_ref = match (&certificate.document_ref, certificate.status.has_document()) {
            (Some(document_ref), true) => document_ref,
            _ => return Err(CertificateError::NotFound),
        };
        let bytes = self.documents.get(document_ref).await?;
        Ok(DownloadedCertificate {
            file_name: download_file_name(&certificate.validation_code),
            bytes,
        })
    }

    pub async fn request_resend(
        &self,
        id: Uuid,
        email: Option<String>,
    ) -> Result<String, CertificateError> {
        let certificate = self.get(id).await?;
        if !certificate.can_resend() {
            return Err(CertificateError::CannotResend);
        }
        let email = email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        if email.as_deref().is_some_and(|email| !email.contains('@')) {
            return Err(CertificateError::InvalidInput(
                "email must be a valid address".to_string(),
            ));
        }

        let job_id = enqueue_delivery_job(self.jobs.as_ref(), id, email).await?;
        info!(
            target = "certifier::certificates",
            certificate_id = %id,
            job_id = %job_id,
            "Certificate resend requested"
        );
        Ok(job_id)
    }

    pub async fn request_event_generation(
        &self,
        event_id: i64,
        force: bool,
        send_email: bool,
    ) -> Result<String, CertificateError> {
        require_positive("event_id", event_id)?;
        let job_id =
            enqueue_event_generation_job(self.jobs.as_ref(), event_id, force, send_email).await?;
        info!(
            target = "certifier::certificates",
            event_id,
            job_id = %job_id,
            force,
            "Event generation requested"
        );
        Ok(job_id)
    }

    pub async fn request_participant_generation(
        &self,
        event_id: i64,
        participant_id: i64,
        force: bool,
        send_email: bool,
    ) -> Result<String, CertificateError> {
        require_positive("event_id", event_id)?;
        require_positive("participant_id", participant_id)?;
        let job_id = enqueue_participant_generation_job(
            self.jobs.as_ref(),
            event_id,
            participant_id,
            force,
            send_email,
        )
        .await?;
        Ok(job_id)
    }

    pub async fn stats(&self) -> Result<CertificateStats, CertificateError> {
        Ok(self.certificates.certificate_stats().await?)
    }

    /// Check a validation code. Only a successful validation is recorded.
    pub async fn validate(&self, raw_code: &str) -> Result<ValidationOutcome, CertificateError> {
        let code = normalize_code(raw_code);
        if !is_well_formed_code(&code) {
            return Ok(ValidationOutcome::Invalid { code });
        }

        let Some(certificate) = self.certificates.find_by_code(&code).await? else {
            return Ok(ValidationOutcome::Invalid { code });
        };
        if !matches!(
            certificate.status,
            CertificateStatus::Generated | CertificateStatus::Sent
        ) {
            return Ok(ValidationOutcome::Invalid { code });
        }

        self.certificates
            .record_validation(certificate.id, OffsetDateTime::now_utc())
            .await?;

        Ok(ValidationOutcome::Valid {
            code,
            participant_name: certificate.participant_name,
            event_name: certificate.event_name,
            generated_at: certificate.generated_at,
        })
    }
}

fn require_positive(field: &str, value: i64) -> Result<(), CertificateError> {
    if value > 0 {
        Ok(())
    } else {
        Err(CertificateError::InvalidInput(format!(
            "{field} must be a positive integer"
        )))
    }
}
