//! Email delivery of generated certificates with attempt tracking.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::{
    documents::{DocumentStore, DocumentStoreError, PDF_CONTENT_TYPE},
    ledger::CertificateLedger,
    render::Issuer,
    repos::RepoError,
};
use crate::domain::{
    certificates::{Certificate, TransitionError},
    codes::download_file_name,
    types::{CertificateStatus, ErrorKind},
};
use crate::presentation::email::CertificateReadyEmail;

const METRIC_SENT: &str = "certifier_deliveries_sent_total";
const METRIC_FAILED: &str = "certifier_delivery_failures_total";

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MailerError(pub String);

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError>;
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("certificate `{0}` not found")]
    NotFound(Uuid),
    #[error("certificate has no recipient address")]
    MissingRecipient,
    #[error("certificate has no stored document")]
    MissingDocument,
    #[error("delivery gave up after {0} failed attempts")]
    AttemptsExhausted(i32),
    #[error("email transport failed: {0}")]
    Transport(#[from] MailerError),
    #[error("document could not be loaded: {0}")]
    Storage(#[from] DocumentStoreError),
    #[error("email body could not be rendered: {0}")]
    Compose(#[from] askama::Error),
    #[error(transparent)]
    Persistence(#[from] RepoError),
    #[error(transparent)]
    Transition(TransitionError),
}

impl From<TransitionError> for DeliveryError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::MissingDocument => DeliveryError::MissingDocument,
            TransitionError::AttemptsExhausted { attempts } => {
                DeliveryError::AttemptsExhausted(attempts)
            }
            other => DeliveryError::Transition(other),
        }
    }
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::NotFound(_) => ErrorKind::NotFound,
            DeliveryError::MissingRecipient => ErrorKind::MissingRecipient,
            DeliveryError::MissingDocument => ErrorKind::Conflict,
            DeliveryError::AttemptsExhausted(_) => ErrorKind::AttemptsExhausted,
            DeliveryError::Transport(_) => ErrorKind::Delivery,
            DeliveryError::Storage(DocumentStoreError::NotFound) => ErrorKind::NotFound,
            DeliveryError::Storage(_) => ErrorKind::Storage,
            DeliveryError::Compose(_) => ErrorKind::Template,
            DeliveryError::Persistence(err) if err.is_contention() => ErrorKind::AlreadyInProgress,
            DeliveryError::Persistence(RepoError::Timeout) => ErrorKind::Timeout,
            DeliveryError::Persistence(_) => ErrorKind::Persistence,
            DeliveryError::Transition(_) => ErrorKind::Conflict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { recipient: String },
    AlreadySent,
}

#[derive(Clone)]
pub struct DeliveryService {
    ledger: CertificateLedger,
    documents: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
    issuer: Issuer,
}

impl DeliveryService {
    pub fn new(
        ledger: CertificateLedger,
        documents: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        issuer: Issuer,
    ) -> Self {
        Self {
            ledger,
            documents,
            mailer,
            issuer,
        }
    }

    /// Send the certificate document to its recipient.
    ///
    /// `recipient_override` replaces the cached participant email for this delivery only.
    /// The attempt is claimed before sending; a worker that loses the claim backs off
    /// without emailing, and a certificate past the attempt ceiling is never sent.
    pub async fn deliver(
        &self,
        certificate_id: Uuid,
        recipient_override: Option<String>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let certificate = self
            .ledger
            .certificates()
            .find_certificate(certificate_id)
            .await?
            .ok_or(DeliveryError::NotFound(certificate_id))?;

        if certificate.status == CertificateStatus::Sent {
            return Ok(DeliveryOutcome::AlreadySent);
        }

        let recipient = recipient_override
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| certificate.participant_email.trim().to_string());
        if recipient.is_empty() {
            return Err(DeliveryError::MissingRecipient);
        }
        let Some(document_ref) = certificate.document_ref.clone() else {
            return Err(DeliveryError::MissingDocument);
        };

        let claim = certificate.begin_delivery(OffsetDateTime::now_utc())?;
        let certificate = self.ledger.apply(claim).await?.certificate;

        match self.send_document(&certificate, &recipient, &document_ref).await {
            Ok(()) => self.record_sent(&certificate, recipient).await,
            Err(err @ DeliveryError::Compose(_)) => Err(err),
            Err(err) => Err(self.record_failure(&certificate, err).await),
        }
    }

    async fn record_sent(
        &self,
        certificate: &Certificate,
        recipient: String,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let transition = certificate.mark_sent(recipient.clone(), OffsetDateTime::now_utc())?;
        self.ledger.apply(transition).await?;
        counter!(METRIC_SENT).increment(1);
        info!(
            target = "certifier::delivery",
            certificate_id = %certificate.id,
            code = %certificate.validation_code,
            "Certificate delivered"
        );
        Ok(DeliveryOutcome::Sent { recipient })
    }

    async fn record_failure(&self, certificate: &Certificate, err: DeliveryError) -> DeliveryError {
        counter!(METRIC_FAILED).increment(1);
        match certificate.fail_delivery(err.to_string(), OffsetDateTime::now_utc()) {
            Ok(transition) => {
                let attempts = transition.certificate.send_attempts;
                if let Err(persist_err) = self.ledger.apply(transition).await {
                    warn!(
                        target = "certifier::delivery",
                        certificate_id = %certificate.id,
                        error = %persist_err,
                        "Failed to record delivery failure"
                    );
                }
                warn!(
                    target = "certifier::delivery",
                    certificate_id = %certificate.id,
                    send_attempts = attempts,
                    error = %err,
                    "Certificate delivery failed"
                );
            }
            Err(transition_err) => {
                warn!(
                    target = "certifier::delivery",
                    certificate_id = %certificate.id,
                    error = %transition_err,
                    "Delivery failure could not be recorded"
                );
            }
        }
        err
    }

    async fn send_document(
        &self,
        certificate: &Certificate,
        recipient: &str,
        document_ref: &str,
    ) -> Result<(), DeliveryError> {
        let bytes = self.documents.get(document_ref).await?;
        let email = self.compose(certificate, recipient, bytes)?;
        self.mailer.send(email).await?;
        Ok(())
    }

    fn compose(
        &self,
        certificate: &Certificate,
        recipient: &str,
        bytes: Bytes,
    ) -> Result<OutgoingEmail, DeliveryError> {
        let validation_url = self.issuer.validation_url(&certificate.validation_code);
        let template = CertificateReadyEmail {
            participant_name: &certificate.participant_name,
            event_name: &certificate.event_name,
            code: &certificate.validation_code,
            validation_url: &validation_url,
            system_name: &self.issuer.system_name,
        };

        Ok(OutgoingEmail {
            to: recipient.to_string(),
            subject: template.subject(),
            body: template.render()?,
            attachments: vec![EmailAttachment {
                file_name: download_file_name(&certificate.validation_code),
                content_type: PDF_CONTENT_TYPE,
                bytes,
            }],
        })
    }
}
