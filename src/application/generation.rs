//! Certificate generation for finished events.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{StreamExt, stream};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::{
    documents::DocumentStore,
    ledger::CertificateLedger,
    remote::{AttendanceClient, EventsClient, RegistrationsClient, RemoteError},
    render::{DocumentRenderer, Issuer, RenderContext, RenderError},
    repos::{ProcessedEventsRepo, RepoError},
};
use crate::domain::{
    certificates::{Certificate, NewCertificate, Transition, TransitionError},
    entities::{EventDetails, Participant},
    types::{CertificateStatus, ErrorKind},
};

const METRIC_GENERATED: &str = "certifier_certificates_generated_total";
const METRIC_GENERATION_FAILED: &str = "certifier_certificate_generation_failures_total";

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Participants rendered in parallel within one event.
    pub concurrency: usize,
    /// A `generating` row older than this is considered abandoned.
    pub stale_after: Duration,
    /// Error messages kept in a batch report.
    pub max_reported_errors: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            stale_after: Duration::from_secs(15 * 60),
            max_reported_errors: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("event `{0}` not found")]
    EventNotFound(i64),
    #[error("event `{event_id}` has not ended yet")]
    EventNotEnded { event_id: i64 },
    #[error("participant `{0}` not found")]
    ParticipantNotFound(i64),
    #[error(transparent)]
    Remote(RemoteError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Persistence(#[from] RepoError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::EventNotFound(_) | GenerationError::ParticipantNotFound(_) => {
                ErrorKind::NotFound
            }
            GenerationError::EventNotEnded { .. } => ErrorKind::EventNotEnded,
            GenerationError::Remote(RemoteError::NotFound { .. }) => ErrorKind::NotFound,
            GenerationError::Remote(RemoteError::Unavailable(_)) => ErrorKind::RemoteUnavailable,
            GenerationError::Render(RenderError::InvalidInput(_)) => ErrorKind::InvalidInput,
            GenerationError::Render(RenderError::Template(_)) => ErrorKind::Template,
            GenerationError::Render(RenderError::Render(_)) => ErrorKind::Render,
            GenerationError::Render(RenderError::Storage(_)) => ErrorKind::Storage,
            GenerationError::Persistence(err) if err.is_contention() => {
                ErrorKind::AlreadyInProgress
            }
            GenerationError::Persistence(RepoError::Timeout) => ErrorKind::Timeout,
            GenerationError::Persistence(_) => ErrorKind::Persistence,
            GenerationError::Transition(TransitionError::InProgress) => {
                ErrorKind::AlreadyInProgress
            }
            GenerationError::Transition(_) => ErrorKind::Conflict,
        }
    }

    fn from_event_lookup(event_id: i64, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound { .. } => GenerationError::EventNotFound(event_id),
            other => GenerationError::Remote(other),
        }
    }

    fn from_participant_lookup(participant_id: i64, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound { .. } => GenerationError::ParticipantNotFound(participant_id),
            other => GenerationError::Remote(other),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest {
    pub event_id: i64,
    pub force: bool,
    pub send_email: bool,
}

/// Result for one (event, participant) pair.
#[derive(Debug, Clone)]
pub enum ParticipantOutcome {
    Generated {
        certificate: Box<Certificate>,
        delivery_jobs: usize,
    },
    AlreadyExists {
        certificate: Box<Certificate>,
    },
    /// Another worker owns the pair right now.
    InProgress,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub event_id: i64,
    pub event_name: String,
    pub attendees: usize,
    pub generated: usize,
    pub already_existing: usize,
    pub in_progress: usize,
    pub skipped: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
    pub delivery_jobs: usize,
}

impl GenerationReport {
    fn push_error(&mut self, message: String, limit: usize) {
        self.errors += 1;
        if self.error_messages.len() < limit {
            self.error_messages.push(message);
        }
    }
}

enum BatchItem {
    Done(ParticipantOutcome),
    Skipped,
    Failed(String),
}

#[derive(Clone)]
pub struct GenerationService {
    events: Arc<dyn EventsClient>,
    attendance: Arc<dyn AttendanceClient>,
    registrations: Arc<dyn RegistrationsClient>,
    processed_events: Arc<dyn ProcessedEventsRepo>,
    ledger: CertificateLedger,
    renderer: DocumentRenderer,
    documents: Arc<dyn DocumentStore>,
    issuer: Issuer,
    settings: GenerationSettings,
}

impl GenerationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventsClient>,
        attendance: Arc<dyn AttendanceClient>,
        registrations: Arc<dyn RegistrationsClient>,
        processed_events: Arc<dyn ProcessedEventsRepo>,
        ledger: CertificateLedger,
        renderer: DocumentRenderer,
        documents: Arc<dyn DocumentStore>,
        issuer: Issuer,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            events,
            attendance,
            registrations,
            processed_events,
            ledger,
            renderer,
            documents,
            issuer,
            settings,
        }
    }

    /// Generate certificates for every confirmed attendee of an ended event.
    ///
    /// Per-participant failures are counted in the report and never abort the batch.
    pub async fn generate_for_event(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationReport, GenerationError> {
        let GenerationRequest {
            event_id,
            force,
            send_email,
        } = request;

        let event = self
            .events
            .event_details(event_id)
            .await
            .map_err(|err| GenerationError::from_event_lookup(event_id, err))?;
        if !event.has_ended(OffsetDateTime::now_utc()) {
            return Err(GenerationError::EventNotEnded { event_id });
        }

        let mut report = GenerationReport {
            event_id,
            event_name: event.name.clone(),
            ..GenerationReport::default()
        };

        let attendees = self
            .attendance
            .confirmed_attendees(event_id)
            .await
            .map_err(GenerationError::Remote)?;
        if attendees.is_empty() {
            info!(
                target = "certifier::generation",
                event_id, "Event has no confirmed attendees"
            );
            return Ok(report);
        }
        report.attendees = attendees.len();

        self.processed_events
            .upsert_event(event_id, &event.name)
            .await?;

        let template = self.custom_template(event_id).await;
        let template = template.as_deref();
        let event_ref = &event;

        let items: Vec<BatchItem> = stream::iter(attendees)
            .map(|participant_id| async move {
                let participant = match self.registrations.participant(participant_id).await {
                    Ok(participant) => participant,
                    Err(err) => {
                        warn!(
                            target = "certifier::generation",
                            event_id,
                            participant_id,
                            error = %err,
                            "Skipping attendee whose profile could not be resolved"
                        );
                        return BatchItem::Skipped;
                    }
                };

                match self
                    .generate_pair(
                        event_ref,
                        &participant,
                        template,
                        Reuse::batch(force),
                        send_email,
                    )
                    .await
                {
                    Ok(outcome) => BatchItem::Done(outcome),
                    Err(err) => {
                        warn!(
                            target = "certifier::generation",
                            event_id,
                            participant_id,
                            error_kind = %err.kind(),
                            error = %err,
                            "Certificate generation failed"
                        );
                        BatchItem::Failed(format!("participant {participant_id}: {err}"))
                    }
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for item in items {
            match item {
                BatchItem::Done(ParticipantOutcome::Generated { delivery_jobs, .. }) => {
                    report.generated += 1;
                    report.delivery_jobs += delivery_jobs;
                }
                BatchItem::Done(ParticipantOutcome::AlreadyExists { .. }) => {
                    report.already_existing += 1
                }
                BatchItem::Done(ParticipantOutcome::InProgress) => report.in_progress += 1,
                BatchItem::Skipped => report.skipped += 1,
                BatchItem::Failed(message) => {
                    report.push_error(message, self.settings.max_reported_errors)
                }
            }
        }

        if let Err(err) = self.processed_events.refresh_counters(event_id).await {
            warn!(
                target = "certifier::generation",
                event_id,
                error = %err,
                "Failed to refresh processed event counters"
            );
        }

        info!(
            target = "certifier::generation",
            event_id,
            generated = report.generated,
            already_existing = report.already_existing,
            in_progress = report.in_progress,
            skipped = report.skipped,
            errors = report.errors,
            "Event certificate generation finished"
        );

        Ok(report)
    }

    /// Generate a single certificate. Unlike the batch path, missing entities are errors
    /// and a certificate left in `error` is generated again even without `force`.
    pub async fn generate_for_participant(
        &self,
        event_id: i64,
        participant_id: i64,
        force: bool,
        send_email: bool,
    ) -> Result<ParticipantOutcome, GenerationError> {
        let event = self
            .events
            .event_details(event_id)
            .await
            .map_err(|err| GenerationError::from_event_lookup(event_id, err))?;
        let participant = self
            .registrations
            .participant(participant_id)
            .await
            .map_err(|err| GenerationError::from_participant_lookup(participant_id, err))?;

        self.processed_events
            .upsert_event(event_id, &event.name)
            .await?;
        let template = self.custom_template(event_id).await;

        let outcome = self
            .generate_pair(
                &event,
                &participant,
                template.as_deref(),
                Reuse::single(force),
                send_email,
            )
            .await?;

        if let Err(err) = self.processed_events.refresh_counters(event_id).await {
            warn!(
                target = "certifier::generation",
                event_id,
                error = %err,
                "Failed to refresh processed event counters"
            );
        }
        Ok(outcome)
    }

    async fn custom_template(&self, event_id: i64) -> Option<String> {
        match self.events.certificate_template(event_id).await {
            Ok(template) => template.filter(|source| !source.trim().is_empty()),
            Err(err) => {
                warn!(
                    target = "certifier::generation",
                    event_id,
                    error = %err,
                    "Custom template lookup failed; using default"
                );
                None
            }
        }
    }

    async fn generate_pair(
        &self,
        event: &EventDetails,
        participant: &Participant,
        template: Option<&str>,
        reuse: Reuse,
        send_email: bool,
    ) -> Result<ParticipantOutcome, GenerationError> {
        let now = OffsetDateTime::now_utc();
        let existing = self
            .ledger
            .certificates()
            .find_by_pair(event.id, participant.id)
            .await?;
        let previous_document = existing
            .as_ref()
            .and_then(|certificate| certificate.document_ref.clone());

        let transition = match existing {
            None => Certificate::start(
                NewCertificate {
                    event_id: event.id,
                    participant_id: participant.id,
                    event_name: event.name.clone(),
                    participant_name: participant.name.clone(),
                    participant_email: participant.email.clone(),
                },
                now,
            ),
            Some(certificate) => match self.claim_existing(certificate, reuse, now) {
                Claim::Restart(transition) => transition,
                Claim::Settled(outcome) => return Ok(outcome),
            },
        };

        let certificate = match self.ledger.apply(transition).await {
            Ok(applied) => applied.certificate,
            Err(err) if err.is_contention() => return Ok(ParticipantOutcome::InProgress),
            Err(err) => return Err(err.into()),
        };

        let document_ref = match self.render_and_store(&certificate, event, participant, template).await
        {
            Ok(document_ref) => document_ref,
            Err(err) => return Err(self.record_failure(&certificate, err).await),
        };

        let completed = certificate.complete_generation(
            document_ref.clone(),
            OffsetDateTime::now_utc(),
            send_email,
        )?;
        let applied = match self.ledger.apply(completed).await {
            Ok(applied) => applied,
            Err(err) => {
                self.discard_document(&document_ref).await;
                if err.is_contention() {
                    return Ok(ParticipantOutcome::InProgress);
                }
                return Err(err.into());
            }
        };

        if let Some(previous) = previous_document.filter(|previous| *previous != document_ref) {
            self.discard_document(&previous).await;
        }

        counter!(METRIC_GENERATED).increment(1);
        info!(
            target = "certifier::generation",
            event_id = event.id,
            participant_id = participant.id,
            certificate_id = %applied.certificate.id,
            code = %applied.certificate.validation_code,
            "Certificate generated"
        );

        Ok(ParticipantOutcome::Generated {
            delivery_jobs: applied.delivery_jobs.len(),
            certificate: Box::new(applied.certificate),
        })
    }

    fn claim_existing(&self, certificate: Certificate, reuse: Reuse, now: OffsetDateTime) -> Claim {
        let stale_after = self.settings.stale_after;
        let restartable = reuse.force
            || match certificate.status {
                CertificateStatus::Pending => true,
                CertificateStatus::Generating => certificate.is_stale(now, stale_after),
                CertificateStatus::Error => reuse.retry_failed,
                CertificateStatus::Generated | CertificateStatus::Sent => false,
            };

        if !restartable {
            if certificate.status == CertificateStatus::Generating {
                return Claim::Settled(ParticipantOutcome::InProgress);
            }
            return Claim::Settled(ParticipantOutcome::AlreadyExists {
                certificate: Box::new(certificate),
            });
        }

        match certificate.begin_regeneration(now, stale_after) {
            Ok(transition) => Claim::Restart(transition),
            Err(_) => Claim::Settled(ParticipantOutcome::InProgress),
        }
    }

    async fn render_and_store(
        &self,
        certificate: &Certificate,
        event: &EventDetails,
        participant: &Participant,
        template: Option<&str>,
    ) -> Result<String, RenderError> {
        let context = RenderContext::build(
            event,
            participant,
            &certificate.validation_code,
            OffsetDateTime::now_utc(),
            &self.issuer,
        )?;
        let document = self.renderer.render(&context, template).await?;
        let document_ref = self
            .documents
            .put(&certificate.file_name(), Bytes::from(document.bytes))
            .await?;
        Ok(document_ref)
    }

    async fn record_failure(
        &self,
        certificate: &Certificate,
        err: RenderError,
    ) -> GenerationError {
        counter!(METRIC_GENERATION_FAILED).increment(1);
        let err = GenerationError::Render(err);
        match certificate.fail_generation(err.to_string(), OffsetDateTime::now_utc()) {
            Ok(transition) => {
                if let Err(persist_err) = self.ledger.apply(transition).await {
                    warn!(
                        target = "certifier::generation",
                        certificate_id = %certificate.id,
                        error = %persist_err,
                        "Failed to record generation failure"
                    );
                }
            }
            Err(transition_err) => {
                warn!(
                    target = "certifier::generation",
                    certificate_id = %certificate.id,
                    error = %transition_err,
                    "Generation failure could not be recorded"
                );
            }
        }
        err
    }

    async fn discard_document(&self, document_ref: &str) {
        if let Err(err) = self.documents.delete(document_ref).await {
            warn!(
                target = "certifier::generation",
                document_ref,
                error = %err,
                "Failed to remove superseded document"
            );
        }
    }
}

enum Claim {
    Restart(Transition),
    Settled(ParticipantOutcome),
}

/// How an existing row for the pair is treated.
#[derive(Debug, Clone, Copy)]
struct Reuse {
    force: bool,
    /// Regenerate rows left in `error`. Batches leave them to the reprocess sweep.
    retry_failed: bool,
}

impl Reuse {
    fn batch(force: bool) -> Self {
        Self {
            force,
            retry_failed: false,
        }
    }

    fn single(force: bool) -> Self {
        Self {
            force,
            retry_failed: true,
        }
    }
}
