#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::Error as SqlxError;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use certifier::application::auth::ApiTokenVerifier;
use certifier::application::certificates::CertificateService;
use certifier::application::delivery::{DeliveryService, Mailer, MailerError, OutgoingEmail};
use certifier::application::documents::{DocumentStore, DocumentStoreError};
use certifier::application::generation::{GenerationService, GenerationSettings};
use certifier::application::ledger::CertificateLedger;
use certifier::application::maintenance::MaintenanceService;
use certifier::application::processed_events::ProcessedEventsService;
use certifier::application::remote::{
    AttendanceClient, EventsClient, RegistrationsClient, RemoteError,
};
use certifier::application::render::{DocumentRenderer, Issuer, PdfEngine, PdfEngineError};
use certifier::application::repos::{
    CERTIFICATE_PAIR_CONSTRAINT, CertificateFilter, CertificatesRepo, JobsRepo, NewJobRecord,
    PageRequest, ProcessedEventsRepo, RepoError,
};
use certifier::application::scan::FinishedEventScanner;
use certifier::domain::certificates::{Certificate, MAX_SEND_ATTEMPTS};
use certifier::domain::entities::{
    CertificateStats, EventDetails, EventStats, JobRecord, Participant, ProcessedEvent,
};
use certifier::domain::types::{CertificateStatus, JobState, JobType};
use certifier::infra::http::{ApiState, DatabaseHealth, HttpState, RouterState, build_router};

pub const API_TOKEN: &str = "test-token-123";
pub const PUBLIC_BASE_URL: &str = "https://eventos.example.com";

#[derive(Default)]
pub struct MemoryCertificates {
    rows: Mutex<HashMap<Uuid, Certificate>>,
    missed_lookups: std::sync::Mutex<Vec<(i64, i64)>>,
}

impl MemoryCertificates {
    /// The next lookup of the pair misses, as if another worker inserted it just after.
    pub fn miss_next_lookup(&self, event_id: i64, participant_id: i64) {
        self.missed_lookups
            .lock()
            .expect("lock")
            .push((event_id, participant_id));
    }

    pub async fn all(&self) -> Vec<Certificate> {
        let mut rows: Vec<_> = self.rows.lock().await.values().cloned().collect();
        rows.sort_by_key(|certificate| (certificate.event_id, certificate.participant_id));
        rows
    }

    pub async fn by_pair(&self, event_id: i64, participant_id: i64) -> Option<Certificate> {
        self.rows
            .lock()
            .await
            .values()
            .find(|row| row.event_id == event_id && row.participant_id == participant_id)
            .cloned()
    }

    /// Overwrite a row as-is, bypassing lifecycle checks.
    pub async fn put(&self, certificate: Certificate) {
        self.rows.lock().await.insert(certificate.id, certificate);
    }

    fn matches(filter: &CertificateFilter, row: &Certificate) -> bool {
        filter.event_id.is_none_or(|id| row.event_id == id)
            && filter.participant_id.is_none_or(|id| row.participant_id == id)
            && filter.status.is_none_or(|status| row.status == status)
    }
}

#[async_trait]
impl CertificatesRepo for MemoryCertificates {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let taken = rows.values().any(|row| {
            row.event_id == certificate.event_id && row.participant_id == certificate.participant_id
        });
        if taken {
            return Err(RepoError::Duplicate {
                constraint: CERTIFICATE_PAIR_CONSTRAINT.to_string(),
            });
        }
        if rows
            .values()
            .any(|row| row.validation_code == certificate.validation_code)
        {
            return Err(RepoError::Duplicate {
                constraint: "certificates_validation_code_key".to_string(),
            });
        }
        rows.insert(certificate.id, certificate.clone());
        Ok(())
    }

    async fn update_certificate(
        &self,
        certificate: &Certificate,
        expected: CertificateStatus,
        version: i64,
    ) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let stored = rows.get_mut(&certificate.id).ok_or(RepoError::NotFound)?;
        if stored.status != expected || stored.version != version {
            return Err(RepoError::StaleWrite);
        }
        *stored = certificate.clone();
        Ok(())
    }

    async fn find_certificate(&self, id: Uuid) -> Result<Option<Certificate>, RepoError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_pair(
        &self,
        event_id: i64,
        participant_id: i64,
    ) -> Result<Option<Certificate>, RepoError> {
        {
            let mut missed = self.missed_lookups.lock().expect("lock");
            if let Some(index) = missed
                .iter()
                .position(|pair| *pair == (event_id, participant_id))
            {
                missed.remove(index);
                return Ok(None);
            }
        }
        Ok(self.by_pair(event_id, participant_id).await)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Certificate>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .find(|row| row.validation_code == code)
            .cloned())
    }

    async fn record_validation(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        row.validation_count += 1;
        row.last_validated_at = Some(at);
        Ok(())
    }

    async fn list_certificates(
        &self,
        filter: &CertificateFilter,
        page: PageRequest,
    ) -> Result<Vec<Certificate>, RepoError> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| Self::matches(filter, row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_certificates(&self, filter: &CertificateFilter) -> Result<u64, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| Self::matches(filter, row))
            .count() as u64)
    }

    async fn certificate_stats(&self) -> Result<CertificateStats, RepoError> {
        let rows = self.rows.lock().await;
        let mut stats = CertificateStats {
            total: rows.len() as u64,
            ..CertificateStats::default()
        };
        for row in rows.values() {
            match row.status {
                CertificateStatus::Pending => stats.pending += 1,
                CertificateStatus::Generating => stats.generating += 1,
                CertificateStatus::Generated => stats.generated += 1,
                CertificateStatus::Sent => stats.sent += 1,
                CertificateStatus::Error => stats.error += 1,
            }
            if row.sent {
                stats.delivered += 1;
            }
        }
        Ok(stats)
    }

    async fn list_retry_candidates(
        &self,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| {
                row.status == CertificateStatus::Error
                    && row.send_attempts < MAX_SEND_ATTEMPTS
                    && row.last_attempt_at.unwrap_or(row.updated_at) < cutoff
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_stale_generating(
        &self,
        updated_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| {
                row.status == CertificateStatus::Generating && row.updated_at < updated_before
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete_expired(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, row| {
            !(matches!(
                row.status,
                CertificateStatus::Error | CertificateStatus::Pending
            ) && row.created_at < cutoff)
        });
        Ok((before - rows.len()) as u64)
    }
}

/// Processed-event store whose counters are derived from a shared certificate store.
pub struct MemoryProcessedEvents {
    events: Mutex<BTreeMap<i64, ProcessedEvent>>,
    certificates: Arc<MemoryCertificates>,
}

impl MemoryProcessedEvents {
    pub fn new(certificates: Arc<MemoryCertificates>) -> Self {
        Self {
            events: Mutex::new(BTreeMap::new()),
            certificates,
        }
    }

    pub async fn get(&self, event_id: i64) -> Option<ProcessedEvent> {
        self.events.lock().await.get(&event_id).cloned()
    }

    async fn recompute(&self, event: &mut ProcessedEvent) {
        let rows = self.certificates.all().await;
        let rows: Vec<_> = rows
            .iter()
            .filter(|row| row.event_id == event.event_id)
            .collect();
        event.total_certificates = rows.len() as i64;
        event.generated_count = rows
            .iter()
            .filter(|row| row.status.has_document())
            .count() as i64;
        event.sent_count = rows.iter().filter(|row| row.sent).count() as i64;
        event.updated_at = OffsetDateTime::now_utc();
    }
}

fn new_processed_event(event_id: i64, event_name: &str) -> ProcessedEvent {
    let now = OffsetDateTime::now_utc();
    ProcessedEvent {
        event_id,
        event_name: event_name.to_string(),
        total_certificates: 0,
        generated_count: 0,
        sent_count: 0,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ProcessedEventsRepo for MemoryProcessedEvents {
    async fn claim_event(&self, event_id: i64, event_name: &str) -> Result<bool, RepoError> {
        let mut events = self.events.lock().await;
        if events.contains_key(&event_id) {
            return Ok(false);
        }
        events.insert(event_id, new_processed_event(event_id, event_name));
        Ok(true)
    }

    async fn release_claim(&self, event_id: i64) -> Result<(), RepoError> {
        let mut events = self.events.lock().await;
        if events
            .get(&event_id)
            .is_some_and(|event| event.total_certificates == 0)
        {
            events.remove(&event_id);
        }
        Ok(())
    }

    async fn upsert_event(&self, event_id: i64, event_name: &str) -> Result<(), RepoError> {
        let mut events = self.events.lock().await;
        events
            .entry(event_id)
            .and_modify(|event| event.event_name = event_name.to_string())
            .or_insert_with(|| new_processed_event(event_id, event_name));
        Ok(())
    }

    async fn refresh_counters(
        &self,
        event_id: i64,
    ) -> Result<Option<ProcessedEvent>, RepoError> {
        let Some(mut event) = self.get(event_id).await else {
            return Ok(None);
        };
        self.recompute(&mut event).await;
        self.events.lock().await.insert(event_id, event.clone());
        Ok(Some(event))
    }

    async fn refresh_all_counters(&self) -> Result<u64, RepoError> {
        let ids: Vec<i64> = self.events.lock().await.keys().copied().collect();
        for id in &ids {
            self.refresh_counters(*id).await?;
        }
        Ok(ids.len() as u64)
    }

    async fn find_processed_event(
        &self,
        event_id: i64,
    ) -> Result<Option<ProcessedEvent>, RepoError> {
        Ok(self.get(event_id).await)
    }

    async fn list_processed_events(
        &self,
        page: PageRequest,
    ) -> Result<Vec<ProcessedEvent>, RepoError> {
        Ok(self
            .events
            .lock()
            .await
            .values()
            .rev()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn count_processed_events(&self) -> Result<u64, RepoError> {
        Ok(self.events.lock().await.len() as u64)
    }

    async fn event_stats(&self) -> Result<EventStats, RepoError> {
        let events = self.events.lock().await;
        Ok(EventStats {
            processed_events: events.len() as u64,
            complete_events: events.values().filter(|event| event.complete()).count() as u64,
            certificates_generated: events
                .values()
                .map(|event| event.generated_count as u64)
                .sum(),
        })
    }
}

#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<Vec<(String, NewJobRecord)>>,
    fail_enqueue: AtomicBool,
}

impl MemoryJobs {
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub async fn payloads(&self, job_type: JobType) -> Vec<serde_json::Value> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|(_, job)| job.job_type == job_type)
            .map(|(_, job)| job.payload.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.jobs.lock().await.len()
    }
}

#[async_trait]
impl JobsRepo for MemoryJobs {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let id = Uuid::new_v4().to_string();
        self.jobs.lock().await.push((id.clone(), job));
        Ok(id)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .find(|(job_id, _)| job_id == id)
            .map(|(job_id, job)| JobRecord {
                id: job_id.clone(),
                job_type: job.job_type,
                payload: job.payload.clone(),
                state: JobState::Pending,
                attempts: 0,
                max_attempts: job.max_attempts,
                run_at: job.run_at,
                done_at: None,
                last_error: None,
            }))
    }
}

#[derive(Default)]
pub struct StubEvents {
    events: std::sync::Mutex<Vec<EventDetails>>,
    templates: std::sync::Mutex<HashMap<i64, String>>,
}

impl StubEvents {
    pub fn add(&self, event: EventDetails) {
        self.events.lock().expect("lock").push(event);
    }

    pub fn set_template(&self, event_id: i64, template: &str) {
        self.templates
            .lock()
            .expect("lock")
            .insert(event_id, template.to_string());
    }
}

#[async_trait]
impl EventsClient for StubEvents {
    async fn event_details(&self, event_id: i64) -> Result<EventDetails, RemoteError> {
        self.events
            .lock()
            .expect("lock")
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
            .ok_or(RemoteError::NotFound {
                entity: "event",
                id: event_id,
            })
    }

    async fn finished_events(&self) -> Result<Vec<EventDetails>, RemoteError> {
        Ok(self.events.lock().expect("lock").clone())
    }

    async fn certificate_template(&self, event_id: i64) -> Result<Option<String>, RemoteError> {
        Ok(self.templates.lock().expect("lock").get(&event_id).cloned())
    }
}

#[derive(Default)]
pub struct StubAttendance {
    attendees: std::sync::Mutex<HashMap<i64, Vec<i64>>>,
}

impl StubAttendance {
    pub fn set(&self, event_id: i64, participants: &[i64]) {
        self.attendees
            .lock()
            .expect("lock")
            .insert(event_id, participants.to_vec());
    }
}

#[async_trait]
impl AttendanceClient for StubAttendance {
    async fn confirmed_attendees(&self, event_id: i64) -> Result<Vec<i64>, RemoteError> {
        Ok(self
            .attendees
            .lock()
            .expect("lock")
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct StubRegistrations {
    participants: std::sync::Mutex<HashMap<i64, Participant>>,
}

impl StubRegistrations {
    pub fn add(&self, participant: Participant) {
        self.participants
            .lock()
            .expect("lock")
            .insert(participant.id, participant);
    }
}

#[async_trait]
impl RegistrationsClient for StubRegistrations {
    async fn participant(&self, participant_id: i64) -> Result<Participant, RemoteError> {
        self.participants
            .lock()
            .expect("lock")
            .get(&participant_id)
            .cloned()
            .ok_or(RemoteError::NotFound {
                entity: "participant",
                id: participant_id,
            })
    }
}

/// Echoes the rendered HTML behind a PDF magic header so tests can inspect it.
#[derive(Default)]
pub struct EchoPdfEngine {
    fail: AtomicBool,
    fail_when: std::sync::Mutex<Option<String>>,
    renders: AtomicUsize,
}

impl EchoPdfEngine {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only documents whose HTML contains `needle`.
    pub fn fail_when_contains(&self, needle: &str) {
        *self.fail_when.lock().expect("lock") = Some(needle.to_string());
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfEngine for EchoPdfEngine {
    async fn render_pdf(&self, html: String, _stylesheet: &str) -> Result<Vec<u8>, PdfEngineError> {
        let targeted = self
            .fail_when
            .lock()
            .expect("lock")
            .as_deref()
            .is_some_and(|needle| html.contains(needle));
        if targeted || self.fail.load(Ordering::SeqCst) {
            return Err(PdfEngineError("engine exited with status 1".to_string()));
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(format!("%PDF-1.4\n{html}").into_bytes())
    }
}

#[derive(Default)]
pub struct MemoryDocuments {
    docs: Mutex<HashMap<String, Bytes>>,
    sequence: AtomicUsize,
}

impl MemoryDocuments {
    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn contains(&self, document_ref: &str) -> bool {
        self.docs.lock().await.contains_key(document_ref)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn put(&self, file_name: &str, bytes: Bytes) -> Result<String, DocumentStoreError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let document_ref = format!("{sequence:04}/{file_name}");
        self.docs.lock().await.insert(document_ref.clone(), bytes);
        Ok(document_ref)
    }

    async fn get(&self, document_ref: &str) -> Result<Bytes, DocumentStoreError> {
        self.docs
            .lock()
            .await
            .get(document_ref)
            .cloned()
            .ok_or(DocumentStoreError::NotFound)
    }

    async fn delete(&self, document_ref: &str) -> Result<(), DocumentStoreError> {
        self.docs.lock().await.remove(document_ref);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingMailer {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every call to the transport, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError("smtp relay refused the message".to_string()));
        }
        self.sent.lock().await.push(email);
        Ok(())
    }
}

pub struct StaticHealth {
    pub healthy: bool,
}

#[async_trait]
impl DatabaseHealth for StaticHealth {
    async fn ping(&self) -> Result<(), SqlxError> {
        if self.healthy {
            Ok(())
        } else {
            Err(SqlxError::PoolTimedOut)
        }
    }
}

/// Every port of the pipeline backed by in-memory fakes.
pub struct Harness {
    pub certificates: Arc<MemoryCertificates>,
    pub processed: Arc<MemoryProcessedEvents>,
    pub jobs: Arc<MemoryJobs>,
    pub events: Arc<StubEvents>,
    pub attendance: Arc<StubAttendance>,
    pub registrations: Arc<StubRegistrations>,
    pub pdf: Arc<EchoPdfEngine>,
    pub documents: Arc<MemoryDocuments>,
    pub mailer: Arc<RecordingMailer>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let certificates = Arc::new(MemoryCertificates::default());
        Self {
            processed: Arc::new(MemoryProcessedEvents::new(certificates.clone())),
            certificates,
            jobs: Arc::new(MemoryJobs::default()),
            events: Arc::new(StubEvents::default()),
            attendance: Arc::new(StubAttendance::default()),
            registrations: Arc::new(StubRegistrations::default()),
            pdf: Arc::new(EchoPdfEngine::default()),
            documents: Arc::new(MemoryDocuments::default()),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    pub fn issuer(&self) -> Issuer {
        Issuer {
            system_name: "Portal de Eventos".to_string(),
            public_base_url: PUBLIC_BASE_URL.to_string(),
        }
    }

    pub fn ledger(&self) -> CertificateLedger {
        CertificateLedger::new(self.certificates.clone(), self.jobs.clone())
    }

    pub fn generation(&self) -> GenerationService {
        let template_path = PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/templates/certificates/default.html"
        ));
        GenerationService::new(
            self.events.clone(),
            self.attendance.clone(),
            self.registrations.clone(),
            self.processed.clone(),
            self.ledger(),
            DocumentRenderer::new(self.pdf.clone(), template_path),
            self.documents.clone(),
            self.issuer(),
            GenerationSettings {
                concurrency: 2,
                stale_after: Duration::from_secs(15 * 60),
                max_reported_errors: 10,
            },
        )
    }

    pub fn delivery(&self) -> DeliveryService {
        DeliveryService::new(
            self.ledger(),
            self.documents.clone(),
            self.mailer.clone(),
            self.issuer(),
        )
    }

    pub fn scanner(&self) -> FinishedEventScanner {
        FinishedEventScanner::new(self.events.clone(), self.processed.clone(), self.jobs.clone())
    }

    pub fn maintenance(&self) -> MaintenanceService {
        MaintenanceService::new(
            self.certificates.clone(),
            self.processed.clone(),
            self.jobs.clone(),
            Duration::from_secs(15 * 60),
        )
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            certificates: Arc::new(CertificateService::new(
                self.certificates.clone(),
                self.documents.clone(),
                self.jobs.clone(),
            )),
            processed_events: Arc::new(ProcessedEventsService::new(
                self.processed.clone(),
                self.jobs.clone(),
            )),
            jobs: self.jobs.clone(),
            verifier: Arc::new(ApiTokenVerifier::new([API_TOKEN])),
            issuer: self.issuer(),
        }
    }

    pub fn router(&self, healthy: bool) -> axum::Router {
        build_router(RouterState {
            http: HttpState {
                db: Arc::new(StaticHealth { healthy }),
            },
            api: self.api_state(),
        })
    }

    /// An event that ended yesterday with the given confirmed attendees.
    pub fn finished_event(&self, event_id: i64, name: &str, participants: &[(i64, &str, &str)]) {
        let now = OffsetDateTime::now_utc();
        self.events.add(EventDetails {
            id: event_id,
            name: name.to_string(),
            description: None,
            location: Some("Auditório Central".to_string()),
            organizer: None,
            starts_at: Some(now - time::Duration::days(2)),
            ends_at: Some(now - time::Duration::days(1)),
        });
        for (id, participant_name, email) in participants {
            self.registrations.add(Participant {
                id: *id,
                name: participant_name.to_string(),
                email: email.to_string(),
                document_id: None,
            });
        }
        let ids: Vec<i64> = participants.iter().map(|(id, _, _)| *id).collect();
        self.attendance.set(event_id, &ids);
    }

    pub fn upcoming_event(&self, event_id: i64, name: &str) {
        let now = OffsetDateTime::now_utc();
        self.events.add(EventDetails {
            id: event_id,
            name: name.to_string(),
            description: None,
            location: None,
            organizer: None,
            starts_at: Some(now + time::Duration::days(1)),
            ends_at: Some(now + time::Duration::days(2)),
        });
    }
}
