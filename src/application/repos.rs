//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::certificates::Certificate;
use crate::domain::entities::{CertificateStats, EventStats, JobRecord, ProcessedEvent};
use crate::domain::types::{CertificateStatus, JobType};

/// Unique constraint guarding one certificate per (event, participant) pair.
pub const CERTIFICATE_PAIR_CONSTRAINT: &str = "certificates_event_participant_key";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("record changed underneath the update")]
    StaleWrite,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Another writer owns the row: a concurrent insert of the same pair or a lost
    /// compare-and-set. Other unique violations, such as a validation code collision,
    /// are not contention.
    pub fn is_contention(&self) -> bool {
        match self {
            RepoError::Duplicate { constraint } => constraint == CERTIFICATE_PAIR_CONSTRAINT,
            RepoError::StaleWrite => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateFilter {
    pub event_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub status: Option<CertificateStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

#[async_trait]
pub trait CertificatesRepo: Send + Sync {
    /// Fails with [`RepoError::Duplicate`] when the (event, participant) pair exists.
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), RepoError>;

    /// Persist lifecycle fields only if the stored row is still at `expected` status
    /// and `version`; otherwise fails with [`RepoError::StaleWrite`].
    async fn update_certificate(
        &self,
        certificate: &Certificate,
        expected: CertificateStatus,
        version: i64,
    ) -> Result<(), RepoError>;

    async fn find_certificate(&self, id: Uuid) -> Result<Option<Certificate>, RepoError>;

    async fn find_by_pair(
        &self,
        event_id: i64,
        participant_id: i64,
    ) -> Result<Option<Certificate>, RepoError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Certificate>, RepoError>;

    async fn record_validation(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;

    async fn list_certificates(
        &self,
        filter: &CertificateFilter,
        page: PageRequest,
    ) -> Result<Vec<Certificate>, RepoError>;

    async fn count_certificates(&self, filter: &CertificateFilter) -> Result<u64, RepoError>;

    async fn certificate_stats(&self) -> Result<CertificateStats, RepoError>;

    /// Certificates in `error`, below the attempt ceiling, last touched before `cutoff`.
    async fn list_retry_candidates(
        &self,
        cutoff: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError>;

    async fn list_stale_generating(
        &self,
        updated_before: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<Certificate>, RepoError>;

    /// Remove `error`/`pending` rows created before `cutoff`. Returns the deleted count.
    async fn delete_expired(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ProcessedEventsRepo: Send + Sync {
    /// Insert the event if it is not yet tracked. Returns `true` when this call created it.
    async fn claim_event(&self, event_id: i64, event_name: &str) -> Result<bool, RepoError>;

    /// Undo a claim that never produced certificates.
    async fn release_claim(&self, event_id: i64) -> Result<(), RepoError>;

    async fn upsert_event(&self, event_id: i64, event_name: &str) -> Result<(), RepoError>;

    /// Recompute the derived counters of one event from the certificates table.
    async fn refresh_counters(&self, event_id: i64)
    -> Result<Option<ProcessedEvent>, RepoError>;

    async fn refresh_all_counters(&self) -> Result<u64, RepoError>;

    async fn find_processed_event(
        &self,
        event_id: i64,
    ) -> Result<Option<ProcessedEvent>, RepoError>;

    async fn list_processed_events(
        &self,
        page: PageRequest,
    ) -> Result<Vec<ProcessedEvent>, RepoError>;

    async fn count_processed_events(&self) -> Result<u64, RepoError>;

    async fn event_stats(&self) -> Result<EventStats, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;
}
